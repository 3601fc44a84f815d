//! Geometry and style primitives attached to every element.

use serde::{Deserialize, Serialize};

/// Viewport information for coordinate calculations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

/// Rendered box of an element in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Get the center point of this bounding box.
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Which quarter of the viewport holds the centre of this box.
    pub fn quadrant(&self, viewport: &Viewport) -> Quadrant {
        let (cx, cy) = self.center();
        let left = cx < viewport.width / 2.0;
        let top = cy < viewport.height / 2.0;
        match (top, left) {
            (true, true) => Quadrant::TopLeft,
            (true, false) => Quadrant::TopRight,
            (false, true) => Quadrant::BottomLeft,
            (false, false) => Quadrant::BottomRight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Quadrant {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Quadrant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quadrant::TopLeft => "top-left",
            Quadrant::TopRight => "top-right",
            Quadrant::BottomLeft => "bottom-left",
            Quadrant::BottomRight => "bottom-right",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "top-left" => Some(Quadrant::TopLeft),
            "top-right" => Some(Quadrant::TopRight),
            "bottom-left" => Some(Quadrant::BottomLeft),
            "bottom-right" => Some(Quadrant::BottomRight),
            _ => None,
        }
    }
}

/// The subset of computed style the scanner and resolver look at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedStyle {
    #[serde(default = "default_display")]
    pub display: String,
    #[serde(default = "default_visibility")]
    pub visibility: String,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: default_display(),
            visibility: default_visibility(),
            opacity: default_opacity(),
            background_color: None,
        }
    }
}

impl ComputedStyle {
    pub fn is_rendered(&self) -> bool {
        self.display != "none" && self.visibility != "hidden" && self.opacity > 0.0
    }

    /// True when the background is painted with something other than
    /// transparent or white.
    pub fn has_solid_background(&self) -> bool {
        match self.background_color.as_deref().map(str::trim) {
            None | Some("") => false,
            Some(color) => {
                let color = color.to_ascii_lowercase().replace(' ', "");
                !matches!(
                    color.as_str(),
                    "transparent"
                        | "rgba(0,0,0,0)"
                        | "white"
                        | "#fff"
                        | "#ffffff"
                        | "rgb(255,255,255)"
                        | "rgba(255,255,255,1)"
                )
            }
        }
    }
}

fn default_display() -> String {
    "block".to_string()
}

fn default_visibility() -> String {
    "visible".to_string()
}

fn default_opacity() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadrant() {
        let viewport = Viewport::default();
        assert_eq!(
            BoundingBox::new(10.0, 10.0, 50.0, 20.0).quadrant(&viewport),
            Quadrant::TopLeft
        );
        assert_eq!(
            BoundingBox::new(1000.0, 600.0, 50.0, 20.0).quadrant(&viewport),
            Quadrant::BottomRight
        );
    }

    #[test]
    fn test_solid_background() {
        let mut style = ComputedStyle::default();
        assert!(!style.has_solid_background());
        style.background_color = Some("rgba(0, 0, 0, 0)".to_string());
        assert!(!style.has_solid_background());
        style.background_color = Some("rgb(37, 99, 235)".to_string());
        assert!(style.has_solid_background());
    }
}
