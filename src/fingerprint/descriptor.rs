use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// What kind of control an element is, as far as the planner cares.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ElementType {
    Link,
    Button,
    /// An input or textarea; the variant is the input `type` (`text`, `search`, ...).
    Input(String),
    Dropdown,
    MenuItem,
    Tab,
    Option,
    Checkbox,
    Toggle,
    Heading,
}

impl ElementType {
    pub fn is_input(&self) -> bool {
        matches!(self, ElementType::Input(_))
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Link => write!(f, "link"),
            ElementType::Button => write!(f, "button"),
            ElementType::Input(variant) => write!(f, "input-{}", variant),
            ElementType::Dropdown => write!(f, "dropdown"),
            ElementType::MenuItem => write!(f, "menu-item"),
            ElementType::Tab => write!(f, "tab"),
            ElementType::Option => write!(f, "option"),
            ElementType::Checkbox => write!(f, "checkbox"),
            ElementType::Toggle => write!(f, "toggle"),
            ElementType::Heading => write!(f, "heading"),
        }
    }
}

impl FromStr for ElementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "link" => ElementType::Link,
            "button" => ElementType::Button,
            "dropdown" => ElementType::Dropdown,
            "menu-item" => ElementType::MenuItem,
            "tab" => ElementType::Tab,
            "option" => ElementType::Option,
            "checkbox" => ElementType::Checkbox,
            "toggle" => ElementType::Toggle,
            "heading" => ElementType::Heading,
            other => match other.strip_prefix("input-") {
                Some(variant) if !variant.is_empty() => ElementType::Input(variant.to_string()),
                _ => return Err(format!("unknown element type '{}'", other)),
            },
        })
    }
}

impl From<ElementType> for String {
    fn from(value: ElementType) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for ElementType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Coarse page region an element sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Modal,
    Header,
    Sidebar,
    Main,
    Page,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Modal => "modal",
            Location::Header => "header",
            Location::Sidebar => "sidebar",
            Location::Main => "main",
            Location::Page => "page",
        }
    }
}

/// One scanned element, valid only for the scan that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDescriptor {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub location: Location,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub hints: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nearby_heading: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Settings,
    Profile,
    Login,
    Signup,
    Search,
    Checkout,
    Dashboard,
    Form,
    Repository,
    Other,
}

/// Page-level signals reported next to the element list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    pub page_type: PageType,
    pub has_open_modal: bool,
    pub has_open_dropdown: bool,
    pub is_loading: bool,
    /// Top-of-page headings harvested from the main landmark.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headings: Vec<String>,
}

/// Result of one full scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    pub url: String,
    pub title: String,
    pub elements: Vec<ElementDescriptor>,
    pub page_context: PageContext,
    /// Monotonic scan counter; IDs from different scans never overlap.
    pub scan: u64,
}

impl Extraction {
    pub fn descriptor(&self, id: &str) -> Option<&ElementDescriptor> {
        self.elements.iter().find(|d| d.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_type_strings() {
        assert_eq!(ElementType::Input("search".into()).to_string(), "input-search");
        assert_eq!("menu-item".parse::<ElementType>().unwrap(), ElementType::MenuItem);
        assert_eq!(
            "input-email".parse::<ElementType>().unwrap(),
            ElementType::Input("email".into())
        );
        assert!("input-".parse::<ElementType>().is_err());
        let json = serde_json::to_string(&ElementType::Toggle).unwrap();
        assert_eq!(json, "\"toggle\"");
    }
}
