//! Highlight overlay injection.
//!
//! The overlay is a single fixed-position element drawn over the target's
//! box. It carries the overlay attribute so scans and the recorder skip it.

use crate::dom::{BoundingBox, OVERLAY_ATTR};
use crate::error::{GuideError, Result};

const HIGHLIGHT_ID: &str = "guideme-highlight";

/// Pre-order element lookup shared by every script that addresses a node by
/// index. Must walk exactly like the capture script.
pub(crate) const NODE_AT: &str = r#"
const __guidemeNodeAt = (index) => {
  let n = 0;
  let found = null;
  const walk = (el) => {
    if (found) return;
    if (n++ === index) { found = el; return; }
    for (const child of el.children) walk(child);
  };
  walk(document.documentElement);
  return found;
};
"#;

/// Encode a Rust string as a JavaScript string literal.
pub(crate) fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

pub struct HighlightOverlay {
    color: String,
}

impl HighlightOverlay {
    pub fn new(color: &str) -> Self {
        Self {
            color: color.to_string(),
        }
    }

    pub fn highlight_script(&self, bounds: BoundingBox, label: &str) -> String {
        format!(
            r#"(() => {{
  document.getElementById({id})?.remove();
  const box = document.createElement('div');
  box.id = {id};
  box.setAttribute({attr}, '');
  Object.assign(box.style, {{
    position: 'fixed',
    left: '{x}px',
    top: '{y}px',
    width: '{w}px',
    height: '{h}px',
    border: '3px solid ' + {color},
    borderRadius: '6px',
    pointerEvents: 'none',
    zIndex: '2147483647',
  }});
  const tip = document.createElement('div');
  tip.setAttribute({attr}, '');
  tip.textContent = {label};
  Object.assign(tip.style, {{
    position: 'absolute',
    top: '100%',
    left: '0',
    marginTop: '6px',
    padding: '4px 8px',
    background: {color},
    color: '#fff',
    font: '13px sans-serif',
    borderRadius: '4px',
    whiteSpace: 'nowrap',
  }});
  box.appendChild(tip);
  document.body.appendChild(box);
  return true;
}})()"#,
            id = js_string(HIGHLIGHT_ID),
            attr = js_string(OVERLAY_ATTR),
            x = bounds.x - 4.0,
            y = bounds.y - 4.0,
            w = bounds.width + 8.0,
            h = bounds.height + 8.0,
            color = js_string(&self.color),
            label = js_string(label),
        )
    }

    pub fn clear_script(&self) -> String {
        format!(
            "(() => {{ document.getElementById({})?.remove(); return true; }})()",
            js_string(HIGHLIGHT_ID)
        )
    }

    pub async fn show(&self, page: &chromiumoxide::page::Page, bounds: BoundingBox, label: &str) -> Result<()> {
        page.evaluate(self.highlight_script(bounds, label))
            .await
            .map_err(|e| GuideError::Other(format!("Failed to draw highlight: {}", e)))?;
        Ok(())
    }

    pub async fn clear(&self, page: &chromiumoxide::page::Page) -> Result<()> {
        page.evaluate(self.clear_script())
            .await
            .map_err(|e| GuideError::Other(format!("Failed to clear highlight: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_script_escapes_label() {
        let overlay = HighlightOverlay::new("#4f46e5");
        let script = overlay.highlight_script(BoundingBox::new(10.0, 20.0, 100.0, 30.0), "Click \"Save\"\n");
        assert!(script.contains(r#""Click \"Save\"\n""#));
        assert!(script.contains(OVERLAY_ATTR));
        assert!(script.contains("left: '6px'"));
        assert!(script.contains("\"#4f46e5\""));
    }

    #[test]
    fn test_clear_script_targets_highlight() {
        let overlay = HighlightOverlay::new("red");
        assert!(overlay.clear_script().contains("\"guideme-highlight\""));
    }
}
