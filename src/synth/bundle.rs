use serde::{Deserialize, Serialize};

use crate::dom::Quadrant;

/// Durable identifying signals for one element.
///
/// Every field is optional and absent signals are never serialized; an
/// empty string is treated the same as a missing signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_test_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sibling_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sibling_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quadrant: Option<Quadrant>,
}

/// `Some(trimmed)` for non-blank input.
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl SelectorBundle {
    /// No signal at all.
    pub fn is_empty(&self) -> bool {
        self.signal_count() == 0
    }

    pub fn signal_count(&self) -> usize {
        [
            &self.data_test_id,
            &self.aria_label,
            &self.id,
            &self.name,
            &self.text_content,
            &self.tag_name,
            &self.role,
            &self.placeholder,
            &self.href_path,
            &self.css_selector,
            &self.parent_context,
        ]
        .iter()
        .filter(|s| s.as_deref().is_some_and(|v| !v.trim().is_empty()))
        .count()
            + self.sibling_index.is_some() as usize
            + self.quadrant.is_some() as usize
    }

    /// Drop blank string signals, e.g. after deserializing hand-edited data.
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.data_test_id,
            &mut self.aria_label,
            &mut self.id,
            &mut self.name,
            &mut self.text_content,
            &mut self.tag_name,
            &mut self.role,
            &mut self.placeholder,
            &mut self.href_path,
            &mut self.css_selector,
            &mut self.parent_context,
        ] {
            *field = non_empty(field.as_deref());
        }
        self
    }

    /// Best text to match on: visible text, then the accessible name.
    pub fn label(&self) -> Option<&str> {
        self.text_content
            .as_deref()
            .or(self.aria_label.as_deref())
            .or(self.placeholder.as_deref())
    }
}
