use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::resolver::ResolveRequest;
use crate::synth::{normalize_href_path, SelectorBundle};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    #[default]
    Click,
    Type,
    Select,
    Focus,
    Info,
}

impl StepAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepAction::Click => "click",
            StepAction::Type => "type",
            StepAction::Select => "select",
            StepAction::Focus => "focus",
            StepAction::Info => "info",
        }
    }

    /// Lenient parse used on planner and archive input; unknown verbs are clicks.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "type" | "input" | "fill" => StepAction::Type,
            "select" | "choose" => StepAction::Select,
            "focus" => StepAction::Focus,
            "info" | "read" | "wait" => StepAction::Info,
            _ => StepAction::Click,
        }
    }

    /// Whether the step points at an element at all.
    pub fn targets_element(&self) -> bool {
        !matches!(self, StepAction::Info)
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One instruction of a guide.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub description: String,
    #[serde(default)]
    pub action: StepAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector_bundle: Option<SelectorBundle>,
    /// Scan id or raw text/CSS phrase from the planner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_element_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub causes_navigation: bool,
}

impl Step {
    pub fn new(description: impl Into<String>, action: StepAction) -> Self {
        Self {
            description: description.into(),
            action,
            ..Default::default()
        }
    }

    pub fn with_bundle(mut self, bundle: SelectorBundle) -> Self {
        self.selector_bundle = Some(bundle);
        self
    }

    pub fn with_ref(mut self, reference: impl Into<String>) -> Self {
        self.legacy_element_ref = Some(reference.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn on_page(mut self, url: &str) -> Self {
        self.page_url_pattern = page_pattern(url);
        self
    }

    pub fn resolve_request(&self, allow_scan_id: bool) -> ResolveRequest<'_> {
        ResolveRequest {
            bundle: self.selector_bundle.as_ref(),
            legacy_ref: self.legacy_element_ref.as_deref(),
            description: Some(self.description.as_str()).filter(|d| !d.trim().is_empty()),
            allow_scan_id,
        }
    }
}

/// `host/path` with record ids normalized, used to tie a step to its page.
pub fn page_pattern(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let path = normalize_href_path(url, parsed.path())?;
    Some(format!("{}{}", host, path))
}

/// True when `url` belongs to the page a step was recorded on.
pub fn matches_page(pattern: &str, url: &str) -> bool {
    page_pattern(url).is_some_and(|p| p.trim_end_matches('/') == pattern.trim_end_matches('/'))
}
