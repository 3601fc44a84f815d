//! Per-element heuristics: interactivity, control type, page region, hints.

use std::collections::BTreeSet;

use super::descriptor::{ElementType, Location};
use crate::dom::{Document, NodeId};

const INTERACTIVE_ROLES: &[&str] = &[
    "button",
    "link",
    "menuitem",
    "menuitemcheckbox",
    "menuitemradio",
    "tab",
    "option",
    "checkbox",
    "radio",
    "switch",
    "combobox",
    "listbox",
    "textbox",
    "searchbox",
];

/// Class-name prefixes of UI frameworks, reported as hints only.
const FRAMEWORK_FINGERPRINTS: &[(&str, &str)] = &[
    ("Mui", "mui"),
    ("ant-", "antd"),
    ("chakra-", "chakra"),
    ("btn", "bootstrap"),
    ("v-btn", "vuetify"),
    ("el-", "element-ui"),
    ("mat-", "angular-material"),
    ("Polaris-", "polaris"),
];

pub fn is_heading(doc: &Document, node: NodeId) -> bool {
    matches!(doc.tag(node), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Matches the generic interactive-element set: native controls, interactive
/// ARIA roles, click handlers and focusable elements.
pub fn is_interactive(doc: &Document, node: NodeId) -> bool {
    let tag = doc.tag(node);
    match tag {
        "a" => return doc.has_attr(node, "href") || doc.has_attr(node, "role"),
        "button" | "select" | "textarea" | "summary" => return true,
        "input" => return doc.attr(node, "type") != Some("hidden"),
        _ => {}
    }
    if let Some(role) = doc.attr(node, "role") {
        if INTERACTIVE_ROLES.contains(&role) {
            return true;
        }
    }
    if doc.has_attr(node, "onclick") || doc.attr(node, "contenteditable") == Some("true") {
        return true;
    }
    matches!(doc.attr(node, "tabindex"), Some(t) if t.trim() != "-1")
}

pub fn is_text_entry(doc: &Document, node: NodeId) -> bool {
    match doc.tag(node) {
        "textarea" => true,
        "input" => !matches!(
            doc.attr(node, "type").unwrap_or("text"),
            "checkbox" | "radio" | "submit" | "button" | "reset" | "image" | "hidden" | "file"
        ),
        _ => doc.attr(node, "contenteditable") == Some("true"),
    }
}

pub fn element_type(doc: &Document, node: NodeId) -> ElementType {
    let tag = doc.tag(node);
    if let Some(role) = doc.attr(node, "role") {
        match role {
            "tab" => return ElementType::Tab,
            "menuitem" | "menuitemcheckbox" | "menuitemradio" => return ElementType::MenuItem,
            "option" => return ElementType::Option,
            "switch" => return ElementType::Toggle,
            "checkbox" | "radio" => return ElementType::Checkbox,
            "combobox" | "listbox" => return ElementType::Dropdown,
            "link" => return ElementType::Link,
            "button" => return ElementType::Button,
            "textbox" => return ElementType::Input("text".to_string()),
            "searchbox" => return ElementType::Input("search".to_string()),
            _ => {}
        }
    }
    match tag {
        "a" => ElementType::Link,
        "select" => ElementType::Dropdown,
        "textarea" => ElementType::Input("textarea".to_string()),
        "option" => ElementType::Option,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => ElementType::Heading,
        "input" => {
            let kind = doc
                .attr(node, "type")
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "text".to_string());
            match kind.as_str() {
                "checkbox" | "radio" => ElementType::Checkbox,
                "submit" | "button" | "reset" | "image" => ElementType::Button,
                _ => ElementType::Input(kind),
            }
        }
        _ => ElementType::Button,
    }
}

pub fn is_modal_root(doc: &Document, node: NodeId) -> bool {
    matches!(doc.attr(node, "role"), Some("dialog" | "alertdialog"))
        || (doc.tag(node) == "dialog" && doc.has_attr(node, "open"))
        || doc.attr(node, "aria-modal") == Some("true")
}

pub fn is_header_root(doc: &Document, node: NodeId) -> bool {
    doc.tag(node) == "header" || doc.attr(node, "role") == Some("banner")
}

pub fn is_sidebar_root(doc: &Document, node: NodeId) -> bool {
    matches!(doc.tag(node), "nav" | "aside")
        || matches!(doc.attr(node, "role"), Some("navigation" | "complementary"))
}

pub fn is_main_root(doc: &Document, node: NodeId) -> bool {
    doc.tag(node) == "main" || doc.attr(node, "role") == Some("main")
}

pub fn location(doc: &Document, node: NodeId) -> Location {
    if doc.closest(node, is_modal_root).is_some() {
        Location::Modal
    } else if doc.closest(node, is_header_root).is_some() {
        Location::Header
    } else if doc.closest(node, is_sidebar_root).is_some() {
        Location::Sidebar
    } else if doc.closest(node, is_main_root).is_some() {
        Location::Main
    } else {
        Location::Page
    }
}

/// Label shown to the planner: visible text, then accessible fallbacks.
pub fn display_text(doc: &Document, node: NodeId) -> String {
    let text = doc.text_content(node);
    if !text.is_empty() {
        return text;
    }
    ["aria-label", "placeholder", "title", "alt", "value", "name"]
        .iter()
        .find_map(|attr| doc.attr_trimmed(node, attr))
        .map(str::to_string)
        .unwrap_or_default()
}

pub fn hints(doc: &Document, node: NodeId, element_type: &ElementType) -> BTreeSet<String> {
    let mut hints = BTreeSet::new();

    let has_popup = doc
        .attr(node, "aria-haspopup")
        .is_some_and(|v| v != "false");
    let classes: Vec<&str> = doc.element(node).classes().collect();
    if has_popup
        || doc.has_attr(node, "aria-expanded")
        || classes.iter().any(|c| c.to_ascii_lowercase().contains("dropdown"))
        || *element_type == ElementType::Dropdown
    {
        hints.insert("dropdown".to_string());
    }
    if doc.attr(node, "aria-expanded") == Some("true") {
        hints.insert("expanded".to_string());
    }

    let button_like = matches!(element_type, ElementType::Button);
    if button_like && doc.element(node).style.has_solid_background() {
        hints.insert("primary".to_string());
    }

    if doc.closest(node, is_sidebar_root).is_some() {
        hints.insert("in-nav".to_string());
    }
    if doc.closest(node, |d, n| d.tag(n) == "form").is_some() {
        hints.insert("in-form".to_string());
    }
    if doc.closest(node, is_modal_root).is_some() {
        hints.insert("in-modal".to_string());
    }
    if crate::synth::test_id(doc, node).is_some() {
        hints.insert("has-testid".to_string());
    }

    for (prefix, name) in FRAMEWORK_FINGERPRINTS {
        if classes.iter().any(|c| c.starts_with(prefix)) {
            hints.insert(format!("framework:{}", name));
        }
    }
    if doc
        .element(node)
        .attributes
        .iter()
        .any(|(k, _)| k.starts_with("data-radix"))
    {
        hints.insert("framework:radix".to_string());
    }
    if doc
        .attr(node, "id")
        .is_some_and(|id| id.starts_with("headlessui-"))
    {
        hints.insert("framework:headlessui".to_string());
    }

    hints
}
