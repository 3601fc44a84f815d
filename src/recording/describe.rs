use crate::dom::{Document, NodeId};
use crate::fingerprint::classify::{is_interactive, is_text_entry};
use crate::guide::StepAction;
use crate::synth::SelectorBundle;

pub(crate) fn is_password(doc: &Document, node: NodeId) -> bool {
    doc.tag(node) == "input"
        && doc
            .attr(node, "type")
            .is_some_and(|t| t.eq_ignore_ascii_case("password"))
}

/// Inputs, textareas, selects and editable regions.
pub(crate) fn is_field(doc: &Document, node: NodeId) -> bool {
    is_text_entry(doc, node)
        || matches!(doc.tag(node), "select" | "input")
        || doc.attr(node, "contenteditable").is_some_and(|v| v != "false")
}

/// The element a click is really aimed at: the nearest interactive ancestor.
pub(crate) fn click_target(doc: &Document, node: NodeId) -> NodeId {
    doc.closest(node, |d, n| is_interactive(d, n) || is_field(d, n))
        .unwrap_or(node)
}

/// Whether a click on `node` is expected to load another page.
pub(crate) fn causes_navigation(doc: &Document, node: NodeId) -> bool {
    match doc.tag(node) {
        "a" => doc.attr_trimmed(node, "href").is_some_and(|href| {
            !href.starts_with('#') && !href.starts_with("javascript:") && !href.starts_with("mailto:")
        }),
        "button" => {
            let kind = doc.attr(node, "type").unwrap_or("submit");
            kind.eq_ignore_ascii_case("submit")
                && doc.closest(node, |d, n| d.tag(n) == "form").is_some()
        }
        "input" => doc
            .attr(node, "type")
            .is_some_and(|t| t.eq_ignore_ascii_case("submit")),
        _ => false,
    }
}

pub(crate) fn field_label(bundle: &SelectorBundle) -> String {
    bundle
        .label()
        .or(bundle.name.as_deref())
        .or(bundle.tag_name.as_deref())
        .unwrap_or("element")
        .to_string()
}

pub(crate) fn describe(action: StepAction, bundle: &SelectorBundle, value: Option<&str>) -> String {
    let label = field_label(bundle);
    match (action, value) {
        (StepAction::Type, Some(v)) if !v.is_empty() => {
            format!("Type \"{}\" into the \"{}\" field", v, label)
        }
        (StepAction::Type, _) => format!("Fill in the \"{}\" field", label),
        (StepAction::Select, Some(v)) => format!("Select \"{}\" in \"{}\"", v, label),
        (StepAction::Select, None) => format!("Choose an option in \"{}\"", label),
        (StepAction::Focus, _) => format!("Click the \"{}\" field", label),
        (StepAction::Info, _) => label,
        (StepAction::Click, _) => format!("Click \"{}\"", label),
    }
}

/// Same form field: compared by `name`, then id, then structural path.
pub(crate) fn same_field(a: &SelectorBundle, b: &SelectorBundle) -> bool {
    match (&a.name, &b.name) {
        (Some(x), Some(y)) => return x == y,
        (Some(_), None) | (None, Some(_)) => return false,
        (None, None) => {}
    }
    if let (Some(x), Some(y)) = (&a.id, &b.id) {
        return x == y;
    }
    a.css_selector.is_some() && a.css_selector == b.css_selector
}
