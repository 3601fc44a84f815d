//! Selector synthesis: derive a durable [`SelectorBundle`] from a live element.
//!
//! Synthesis is a pure function of the element's current attributes, text and
//! position. It never reads the scan-id attribute the extractor writes.

mod bundle;
mod css_path;
mod signals;

pub use bundle::SelectorBundle;
pub use css_path::css_path;
pub use signals::{
    is_dynamic_id, is_generated_class, is_state_class, normalize_href_path, test_id, TEST_ID_ATTRS,
};

pub(crate) use bundle::non_empty;
pub(crate) use css_path::stable_id;

use crate::dom::selector::quote_attr_value;
use crate::dom::text::truncate_chars;
use crate::dom::{Document, NodeId};

pub const TEXT_SIGNAL_LIMIT: usize = 100;

const SEMANTIC_TAGS: &[&str] = &[
    "nav", "header", "footer", "main", "aside", "form", "dialog", "section", "article", "table",
];

fn is_semantic_container(doc: &Document, node: NodeId) -> bool {
    SEMANTIC_TAGS.contains(&doc.tag(node)) || doc.has_attr(node, "role")
}

/// Selector naming the nearest semantic ancestor of `node`.
pub fn parent_context(doc: &Document, node: NodeId) -> Option<String> {
    let ancestor = doc
        .ancestors(node)
        .take_while(|&a| !matches!(doc.tag(a), "body" | "html"))
        .find(|&a| is_semantic_container(doc, a))?;

    if let Some(id) = stable_id(doc, ancestor) {
        return Some(format!("#{}", id));
    }
    let tag = doc.tag(ancestor);
    if let Some(label) = doc.attr_trimmed(ancestor, "aria-label") {
        return Some(format!("{}[aria-label={}]", tag, quote_attr_value(label)));
    }
    match doc.attr_trimmed(ancestor, "role") {
        Some(role) => Some(format!("{}[role={}]", tag, quote_attr_value(role))),
        None => Some(tag.to_string()),
    }
}

pub fn synthesize(doc: &Document, node: NodeId) -> SelectorBundle {
    let tag = doc.tag(node).to_string();
    let href_path = if tag == "a" {
        doc.attr(node, "href")
            .and_then(|href| normalize_href_path(&doc.url, href))
    } else {
        None
    };
    let text = truncate_chars(&doc.text_content(node), TEXT_SIGNAL_LIMIT);
    let siblings = doc.same_tag_siblings(node);
    let bounds = doc.element(node).bounds;

    SelectorBundle {
        data_test_id: non_empty(test_id(doc, node)),
        aria_label: non_empty(doc.attr(node, "aria-label")),
        id: non_empty(doc.attr(node, "id").filter(|id| !is_dynamic_id(id))),
        name: non_empty(doc.attr(node, "name")),
        text_content: non_empty(Some(text.as_str())),
        role: non_empty(doc.attr(node, "role")),
        placeholder: non_empty(doc.attr(node, "placeholder")),
        href_path,
        css_selector: css_path(doc, node),
        parent_context: parent_context(doc, node),
        sibling_index: siblings.iter().position(|&s| s == node),
        sibling_count: Some(siblings.len()),
        quadrant: (!bounds.is_empty()).then(|| bounds.quadrant(&doc.viewport)),
        tag_name: Some(tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Element, Quadrant};
    use crate::fingerprint::{Extractor, SCAN_ID_ATTR};

    fn page() -> (Document, NodeId) {
        let mut doc = Document::new("https://github.com/acme/app", "acme/app");
        let body = doc.body();
        let nav = doc.append(body, Element::new("nav").attr("aria-label", "Repository"));
        let link = doc.append(
            nav,
            Element::new("a")
                .attr("href", "/acme/app/pull/1234")
                .attr("id", ":r5:")
                .attr("data-testid", "pr-link")
                .attr("class", "tab css-9x8y7z")
                .text("  Pull   requests ")
                .bounds(10.0, 10.0, 80.0, 20.0),
        );
        (doc, link)
    }

    #[test]
    fn test_synthesize_bundle() {
        let (doc, link) = page();
        let bundle = synthesize(&doc, link);

        assert_eq!(bundle.data_test_id.as_deref(), Some("pr-link"));
        assert_eq!(bundle.id, None, "dynamic ids are omitted");
        assert_eq!(bundle.text_content.as_deref(), Some("Pull requests"));
        assert_eq!(bundle.tag_name.as_deref(), Some("a"));
        assert_eq!(bundle.href_path.as_deref(), Some("/acme/app/pull/:num"));
        assert_eq!(bundle.css_selector.as_deref(), Some("nav > a.tab"));
        assert_eq!(
            bundle.parent_context.as_deref(),
            Some("nav[aria-label=\"Repository\"]")
        );
        assert_eq!(bundle.sibling_index, Some(0));
        assert_eq!(bundle.sibling_count, Some(1));
        assert_eq!(bundle.quadrant, Some(Quadrant::TopLeft));
        assert_eq!(bundle.role, None);
    }

    #[test]
    fn test_synthesis_ignores_scan_ids() {
        let (mut doc, link) = page();
        let before = synthesize(&doc, link);
        Extractor::default().extract(&mut doc);
        assert!(doc.has_attr(link, SCAN_ID_ATTR));
        assert_eq!(synthesize(&doc, link), before);
    }
}
