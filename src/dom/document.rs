//! Arena-backed model of a live page.
//!
//! A `Document` owns every element of one page load. Elements are addressed by
//! `NodeId`, which is only meaningful inside the document that produced it.

use serde::{Deserialize, Serialize};

use super::text::normalize_whitespace;
use super::types::{BoundingBox, ComputedStyle, Viewport};

/// Attribute written by the page host on its own overlay elements.
pub const OVERLAY_ATTR: &str = "data-guideme-overlay";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// A single element node.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Tag name (lowercase).
    pub tag: String,
    /// Attributes in source order.
    pub attributes: Vec<(String, String)>,
    /// Text owned directly by this element (not by its children).
    pub text: String,
    pub bounds: BoundingBox,
    pub style: ComputedStyle,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            text: String::new(),
            bounds: BoundingBox::new(0.0, 0.0, 100.0, 20.0),
            style: ComputedStyle::default(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.put_attribute(name, value);
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn bounds(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.bounds = BoundingBox::new(x, y, width, height);
        self
    }

    pub fn style(mut self, style: ComputedStyle) -> Self {
        self.style = style;
        self
    }

    pub fn background(mut self, color: &str) -> Self {
        self.style.background_color = Some(color.to_string());
        self
    }

    /// Mark the element as `display: none`.
    pub fn hidden(mut self) -> Self {
        self.style.display = "none".to_string();
        self
    }

    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn put_attribute(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.attributes.push((name, value.to_string())),
        }
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.get_attribute("class")
            .unwrap_or("")
            .split_whitespace()
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

/// One page's element tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub url: String,
    pub title: String,
    pub viewport: Viewport,
    nodes: Vec<Element>,
    root: NodeId,
    body: NodeId,
}

impl Document {
    /// Create a document holding an `html` root with an empty `body`.
    pub fn new(url: &str, title: &str) -> Self {
        let mut root = Element::new("html").bounds(0.0, 0.0, 1280.0, 720.0);
        let mut body = Element::new("body").bounds(0.0, 0.0, 1280.0, 720.0);
        body.parent = Some(NodeId(0));
        root.children.push(NodeId(1));
        Self {
            url: url.to_string(),
            title: title.to_string(),
            viewport: Viewport::default(),
            nodes: vec![root, body],
            root: NodeId(0),
            body: NodeId(1),
        }
    }

    /// Build a document from a pre-order list of elements whose parent links are
    /// already set. The first element is the root.
    pub(crate) fn from_parts(url: String, title: String, viewport: Viewport, nodes: Vec<Element>) -> Self {
        let body = nodes
            .iter()
            .position(|n| n.tag == "body")
            .map(NodeId)
            .unwrap_or(NodeId(0));
        Self {
            url,
            title,
            viewport,
            nodes,
            root: NodeId(0),
            body,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append `element` as the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, mut element: Element) -> NodeId {
        let id = NodeId(self.nodes.len());
        element.parent = Some(parent);
        element.children.clear();
        self.nodes.push(element);
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn get(&self, node: NodeId) -> Option<&Element> {
        self.nodes.get(node.0)
    }

    /// Panics if `node` did not come from this document.
    pub fn element(&self, node: NodeId) -> &Element {
        &self.nodes[node.0]
    }

    pub fn element_mut(&mut self, node: NodeId) -> &mut Element {
        &mut self.nodes[node.0]
    }

    pub fn tag(&self, node: NodeId) -> &str {
        &self.nodes[node.0].tag
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node.0].get_attribute(name)
    }

    /// Attribute value with surrounding whitespace removed, `None` when blank.
    pub fn attr_trimmed(&self, node: NodeId, name: &str) -> Option<&str> {
        self.attr(node, name).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        self.nodes[node.0].put_attribute(name, value);
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        self.nodes[node.0].attributes.retain(|(k, _)| k != name);
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Ancestors of `node`, nearest first.
    pub fn ancestors(&self, node: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(node),
        }
    }

    /// Descendants of `node` in document order, excluding `node` itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Every element in document order, root first.
    pub fn all_elements(&self) -> Vec<NodeId> {
        let mut out = vec![self.root];
        out.extend(self.descendants(self.root));
        out
    }

    /// True when `node` is `ancestor` or lies beneath it.
    pub fn is_inclusive_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|a| a == ancestor)
    }

    /// Nearest inclusive ancestor satisfying `pred`.
    pub fn closest<F>(&self, node: NodeId, pred: F) -> Option<NodeId>
    where
        F: Fn(&Document, NodeId) -> bool,
    {
        if pred(self, node) {
            return Some(node);
        }
        self.ancestors(node).find(|&a| pred(self, a))
    }

    /// First element in document order whose `id` attribute equals `id`.
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.all_elements()
            .into_iter()
            .find(|&n| self.attr(n, "id") == Some(id))
    }

    /// Element siblings of `node` sharing its tag, including `node`.
    pub fn same_tag_siblings(&self, node: NodeId) -> Vec<NodeId> {
        let tag = self.tag(node);
        match self.parent(node) {
            Some(parent) => self
                .children(parent)
                .iter()
                .copied()
                .filter(|&c| self.tag(c) == tag)
                .collect(),
            None => vec![node],
        }
    }

    /// Concatenated text of the element and its descendants, whitespace collapsed.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut raw = String::new();
        self.collect_text(node, &mut raw);
        normalize_whitespace(&raw)
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let el = &self.nodes[node.0];
        if matches!(el.tag.as_str(), "script" | "style" | "noscript" | "template") {
            return;
        }
        if !el.text.is_empty() {
            out.push(' ');
            out.push_str(&el.text);
        }
        for &child in &el.children {
            self.collect_text(child, out);
        }
    }

    /// Rendered with a non-empty box and not hidden by itself or any ancestor.
    pub fn is_visible(&self, node: NodeId) -> bool {
        let el = &self.nodes[node.0];
        if el.bounds.is_empty() || !el.style.is_rendered() {
            return false;
        }
        self.ancestors(node).all(|a| {
            let style = &self.nodes[a.0].style;
            style.display != "none" && style.opacity > 0.0
        })
    }

    /// Inside one of the host's own overlay elements.
    pub fn is_overlay(&self, node: NodeId) -> bool {
        self.closest(node, |d, n| d.has_attr(n, OVERLAY_ATTR)).is_some()
    }
}

pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new("https://example.com/", "Example");
        let body = doc.body();
        let nav = doc.append(body, Element::new("nav"));
        let link = doc.append(nav, Element::new("a").attr("href", "/home").text("Home"));
        let span = doc.append(link, Element::new("span").text("  now  "));
        (doc, nav, link, span)
    }

    #[test]
    fn test_document_order_and_text() {
        let (doc, nav, link, span) = sample();
        assert_eq!(doc.all_elements(), vec![doc.root(), doc.body(), nav, link, span]);
        assert_eq!(doc.text_content(link), "Home now");
        assert_eq!(doc.text_content(nav), "Home now");
    }

    #[test]
    fn test_ancestors_and_closest() {
        let (doc, nav, link, span) = sample();
        let chain: Vec<_> = doc.ancestors(span).collect();
        assert_eq!(chain, vec![link, nav, doc.body(), doc.root()]);
        assert_eq!(doc.closest(span, |d, n| d.tag(n) == "nav"), Some(nav));
        assert!(doc.is_inclusive_descendant(span, nav));
        assert!(!doc.is_inclusive_descendant(nav, span));
    }

    #[test]
    fn test_visibility_follows_ancestors() {
        let mut doc = Document::new("https://example.com/", "Example");
        let body = doc.body();
        let hidden = doc.append(body, Element::new("div").hidden());
        let inner = doc.append(hidden, Element::new("button").text("Save"));
        let zero = doc.append(body, Element::new("button").text("Zero").bounds(0.0, 0.0, 0.0, 0.0));
        assert!(!doc.is_visible(inner));
        assert!(!doc.is_visible(zero));
        assert!(doc.is_visible(body));
    }

    #[test]
    fn test_attribute_roundtrip() {
        let (mut doc, _, link, _) = sample();
        doc.set_attr(link, "data-guideme-id", "gm-1");
        assert_eq!(doc.attr(link, "data-guideme-id"), Some("gm-1"));
        doc.set_attr(link, "data-guideme-id", "gm-2");
        assert_eq!(doc.attr(link, "data-guideme-id"), Some("gm-2"));
        doc.remove_attr(link, "data-guideme-id");
        assert!(!doc.has_attr(link, "data-guideme-id"));
    }
}
