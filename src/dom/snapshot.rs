//! Serializable element tree exchanged with page hosts.
//!
//! The browser host serializes the live DOM into this shape (pre-order, every
//! element included) and the in-memory `Document` is rebuilt from it. Because
//! both sides walk in pre-order, `NodeId(n)` is the n-th element of the page.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::document::{Document, Element, NodeId};
use super::types::{BoundingBox, ComputedStyle, Viewport};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomSnapshot {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub viewport: Viewport,
    pub root: SnapshotNode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default)]
    pub bounds: BoundingBox,
    #[serde(default)]
    pub style: ComputedStyle,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SnapshotNode>,
}

impl From<DomSnapshot> for Document {
    fn from(snapshot: DomSnapshot) -> Self {
        let mut nodes = Vec::new();
        push_preorder(snapshot.root, None, &mut nodes);
        Document::from_parts(snapshot.url, snapshot.title, snapshot.viewport, nodes)
    }
}

fn push_preorder(node: SnapshotNode, parent: Option<NodeId>, out: &mut Vec<Element>) -> NodeId {
    let id = NodeId(out.len());
    let mut element = Element::new(&node.tag);
    element.attributes = node
        .attributes
        .into_iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v))
        .collect();
    element.text = node.text;
    element.bounds = node.bounds;
    element.style = node.style;
    element.parent = parent;
    out.push(element);

    for child in node.children {
        let child_id = push_preorder(child, Some(id), out);
        out[id.0].children.push(child_id);
    }
    id
}

impl Document {
    /// Serialize back into the exchange format.
    pub fn to_snapshot(&self) -> DomSnapshot {
        DomSnapshot {
            url: self.url.clone(),
            title: self.title.clone(),
            viewport: self.viewport,
            root: self.snapshot_node(self.root()),
        }
    }

    fn snapshot_node(&self, node: NodeId) -> SnapshotNode {
        let el = self.element(node);
        SnapshotNode {
            tag: el.tag.clone(),
            attributes: el.attributes.iter().cloned().collect(),
            text: el.text.clone(),
            bounds: el.bounds,
            style: el.style.clone(),
            children: el
                .children()
                .iter()
                .map(|&c| self.snapshot_node(c))
                .collect(),
        }
    }

    /// Pre-order index of `node`, which is what a browser host uses to find it.
    pub fn preorder_index(&self, node: NodeId) -> Option<usize> {
        self.all_elements().iter().position(|&n| n == node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_preorder_ids() {
        let json = r#"{
            "url": "https://example.com/",
            "title": "Example",
            "root": {
                "tag": "HTML",
                "children": [
                    {"tag": "body", "children": [
                        {"tag": "div", "children": [{"tag": "a", "text": "One", "attributes": {"href": "/1"}}]},
                        {"tag": "button", "text": "Two", "bounds": {"x": 0, "y": 0, "width": 40, "height": 20}}
                    ]}
                ]
            }
        }"#;
        let snapshot: DomSnapshot = serde_json::from_str(json).unwrap();
        let doc = Document::from(snapshot);

        assert_eq!(doc.len(), 5);
        assert_eq!(doc.tag(NodeId(0)), "html");
        assert_eq!(doc.body(), NodeId(1));
        assert_eq!(doc.tag(NodeId(3)), "a");
        assert_eq!(doc.parent(NodeId(3)), Some(NodeId(2)));
        assert_eq!(doc.attr(NodeId(3), "href"), Some("/1"));
        assert_eq!(doc.preorder_index(NodeId(4)), Some(4));
        assert!(!doc.is_visible(NodeId(3)), "missing bounds means no rendered box");
        assert!(doc.is_visible(NodeId(4)));
    }

    #[test]
    fn test_document_to_snapshot_and_back() {
        let mut doc = Document::new("https://example.com/a", "A");
        let body = doc.body();
        let nav = doc.append(body, Element::new("nav").attr("aria-label", "Main"));
        doc.append(nav, Element::new("a").attr("href", "/x").text("X"));

        let rebuilt = Document::from(doc.to_snapshot());
        assert_eq!(rebuilt.all_elements().len(), doc.all_elements().len());
        assert_eq!(rebuilt.text_content(rebuilt.body()), "X");
        assert_eq!(rebuilt.attr(nav, "aria-label"), Some("Main"));
    }
}
