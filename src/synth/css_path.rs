use super::signals::{is_dynamic_id, stable_class};
use crate::dom::selector::is_plain_ident;
use crate::dom::{Document, NodeId};

const MAX_DEPTH: usize = 5;

/// Stable `#id` for `node`, if it has one usable in a selector.
pub(crate) fn stable_id(doc: &Document, node: NodeId) -> Option<&str> {
    doc.attr_trimmed(node, "id")
        .filter(|id| !is_dynamic_id(id) && is_plain_ident(id))
}

fn segment(doc: &Document, node: NodeId) -> String {
    let tag = doc.tag(node);
    let class = stable_class(doc, node);
    let base = match class {
        Some(class) => format!("{}.{}", tag, class),
        None => tag.to_string(),
    };

    let Some(parent) = doc.parent(node) else {
        return base;
    };
    let same_tag: Vec<NodeId> = doc
        .children(parent)
        .iter()
        .copied()
        .filter(|&c| doc.tag(c) == tag)
        .collect();
    let competing = match class {
        Some(class) => same_tag
            .iter()
            .filter(|&&c| doc.element(c).classes().any(|k| k == class))
            .count(),
        None => same_tag.len(),
    };
    if competing > 1 {
        if let Some(pos) = same_tag.iter().position(|&c| c == node) {
            return format!("{}:nth-of-type({})", base, pos + 1);
        }
    }
    base
}

/// Shallow structural path from the nearest stable anchor down to `node`.
///
/// Walks at most five levels. A stable id ends the walk and becomes the first
/// segment; otherwise each level contributes `tag.class` or the bare tag.
pub fn css_path(doc: &Document, node: NodeId) -> Option<String> {
    let mut segments = Vec::new();
    let mut current = Some(node);
    while let Some(n) = current {
        if segments.len() >= MAX_DEPTH || matches!(doc.tag(n), "body" | "html") {
            break;
        }
        if let Some(id) = stable_id(doc, n) {
            segments.push(format!("#{}", id));
            break;
        }
        segments.push(segment(doc, n));
        current = doc.parent(n);
    }
    if segments.is_empty() {
        return None;
    }
    segments.reverse();
    Some(segments.join(" > "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{query_selector_all, Element};

    #[test]
    fn test_stops_at_stable_id() {
        let mut doc = Document::new("https://example.com/", "Example");
        let body = doc.body();
        let form = doc.append(body, Element::new("form").attr("id", "login"));
        let row = doc.append(form, Element::new("div").attr("class", "row css-1x2y3z"));
        let button = doc.append(row, Element::new("button").attr("class", "btn active"));

        let path = css_path(&doc, button).unwrap();
        assert_eq!(path, "#login > div.row > button.btn");
        assert_eq!(query_selector_all(&doc, &path).unwrap(), vec![button]);
    }

    #[test]
    fn test_nth_of_type_only_when_ambiguous() {
        let mut doc = Document::new("https://example.com/", "Example");
        let body = doc.body();
        let list = doc.append(body, Element::new("ul").attr("id", ":r0:"));
        doc.append(list, Element::new("li").text("one"));
        let second = doc.append(list, Element::new("li").text("two"));

        let path = css_path(&doc, second).unwrap();
        assert_eq!(path, "ul > li:nth-of-type(2)");
        assert_eq!(query_selector_all(&doc, &path).unwrap(), vec![second]);
    }
}
