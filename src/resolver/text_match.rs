use crate::dom::text::{normalize_for_match, squash};
use crate::dom::{Document, NodeId};
use crate::fingerprint::classify::is_interactive;

/// Containment matches must be within this relative length difference.
const MAX_LENGTH_SKEW: f64 = 0.5;

/// Visible, non-overlay elements in document order.
pub(crate) fn live_elements(doc: &Document) -> impl Iterator<Item = NodeId> + '_ {
    doc.all_elements()
        .into_iter()
        .filter(move |&n| !doc.is_overlay(n) && doc.is_visible(n))
}

/// Shorter text is contained in the longer and their lengths differ by less
/// than half of the longer one.
pub(crate) fn close_containment(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    if !longer.contains(shorter) {
        return false;
    }
    let (s, l) = (shorter.chars().count() as f64, longer.chars().count() as f64);
    (l - s) / l < MAX_LENGTH_SKEW
}

/// Among equally matching nodes prefer an interactive one, then the innermost.
pub(crate) fn pick_innermost(doc: &Document, candidates: &[NodeId]) -> Option<NodeId> {
    if let Some(&hit) = candidates.iter().find(|&&n| is_interactive(doc, n)) {
        return Some(hit);
    }
    candidates
        .iter()
        .copied()
        .find(|&n| {
            !candidates
                .iter()
                .any(|&other| other != n && doc.is_inclusive_descendant(other, n))
        })
        .or_else(|| candidates.first().copied())
}

/// Text-and-tag match: exact, then whitespace-insensitive, then guarded
/// containment.
pub(crate) fn text_and_tag(doc: &Document, text: &str, tag: &str) -> Option<NodeId> {
    let target = normalize_for_match(text);
    if target.is_empty() {
        return None;
    }
    let tag = tag.to_ascii_lowercase();
    let candidates: Vec<(NodeId, String)> = live_elements(doc)
        .filter(|&n| doc.tag(n) == tag)
        .map(|n| (n, normalize_for_match(&doc.text_content(n))))
        .filter(|(_, t)| !t.is_empty())
        .collect();

    if let Some((n, _)) = candidates.iter().find(|(_, t)| *t == target) {
        return Some(*n);
    }
    let squashed = squash(&target);
    if let Some((n, _)) = candidates.iter().find(|(_, t)| squash(t) == squashed) {
        return Some(*n);
    }
    candidates
        .iter()
        .find(|(_, t)| close_containment(t, &target))
        .map(|(n, _)| *n)
}

/// Exact normalized text equality on any visible element.
pub(crate) fn plain_text(doc: &Document, text: &str) -> Option<NodeId> {
    let target = normalize_for_match(text);
    if target.is_empty() {
        return None;
    }
    let hits: Vec<NodeId> = live_elements(doc)
        .filter(|&n| normalize_for_match(&doc.text_content(n)) == target)
        .collect();
    pick_innermost(doc, &hits)
}

/// Exact phrase lookup over interactive elements: text, then aria-label, then
/// a non-interactive exact-text element's interactive ancestor.
pub(crate) fn exact_phrase(doc: &Document, phrase: &str) -> Option<NodeId> {
    let target = normalize_for_match(phrase);
    if target.is_empty() {
        return None;
    }
    let live: Vec<NodeId> = live_elements(doc).collect();

    if let Some(&n) = live
        .iter()
        .find(|&&n| is_interactive(doc, n) && normalize_for_match(&doc.text_content(n)) == target)
    {
        return Some(n);
    }
    if let Some(&n) = live.iter().find(|&&n| {
        is_interactive(doc, n)
            && doc
                .attr(n, "aria-label")
                .is_some_and(|label| normalize_for_match(label) == target)
    }) {
        return Some(n);
    }
    live.iter()
        .filter(|&&n| !is_interactive(doc, n) && normalize_for_match(&doc.text_content(n)) == target)
        .find_map(|&n| doc.ancestors(n).find(|&a| is_interactive(doc, a)))
}

/// Rendered text is equal to, a superset of or a subset of `expected`.
pub(crate) fn text_overlaps(doc: &Document, node: NodeId, expected: &str) -> bool {
    let actual = normalize_for_match(&doc.text_content(node));
    let expected = normalize_for_match(expected);
    if actual.is_empty() || expected.is_empty() {
        return false;
    }
    actual.contains(&expected) || expected.contains(&actual)
}
