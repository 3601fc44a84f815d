//! Full-page scan producing planner-facing element descriptors.

use std::collections::{HashMap, HashSet};

use super::classify::{
    display_text, element_type, hints, is_header_root, is_heading, is_interactive, is_main_root,
    is_modal_root, is_sidebar_root, is_text_entry, location,
};
use super::descriptor::{ElementDescriptor, ElementType, Extraction};
use super::page_context::page_context;
use crate::dom::text::truncate_chars;
use crate::dom::{Document, NodeId};

/// Attribute carrying the ephemeral scan ID on the live page.
pub const SCAN_ID_ATTR: &str = "data-guideme-id";

const SCAN_ID_PREFIX: &str = "gm-";
const DESCRIPTOR_TEXT_LIMIT: usize = 80;
const CONTEXT_HEADING_LIMIT: usize = 5;

pub const DEFAULT_MAX_ELEMENTS: usize = 100;

/// True for values shaped like `gm-<n>`.
pub fn is_scan_id(value: &str) -> bool {
    value
        .strip_prefix(SCAN_ID_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// Assigns scan IDs and describes candidate elements.
///
/// The ID counter never resets, so two scans of the same untouched page get
/// disjoint ID sets.
#[derive(Debug, Clone)]
pub struct Extractor {
    max_elements: usize,
    next_id: u64,
    scans: u64,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ELEMENTS)
    }
}

impl Extractor {
    pub fn new(max_elements: usize) -> Self {
        Self {
            max_elements,
            next_id: 1,
            scans: 0,
        }
    }

    /// Number of scans performed so far; the current scan's number.
    pub fn scan_count(&self) -> u64 {
        self.scans
    }

    /// Remove every scan ID left by earlier passes.
    pub fn clear(doc: &mut Document) {
        for node in doc.all_elements() {
            if doc.has_attr(node, SCAN_ID_ATTR) {
                doc.remove_attr(node, SCAN_ID_ATTR);
            }
        }
    }

    pub fn extract(&mut self, doc: &mut Document) -> Extraction {
        Self::clear(doc);
        self.scans += 1;

        let order = doc.all_elements();
        let nearby = nearest_headings(doc, &order);
        let mut pass = Pass {
            seen: HashSet::new(),
            ordered: Vec::new(),
        };

        // 0: open dialogs
        for &root in order.iter().filter(|&&n| is_modal_root(doc, n) && doc.is_visible(n)) {
            pass.visit_region(doc, root);
        }
        // 1: header / banner
        for &root in order.iter().filter(|&&n| is_header_root(doc, n)) {
            pass.visit_region(doc, root);
        }
        // 2: navigation landmarks
        for &root in order.iter().filter(|&&n| is_sidebar_root(doc, n)) {
            pass.visit_region(doc, root);
        }
        // 3: main content, plus its top-level headings
        let mut context_headings = Vec::new();
        for &root in order.iter().filter(|&&n| is_main_root(doc, n)) {
            pass.visit_region(doc, root);
            for node in doc.descendants(root) {
                if matches!(doc.tag(node), "h1" | "h2" | "h3") && doc.is_visible(node) {
                    let text = doc.text_content(node);
                    if !text.is_empty() && context_headings.len() < CONTEXT_HEADING_LIMIT {
                        context_headings.push(truncate_chars(&text, DESCRIPTOR_TEXT_LIMIT));
                    }
                    pass.push(node);
                }
            }
        }
        // 4: any remaining interactive element
        for &node in &order {
            if is_interactive(doc, node) {
                pass.push(node);
            }
        }
        // 5: remaining top-level headings
        for &node in &order {
            if matches!(doc.tag(node), "h1" | "h2" | "h3") {
                pass.push(node);
            }
        }

        let mut elements = Vec::new();
        for node in pass.ordered {
            if elements.len() >= self.max_elements {
                break;
            }
            let Some(mut descriptor) = describe(doc, node) else {
                continue;
            };
            let id = format!("{}{}", SCAN_ID_PREFIX, self.next_id);
            self.next_id += 1;
            doc.set_attr(node, SCAN_ID_ATTR, &id);
            descriptor.id = id;
            if descriptor.element_type != ElementType::Heading {
                descriptor.nearby_heading = nearby.get(&node).cloned();
            }
            elements.push(descriptor);
        }

        log::debug!(
            "scan {} of {}: {} descriptors",
            self.scans,
            doc.url,
            elements.len()
        );

        Extraction {
            url: doc.url.clone(),
            title: doc.title.clone(),
            elements,
            page_context: page_context(doc, context_headings),
            scan: self.scans,
        }
    }
}

struct Pass {
    seen: HashSet<NodeId>,
    ordered: Vec<NodeId>,
}

impl Pass {
    fn push(&mut self, node: NodeId) {
        if self.seen.insert(node) {
            self.ordered.push(node);
        }
    }

    fn visit_region(&mut self, doc: &Document, root: NodeId) {
        for node in doc.descendants(root) {
            if is_interactive(doc, node) {
                self.push(node);
            }
        }
    }
}

/// Build a descriptor (without ID) if the element qualifies.
fn describe(doc: &Document, node: NodeId) -> Option<ElementDescriptor> {
    if doc.is_overlay(node) || !doc.is_visible(node) {
        return None;
    }
    let is_input = is_text_entry(doc, node) || doc.tag(node) == "select";
    let text = display_text(doc, node);
    if text.is_empty() && doc.attr_trimmed(node, "aria-label").is_none() && !is_input {
        return None;
    }
    let element_type = if is_heading(doc, node) {
        ElementType::Heading
    } else {
        element_type(doc, node)
    };
    Some(ElementDescriptor {
        id: String::new(),
        text: truncate_chars(&text, DESCRIPTOR_TEXT_LIMIT),
        hints: hints(doc, node, &element_type),
        element_type,
        location: location(doc, node),
        nearby_heading: None,
    })
}

/// For every element, the text of the last visible heading before it.
fn nearest_headings(doc: &Document, order: &[NodeId]) -> HashMap<NodeId, String> {
    let mut out = HashMap::new();
    let mut last: Option<String> = None;
    for &node in order {
        if is_heading(doc, node) && doc.is_visible(node) {
            let text = doc.text_content(node);
            if !text.is_empty() {
                last = Some(truncate_chars(&text, DESCRIPTOR_TEXT_LIMIT));
            }
            continue;
        }
        if let Some(heading) = &last {
            out.insert(node, heading.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Element;
    use crate::fingerprint::Location;

    fn page() -> Document {
        let mut doc = Document::new("https://example.com/settings", "Settings");
        let body = doc.body();
        let main = doc.append(body, Element::new("main"));
        doc.append(main, Element::new("h1").text("Account settings"));
        doc.append(main, Element::new("button").text("Save"));
        let header = doc.append(body, Element::new("header"));
        doc.append(header, Element::new("a").attr("href", "/").text("Home"));
        let dialog = doc.append(body, Element::new("div").attr("role", "dialog"));
        doc.append(dialog, Element::new("button").text("Close"));
        doc.append(body, Element::new("button").text("Hidden").hidden());
        doc.append(body, Element::new("input").attr("name", "q"));
        doc
    }

    #[test]
    fn test_region_priority_order() {
        let mut doc = page();
        let extraction = Extractor::default().extract(&mut doc);
        let texts: Vec<_> = extraction.elements.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["Close", "Home", "Save", "Account settings", "q"]);
        assert_eq!(extraction.elements[0].location, Location::Modal);
        assert_eq!(extraction.elements[3].element_type, ElementType::Heading);
        assert_eq!(
            extraction.elements[2].nearby_heading.as_deref(),
            Some("Account settings")
        );
        assert_eq!(extraction.page_context.headings, vec!["Account settings"]);
    }

    #[test]
    fn test_ids_unique_and_not_reused() {
        let mut doc = page();
        let mut extractor = Extractor::default();
        let first = extractor.extract(&mut doc);
        let second = extractor.extract(&mut doc);

        let a: HashSet<_> = first.elements.iter().map(|d| d.id.clone()).collect();
        let b: HashSet<_> = second.elements.iter().map(|d| d.id.clone()).collect();
        assert_eq!(a.len(), first.elements.len());
        assert!(a.is_disjoint(&b));
        assert_eq!(second.scan, 2);

        let tagged = doc
            .all_elements()
            .into_iter()
            .filter(|&n| doc.has_attr(n, SCAN_ID_ATTR))
            .count();
        assert_eq!(tagged, second.elements.len(), "old IDs are cleared");
    }

    #[test]
    fn test_cap_truncates_in_order() {
        let mut doc = Document::new("https://example.com/", "Many");
        let body = doc.body();
        for i in 0..120 {
            doc.append(body, Element::new("button").text(&format!("Button {}", i)));
        }
        let extraction = Extractor::default().extract(&mut doc);
        assert_eq!(extraction.elements.len(), 100);
        assert_eq!(extraction.elements[99].text, "Button 99");
    }

    #[test]
    fn test_scan_id_shape() {
        assert!(is_scan_id("gm-12"));
        assert!(!is_scan_id("gm-"));
        assert!(!is_scan_id("Edit profile"));
    }
}
