//! Page scans: id uniqueness, id spaces and idempotence

mod common;

use std::collections::HashSet;

use common::profile_page;
use guideme::dom::DomSnapshot;
use guideme::fingerprint::{Extraction, Extractor, SCAN_ID_ATTR};
use guideme::Document;

fn tuples(extraction: &Extraction) -> Vec<(String, String, String)> {
    extraction
        .elements
        .iter()
        .map(|d| {
            (
                d.text.clone(),
                format!("{:?}", d.element_type),
                format!("{:?}", d.location),
            )
        })
        .collect()
}

#[test]
fn test_rescan_is_idempotent_apart_from_ids() {
    let mut doc = profile_page("https://example.com/profile");
    let mut extractor = Extractor::default();
    let first = extractor.extract(&mut doc);
    let second = extractor.extract(&mut doc);

    assert_eq!(tuples(&first), tuples(&second));
    assert_eq!(extractor.scan_count(), 2);
    assert!(second.scan > first.scan);
    assert!(!first.elements.is_empty());

    let ids: HashSet<_> = first.elements.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids.len(), first.elements.len(), "ids unique within a scan");
    assert!(second.elements.iter().all(|d| !ids.contains(d.id.as_str())));
}

#[test]
fn test_scan_ids_only_touch_their_own_attribute() {
    let original = profile_page("https://example.com/profile");
    let mut doc = original.clone();
    Extractor::default().extract(&mut doc);

    for node in doc.all_elements() {
        let mut attrs: Vec<_> = doc
            .element(node)
            .attributes
            .iter()
            .filter(|(k, _)| k != SCAN_ID_ATTR)
            .cloned()
            .collect();
        attrs.sort();
        let mut before = original.element(node).attributes.clone();
        before.sort();
        assert_eq!(attrs, before);
    }
}

#[test]
fn test_scan_over_browser_snapshot() {
    let json = r#"{
        "url": "https://example.com/login",
        "title": "Sign in",
        "viewport": {"width": 1024, "height": 768},
        "root": {"tag": "html", "bounds": {"x": 0, "y": 0, "width": 1024, "height": 768}, "children": [
            {"tag": "body", "bounds": {"x": 0, "y": 0, "width": 1024, "height": 768}, "children": [
                {"tag": "input", "attributes": {"type": "email", "name": "email", "placeholder": "Email"},
                 "bounds": {"x": 100, "y": 100, "width": 200, "height": 30}},
                {"tag": "button", "attributes": {"type": "submit"}, "text": "Sign in",
                 "bounds": {"x": 100, "y": 150, "width": 100, "height": 30}},
                {"tag": "button", "text": "Hidden", "style": {"display": "none"},
                 "bounds": {"x": 0, "y": 0, "width": 0, "height": 0}}
            ]}
        ]}
    }"#;
    let snapshot: DomSnapshot = serde_json::from_str(json).unwrap();
    let mut doc = Document::from(snapshot);
    let extraction = Extractor::default().extract(&mut doc);

    let texts: Vec<_> = extraction.elements.iter().map(|d| d.text.as_str()).collect();
    assert!(texts.contains(&"Sign in"));
    assert!(!texts.contains(&"Hidden"));
    assert_eq!(extraction.title, "Sign in");
}
