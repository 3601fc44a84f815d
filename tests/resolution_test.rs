//! Element re-identification across DOM churn

mod common;

use common::profile_page;
use guideme::dom::{Document, Element, NodeId};
use guideme::fingerprint::{Extractor, SCAN_ID_ATTR};
use guideme::resolver::{MatchTier, ResolveRequest, Resolver};
use guideme::synth::{synthesize, SelectorBundle};

fn find_text(doc: &Document, text: &str) -> NodeId {
    doc.all_elements()
        .into_iter()
        .find(|&n| doc.text_content(n) == text && doc.tag(n) == "button")
        .expect("fixture element")
}

#[test]
fn test_testid_survives_text_and_class_churn() {
    let mut doc = profile_page("https://example.com/profile");
    let target = find_text(&doc, "Save");
    let bundle = SelectorBundle {
        data_test_id: Some("save-profile".into()),
        ..Default::default()
    };

    // redesign: new copy, new classes, an extra button with the old text
    doc.element_mut(target).text = "Store changes".to_string();
    doc.set_attr(target, "class", "btn-primary css-9q8w7e");
    let body = doc.body();
    doc.append(body, Element::new("button").text("Save").bounds(0.0, 200.0, 80.0, 30.0));

    let hit = Resolver::default()
        .resolve(&doc, &ResolveRequest::with_bundle(&bundle))
        .expect("resolved by test id");
    assert_eq!(hit.node, target);
    assert_eq!(hit.tier, MatchTier::TestId);
}

#[test]
fn test_cleared_scan_id_falls_back_to_aria_label() {
    let mut doc = profile_page("https://example.com/profile");
    let mut extractor = Extractor::default();
    let first = extractor.extract(&mut doc);
    let target = find_text(&doc, "Edit");
    let descriptor = first
        .elements
        .iter()
        .find(|d| Some(d.id.as_str()) == doc.attr(target, SCAN_ID_ATTR))
        .expect("target scanned");
    assert_eq!(descriptor.id, "gm-3");

    // bundle captured while the planner's id was live
    let bundle = synthesize(&doc, target);
    assert_eq!(bundle.aria_label.as_deref(), Some("Edit profile"));

    extractor.extract(&mut doc);
    assert_ne!(doc.attr(target, SCAN_ID_ATTR), Some("gm-3"));

    let request = ResolveRequest {
        bundle: Some(&bundle),
        legacy_ref: Some("gm-3"),
        description: Some("Click \"Edit profile\""),
        allow_scan_id: false,
    };
    let hit = Resolver::default().resolve(&doc, &request).expect("resolved");
    assert_eq!(hit.node, target);
    assert_eq!(hit.tier, MatchTier::AriaLabel);
}

#[test]
fn test_stale_scan_id_alone_is_not_trusted() {
    let mut doc = profile_page("https://example.com/profile");
    let mut extractor = Extractor::default();
    extractor.extract(&mut doc);
    extractor.extract(&mut doc);

    let request = ResolveRequest {
        legacy_ref: Some("gm-3"),
        allow_scan_id: true,
        ..Default::default()
    };
    // gm-3 no longer exists after the second scan
    assert!(Resolver::default().resolve(&doc, &request).is_none());
}

#[test]
fn test_keyword_tie_goes_to_document_order() {
    let mut doc = Document::new("https://example.com/cart", "Cart");
    let body = doc.body();
    let first = doc.append(
        body,
        Element::new("button").text("Remove item").bounds(0.0, 0.0, 100.0, 30.0),
    );
    doc.append(
        body,
        Element::new("button").text("Remove item").bounds(0.0, 40.0, 100.0, 30.0),
    );

    let request = ResolveRequest {
        description: Some("Click remove item to empty the cart"),
        ..Default::default()
    };
    let hit = Resolver::default().resolve(&doc, &request).expect("resolved");
    assert_eq!(hit.node, first);
}
