//! Element resolution: find the live element a step refers to.
//!
//! Resolution walks a fixed fallback ladder and returns the first confident
//! hit. A miss is a normal outcome reported as `None`; retries and user
//! affordances belong to the caller.

mod scoring;
mod text_match;

pub use scoring::{extract_keywords, ScoreTable};

use scoring::quoted_phrases;

use serde::Serialize;

use crate::dom::text::normalize_for_match;
use crate::dom::{Document, NodeId, Selector};
use crate::fingerprint::classify::{display_text, is_interactive};
use crate::fingerprint::{is_scan_id, SCAN_ID_ATTR};
use crate::synth::{test_id, SelectorBundle};
use text_match::{
    close_containment, exact_phrase, live_elements, plain_text, text_and_tag, text_overlaps,
};

/// Which rung of the ladder produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchTier {
    TestId,
    AriaLabel,
    Id,
    Name,
    TextAndTag,
    Text,
    Css,
    BundleKeywords,
    ScanId,
    ExactText,
    RawCss,
    Keywords,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub node: NodeId,
    pub tier: MatchTier,
}

/// What is known about the element a step wants.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveRequest<'a> {
    pub bundle: Option<&'a SelectorBundle>,
    /// Scan id from the last extraction, or a raw text/CSS phrase.
    pub legacy_ref: Option<&'a str>,
    pub description: Option<&'a str>,
    /// Honour scan ids; only valid on the page load that produced them.
    pub allow_scan_id: bool,
}

impl<'a> ResolveRequest<'a> {
    pub fn with_bundle(bundle: &'a SelectorBundle) -> Self {
        Self {
            bundle: Some(bundle),
            ..Default::default()
        }
    }

    pub fn with_text(phrase: &'a str) -> Self {
        Self {
            legacy_ref: Some(phrase),
            ..Default::default()
        }
    }

    /// Phrase for the free-text tiers: a non-scan-id reference, else the first
    /// quoted substring of the description.
    fn phrase(&self) -> Option<String> {
        if let Some(r) = self.legacy_ref.map(str::trim).filter(|r| !r.is_empty()) {
            if !is_scan_id(r) {
                return Some(r.to_string());
            }
        }
        self.description
            .and_then(|d| quoted_phrases(d).into_iter().next())
    }

    /// Combined text for keyword extraction.
    fn keyword_source(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(bundle) = self.bundle {
            if let Some(label) = bundle.label() {
                parts.push(label);
            }
        }
        if let Some(r) = self.legacy_ref.filter(|r| !is_scan_id(r.trim())) {
            parts.push(r);
        }
        if let Some(d) = self.description {
            parts.push(d);
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Resolver {
    scores: ScoreTable,
}

impl Resolver {
    pub fn new(scores: ScoreTable) -> Self {
        Self { scores }
    }

    pub fn scores(&self) -> &ScoreTable {
        &self.scores
    }

    pub fn resolve(&self, doc: &Document, request: &ResolveRequest<'_>) -> Option<Resolution> {
        let found = self.ladder(doc, request);
        match &found {
            Some(r) => log::debug!("resolved {:?} via {:?}", r.node, r.tier),
            None => log::debug!(
                "no match for {:?}",
                request.description.or(request.legacy_ref).unwrap_or("<bundle>")
            ),
        }
        found
    }

    fn ladder(&self, doc: &Document, request: &ResolveRequest<'_>) -> Option<Resolution> {
        if let Some(bundle) = request.bundle {
            if let Some(r) = self.bundle_tiers(doc, bundle, request.description) {
                return Some(r);
            }
        }

        if request.allow_scan_id {
            if let Some(scan_id) = request.legacy_ref.map(str::trim).filter(|r| is_scan_id(r)) {
                let node = live_elements(doc).find(|&n| doc.attr(n, SCAN_ID_ATTR) == Some(scan_id));
                if let Some(node) = node {
                    return Some(Resolution { node, tier: MatchTier::ScanId });
                }
            }
        }

        if let Some(phrase) = request.phrase() {
            if let Some(node) = exact_phrase(doc, &phrase) {
                return Some(Resolution { node, tier: MatchTier::ExactText });
            }
            if phrase.starts_with(['.', '#', '[']) {
                if let Some(node) = first_visible_match(doc, &phrase) {
                    return Some(Resolution { node, tier: MatchTier::RawCss });
                }
            }
        }

        self.keyword_match(doc, &request.keyword_source())
            .map(|node| Resolution { node, tier: MatchTier::Keywords })
    }

    fn bundle_tiers(
        &self,
        doc: &Document,
        bundle: &SelectorBundle,
        description: Option<&str>,
    ) -> Option<Resolution> {
        let tag = bundle.tag_name.as_deref();
        let context = bundle
            .parent_context
            .as_deref()
            .and_then(|c| Selector::parse(c).ok());
        let pick = |candidates: Vec<NodeId>| prefer(doc, candidates, tag, context.as_ref());

        if let Some(value) = bundle.data_test_id.as_deref() {
            let found = pick(live_elements(doc).filter(|&n| test_id(doc, n) == Some(value)).collect());
            if let Some(node) = found {
                return Some(Resolution { node, tier: MatchTier::TestId });
            }
        }
        if let Some(value) = bundle.aria_label.as_deref() {
            let found = pick(
                live_elements(doc)
                    .filter(|&n| doc.attr_trimmed(n, "aria-label") == Some(value.trim()))
                    .collect(),
            );
            if let Some(node) = found {
                return Some(Resolution { node, tier: MatchTier::AriaLabel });
            }
        }
        if let Some(id) = bundle.id.as_deref() {
            if let Some(node) = doc.element_by_id(id).filter(|&n| doc.is_visible(n) && !doc.is_overlay(n)) {
                return Some(Resolution { node, tier: MatchTier::Id });
            }
        }
        if let Some(name) = bundle.name.as_deref() {
            let found = pick(
                live_elements(doc)
                    .filter(|&n| doc.attr(n, "name") == Some(name))
                    .collect(),
            );
            if let Some(node) = found {
                return Some(Resolution { node, tier: MatchTier::Name });
            }
        }
        if let Some(text) = bundle.text_content.as_deref() {
            if let Some(tag) = tag {
                if let Some(node) = text_and_tag(doc, text, tag) {
                    return Some(Resolution { node, tier: MatchTier::TextAndTag });
                }
            }
            if let Some(node) = plain_text(doc, text) {
                return Some(Resolution { node, tier: MatchTier::Text });
            }
        }
        if let Some(css) = bundle.css_selector.as_deref() {
            let guarded = |n: NodeId| match bundle.text_content.as_deref() {
                Some(text) => text_overlaps(doc, n, text),
                None => true,
            };
            if let Ok(selector) = Selector::parse(css) {
                if let Some(node) = live_elements(doc).find(|&n| selector.matches(doc, n) && guarded(n)) {
                    return Some(Resolution { node, tier: MatchTier::Css });
                }
            }
        }
        if let Some(description) = description {
            if let Some(node) = self.keyword_match(doc, description) {
                return Some(Resolution { node, tier: MatchTier::BundleKeywords });
            }
        }
        None
    }

    /// Highest-scoring candidate at or above the acceptance threshold; ties go
    /// to the earliest in document order.
    fn keyword_match(&self, doc: &Document, source: &str) -> Option<NodeId> {
        let keywords = extract_keywords(source, self.scores.max_keywords);
        if keywords.is_empty() {
            return None;
        }

        let tagged: Vec<NodeId> = live_elements(doc)
            .filter(|&n| doc.has_attr(n, SCAN_ID_ATTR))
            .collect();
        let pool = if tagged.is_empty() {
            live_elements(doc).filter(|&n| is_interactive(doc, n)).collect()
        } else {
            tagged
        };

        let mut best: Option<(NodeId, i32)> = None;
        for node in pool {
            let score = self.scores.score(&display_text(doc, node), &keywords);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((node, score));
            }
        }
        best.filter(|&(_, score)| self.scores.accepts(score))
            .map(|(node, _)| node)
    }
}

/// First visible match of a raw selector; unsupported syntax is a miss.
fn first_visible_match(doc: &Document, css: &str) -> Option<NodeId> {
    let selector = Selector::parse(css).ok()?;
    live_elements(doc).find(|&n| selector.matches(doc, n))
}

/// Rank candidates by recorded tag and parent context, keeping document order
/// among equals.
fn prefer(
    doc: &Document,
    candidates: Vec<NodeId>,
    tag: Option<&str>,
    context: Option<&Selector>,
) -> Option<NodeId> {
    let rank = |n: NodeId| {
        let tag_match = tag.is_some_and(|t| doc.tag(n).eq_ignore_ascii_case(t));
        let in_context = context.is_some_and(|sel| doc.ancestors(n).any(|a| sel.matches(doc, a)));
        (tag_match as u8) * 2 + in_context as u8
    };
    let mut best: Option<(NodeId, u8)> = None;
    for n in candidates {
        let r = rank(n);
        if best.map_or(true, |(_, top)| r > top) {
            best = Some((n, r));
        }
    }
    best.map(|(n, _)| n)
}

/// True when two labels are close enough to call the same control.
pub fn labels_match(a: &str, b: &str) -> bool {
    let (a, b) = (normalize_for_match(a), normalize_for_match(b));
    a == b || close_containment(&a, &b)
}
