//! The page a guide runs against.
//!
//! [`PageHost`] is the seam between the guide core and a live page. The
//! Chrome driver implements it over CDP; [`MemoryPage`] implements it over an
//! in-memory [`Document`] for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dom::{BoundingBox, Document, NodeId};
use crate::error::{GuideError, Result};
use crate::fingerprint::SCAN_ID_ATTR;

/// How the current document was reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationType {
    #[default]
    Navigate,
    Reload,
    BackForward,
    Prerender,
}

impl NavigationType {
    /// Parse a `PerformanceNavigationTiming.type` value.
    pub fn from_timing_type(value: &str) -> Self {
        match value {
            "reload" => NavigationType::Reload,
            "back_forward" => NavigationType::BackForward,
            "prerender" => NavigationType::Prerender,
            _ => NavigationType::Navigate,
        }
    }
}

#[async_trait]
pub trait PageHost: Send + Sync {
    /// Full fresh read of the live page.
    async fn capture(&self) -> Result<Document>;

    /// Mirror the scan-id attributes of `doc` onto the live page.
    async fn sync_scan_ids(&self, doc: &Document) -> Result<()>;

    async fn click(&self, doc: &Document, node: NodeId) -> Result<()>;

    async fn type_text(&self, doc: &Document, node: NodeId, text: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    async fn navigation_type(&self) -> Result<NavigationType>;

    async fn highlight(&self, bounds: BoundingBox, label: &str) -> Result<()>;

    async fn clear_highlight(&self) -> Result<()>;
}

/// Reports each URL change exactly once.
#[derive(Debug, Clone, Default)]
pub struct UrlWatch {
    last: Option<String>,
}

impl UrlWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the current URL; returns it when it differs from the last one seen.
    /// The first observation only sets the baseline.
    pub fn observe(&mut self, url: &str) -> Option<String> {
        match &self.last {
            Some(last) if last == url => None,
            Some(_) => {
                self.last = Some(url.to_string());
                Some(url.to_string())
            }
            None => {
                self.last = Some(url.to_string());
                None
            }
        }
    }

    pub fn reset(&mut self, url: &str) {
        self.last = Some(url.to_string());
    }
}

#[derive(Debug, Default)]
struct PageState {
    /// The front is live; each capture advances to the next queued state.
    frames: VecDeque<Document>,
    navigation: NavigationType,
    highlight: Option<(BoundingBox, String)>,
    clicks: Vec<NodeId>,
    typed: Vec<(NodeId, String)>,
    captures: usize,
}

/// In-memory page host.
#[derive(Debug, Default)]
pub struct MemoryPage {
    state: Mutex<PageState>,
}

impl MemoryPage {
    pub fn new(doc: Document) -> Self {
        let page = Self::default();
        page.load(doc, NavigationType::Navigate);
        page
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut PageState) -> T) -> Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| GuideError::Other("page state lock poisoned".to_string()))?;
        Ok(f(&mut state))
    }

    /// Replace the page, as a navigation of the given kind would.
    pub fn load(&self, doc: Document, navigation: NavigationType) {
        let _ = self.with_state(|s| {
            s.frames.clear();
            s.frames.push_back(doc);
            s.navigation = navigation;
            s.highlight = None;
        });
    }

    /// Queue a later state of the same page, shown from the next capture on.
    /// Models content that renders after a delay.
    pub fn then_render(&self, doc: Document) {
        let _ = self.with_state(|s| s.frames.push_back(doc));
    }

    /// Change the URL in place, as a client-side route change does.
    pub fn set_url(&self, url: &str) {
        let _ = self.with_state(|s| {
            if let Some(front) = s.frames.front_mut() {
                front.url = url.to_string();
            }
        });
    }

    pub fn clicks(&self) -> Vec<NodeId> {
        self.with_state(|s| s.clicks.clone()).unwrap_or_default()
    }

    pub fn typed(&self) -> Vec<(NodeId, String)> {
        self.with_state(|s| s.typed.clone()).unwrap_or_default()
    }

    pub fn highlighted(&self) -> Option<(BoundingBox, String)> {
        self.with_state(|s| s.highlight.clone()).ok().flatten()
    }

    pub fn capture_count(&self) -> usize {
        self.with_state(|s| s.captures).unwrap_or_default()
    }
}

#[async_trait]
impl PageHost for MemoryPage {
    async fn capture(&self) -> Result<Document> {
        self.with_state(|s| {
            s.captures += 1;
            let doc = s.frames.front().cloned().ok_or(GuideError::NoPage);
            if s.frames.len() > 1 {
                s.frames.pop_front();
            }
            doc
        })?
    }

    async fn sync_scan_ids(&self, doc: &Document) -> Result<()> {
        self.with_state(|s| {
            let Some(live) = s.frames.front_mut() else {
                return;
            };
            if live.len() != doc.len() {
                return;
            }
            for node in doc.all_elements() {
                match doc.attr(node, SCAN_ID_ATTR) {
                    Some(id) => live.set_attr(node, SCAN_ID_ATTR, id),
                    None => live.remove_attr(node, SCAN_ID_ATTR),
                }
            }
        })
    }

    async fn click(&self, doc: &Document, node: NodeId) -> Result<()> {
        if doc.get(node).is_none() {
            return Err(GuideError::ElementNotFound(format!("{:?}", node)));
        }
        self.with_state(|s| s.clicks.push(node))
    }

    async fn type_text(&self, doc: &Document, node: NodeId, text: &str) -> Result<()> {
        if doc.get(node).is_none() {
            return Err(GuideError::ElementNotFound(format!("{:?}", node)));
        }
        self.with_state(|s| {
            if let Some(live) = s.frames.front_mut() {
                if live.get(node).is_some() {
                    live.set_attr(node, "value", text);
                }
            }
            s.typed.push((node, text.to_string()));
        })
    }

    async fn current_url(&self) -> Result<String> {
        self.with_state(|s| s.frames.front().map(|d| d.url.clone()).ok_or(GuideError::NoPage))?
    }

    async fn navigation_type(&self) -> Result<NavigationType> {
        self.with_state(|s| s.navigation)
    }

    async fn highlight(&self, bounds: BoundingBox, label: &str) -> Result<()> {
        self.with_state(|s| s.highlight = Some((bounds, label.to_string())))
    }

    async fn clear_highlight(&self) -> Result<()> {
        self.with_state(|s| s.highlight = None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Element;

    #[test]
    fn test_url_watch_reports_each_change_once() {
        let mut watch = UrlWatch::new();
        assert_eq!(watch.observe("https://a.test/"), None);
        assert_eq!(watch.observe("https://a.test/"), None);
        assert_eq!(watch.observe("https://a.test/x").as_deref(), Some("https://a.test/x"));
        assert_eq!(watch.observe("https://a.test/x"), None);
    }

    #[test]
    fn test_navigation_type_parsing() {
        assert_eq!(NavigationType::from_timing_type("back_forward"), NavigationType::BackForward);
        assert_eq!(NavigationType::from_timing_type("navigate"), NavigationType::Navigate);
        assert_eq!(NavigationType::from_timing_type("???"), NavigationType::Navigate);
    }

    #[tokio::test]
    async fn test_memory_page_frames() {
        let first = Document::new("https://a.test/", "A");
        let mut later = first.clone();
        let body = later.body();
        later.append(body, Element::new("button").text("Late"));

        let page = MemoryPage::new(first);
        page.then_render(later);
        assert_eq!(page.capture().await.unwrap().len(), 2);
        assert_eq!(page.capture().await.unwrap().len(), 3);
        assert_eq!(page.capture().await.unwrap().len(), 3);
        assert_eq!(page.capture_count(), 3);
    }
}
