use serde::{Deserialize, Serialize};

use super::step::Step;
use crate::host::NavigationType;

/// Working state of one guide run; also the persisted resumption snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuideSession {
    pub original_task: String,
    /// Current page batch.
    pub steps: Vec<Step>,
    pub step_index: usize,
    /// Cross-page log of everything done so far.
    pub completed_steps: Vec<Step>,
    /// Canonical log used when saving; appended only on confirmed completion.
    pub all_steps_for_saving: Vec<Step>,
    pub visited_urls: Vec<String>,
    pub is_replay_mode: bool,
    pub is_recorded_guide: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_guide_id: Option<String>,
    pub continuation_count: u32,
    pub is_multi_page_task: bool,
    /// Milliseconds since the epoch of the last save.
    pub saved_at: i64,
    /// Set once the guide is finished; any tab's resume check honours it.
    pub completed: bool,
    /// Steps completed before the current page batch began.
    pub steps_before_page: usize,
    pub edited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,
}

impl GuideSession {
    pub fn new(task: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            original_task: task.into(),
            steps,
            ..Default::default()
        }
    }

    /// A saved or recorded guide replayed without the planner.
    pub fn replay(task: impl Into<String>, steps: Vec<Step>, recorded: bool) -> Self {
        Self {
            is_replay_mode: true,
            is_recorded_guide: recorded,
            ..Self::new(task, steps)
        }
    }

    /// Replays never consult the planner.
    pub fn uses_planner(&self) -> bool {
        !self.is_replay_mode && !self.is_recorded_guide
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.steps.get(self.step_index)
    }

    /// Position of `index` (within the page batch) in the whole guide.
    pub fn absolute_index(&self, index: usize) -> usize {
        self.steps_before_page + index
    }

    pub fn record_visit(&mut self, url: &str) {
        if !self.visited_urls.iter().any(|u| u == url) {
            self.visited_urls.push(url.to_string());
        }
    }

    pub fn has_visited(&self, url: &str) -> bool {
        self.visited_urls.iter().any(|u| u == url)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResumePolicy {
    /// Snapshots older than this are discarded.
    pub max_age_ms: i64,
}

impl Default for ResumePolicy {
    fn default() -> Self {
        Self {
            max_age_ms: 5 * 60 * 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscardReason {
    Completed,
    Stale,
    BackForward,
    AlreadyVisited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeDecision {
    /// No snapshot persisted.
    Nothing,
    Resume,
    Discard(DiscardReason),
}

/// Decide whether a persisted snapshot may drive the freshly loaded page.
pub fn check_resume(
    snapshot: Option<&GuideSession>,
    now_ms: i64,
    navigation: NavigationType,
    current_url: &str,
    policy: &ResumePolicy,
) -> ResumeDecision {
    let Some(session) = snapshot else {
        return ResumeDecision::Nothing;
    };
    if session.completed {
        return ResumeDecision::Discard(DiscardReason::Completed);
    }
    if now_ms - session.saved_at > policy.max_age_ms {
        return ResumeDecision::Discard(DiscardReason::Stale);
    }
    match revisit_guard(session, navigation, current_url) {
        Some(reason) => ResumeDecision::Discard(reason),
        None => ResumeDecision::Resume,
    }
}

/// Whether arriving at `url` must not move the guide forward: history
/// traversal never does, nor does a URL the guide already went through.
/// A reload of the page the guide was last on is not a revisit.
pub fn revisit_guard(session: &GuideSession, navigation: NavigationType, url: &str) -> Option<DiscardReason> {
    if navigation == NavigationType::BackForward {
        return Some(DiscardReason::BackForward);
    }
    let reloading_last_page = navigation == NavigationType::Reload
        && session.visited_urls.last().map(String::as_str) == Some(url);
    if session.has_visited(url) && !reloading_last_page {
        return Some(DiscardReason::AlreadyVisited);
    }
    None
}
