use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::describe::{causes_navigation, click_target, describe, is_field, is_password, same_field};
use super::{ActiveRecording, EventKind, RecordedEvent, RecorderState, RecordingResult};
use crate::dom::{Document, NodeId};
use crate::error::{GuideError, Result};
use crate::fingerprint::classify::is_text_entry;
use crate::guide::{page_pattern, Step, StepAction};
use crate::storage::{get_json, keys, KeyValueStore, StorageError};
use crate::synth::{synthesize, SelectorBundle};

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn opens_for_typing(doc: &Document, node: NodeId) -> bool {
    is_text_entry(doc, node)
        || doc.tag(node) == "select"
        || doc.attr(node, "contenteditable").is_some_and(|v| v != "false")
}

fn is_toggle(doc: &Document, node: NodeId) -> bool {
    doc.tag(node) == "input"
        && doc
            .attr(node, "type")
            .is_some_and(|t| matches!(t.to_ascii_lowercase().as_str(), "checkbox" | "radio"))
}

/// The step still open for this field: only the latest step qualifies, so a
/// field revisited after other steps gets a step of its own.
fn open_field_step(steps: &[Step], bundle: &SelectorBundle, page: &Option<String>) -> Option<usize> {
    let index = steps.len().checked_sub(1)?;
    let last = &steps[index];
    let open = matches!(last.action, StepAction::Focus | StepAction::Type | StepAction::Select)
        && &last.page_url_pattern == page
        && last.selector_bundle.as_ref().is_some_and(|b| same_field(b, bundle));
    open.then_some(index)
}

/// Turns raw interactions into steps.
///
/// Navigation-causing steps are written to storage before returning; others
/// are written after a debounce, each new event restarting the wait.
pub struct Recorder {
    store: Arc<dyn KeyValueStore>,
    debounce: Duration,
    state: RecorderState,
    active: Option<ActiveRecording>,
    generation: Arc<AtomicU64>,
}

impl Recorder {
    pub fn new(store: Arc<dyn KeyValueStore>, debounce: Duration) -> Self {
        Self {
            store,
            debounce,
            state: RecorderState::Idle,
            active: None,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn steps(&self) -> &[Step] {
        self.active.as_ref().map(|a| a.steps.as_slice()).unwrap_or(&[])
    }

    pub async fn start(&mut self, url: &str) -> Result<()> {
        self.active = Some(ActiveRecording {
            start_url: url.to_string(),
            current_url: url.to_string(),
            started_at: now_ms(),
            ..Default::default()
        });
        self.state = RecorderState::Recording;
        log::info!("recording started on {}", url);
        self.save_now().await
    }

    pub async fn pause(&mut self) -> Result<()> {
        if self.state != RecorderState::Recording {
            return Err(GuideError::NotRecording);
        }
        self.state = RecorderState::Paused;
        if let Some(active) = self.active.as_mut() {
            active.paused = true;
        }
        self.save_now().await
    }

    pub async fn resume(&mut self) -> Result<()> {
        if self.state != RecorderState::Paused {
            return Err(GuideError::NotRecording);
        }
        self.state = RecorderState::Recording;
        if let Some(active) = self.active.as_mut() {
            active.paused = false;
        }
        self.save_now().await
    }

    /// Pick up a recording persisted by an earlier page.
    pub async fn restore(&mut self, url: &str) -> Result<RecorderState> {
        let stored: Option<ActiveRecording> = get_json(self.store.as_ref(), keys::ACTIVE_RECORDING).await?;
        if let Some(mut active) = stored {
            active.current_url = url.to_string();
            self.state = if active.paused {
                RecorderState::Paused
            } else {
                RecorderState::Recording
            };
            log::info!("continuing recording with {} step(s) on {}", active.steps.len(), url);
            self.active = Some(active);
        }
        Ok(self.state)
    }

    /// Record one interaction. Returns the index of the created or updated
    /// step, or `None` when the event was ignored.
    pub async fn record(&mut self, doc: &Document, event: &RecordedEvent) -> Result<Option<usize>> {
        if self.state != RecorderState::Recording {
            return Ok(None);
        }
        let node = event.target;
        if doc.get(node).is_none() || doc.is_overlay(node) {
            return Ok(None);
        }
        let outcome = match event.kind {
            EventKind::Click => self.record_click(doc, node),
            EventKind::Input | EventKind::Change | EventKind::Blur => self.record_input(doc, node, event),
        };
        let Some((index, navigates)) = outcome else {
            return Ok(None);
        };
        if navigates {
            self.save_now().await?;
        } else {
            self.schedule_save();
        }
        Ok(Some(index))
    }

    fn record_click(&mut self, doc: &Document, node: NodeId) -> Option<(usize, bool)> {
        let target = click_target(doc, node);
        if is_password(doc, target) {
            log::debug!("skipping password field");
            return None;
        }
        let bundle = synthesize(doc, target);
        let page = page_pattern(&doc.url);
        let active = self.active.as_mut()?;

        if opens_for_typing(doc, target) {
            if let Some(index) = open_field_step(&active.steps, &bundle, &page) {
                return Some((index, false));
            }
            let mut step = Step::new(describe(StepAction::Focus, &bundle, None), StepAction::Focus);
            step.selector_bundle = Some(bundle);
            step.page_url_pattern = page;
            active.steps.push(step);
            return Some((active.steps.len() - 1, false));
        }

        let navigates = causes_navigation(doc, target);
        let mut step = Step::new(describe(StepAction::Click, &bundle, None), StepAction::Click);
        step.selector_bundle = Some(bundle);
        step.page_url_pattern = page;
        step.causes_navigation = navigates;
        active.steps.push(step);
        Some((active.steps.len() - 1, navigates))
    }

    fn record_input(&mut self, doc: &Document, node: NodeId, event: &RecordedEvent) -> Option<(usize, bool)> {
        let target = click_target(doc, node);
        if !is_field(doc, target) || is_toggle(doc, target) {
            return None;
        }
        if is_password(doc, target) {
            log::debug!("skipping password field");
            return None;
        }
        let value = event
            .value
            .clone()
            .or_else(|| doc.attr(target, "value").map(str::to_string))
            .unwrap_or_default();
        let action = if doc.tag(target) == "select" {
            StepAction::Select
        } else {
            StepAction::Type
        };
        let bundle = synthesize(doc, target);
        let page = page_pattern(&doc.url);
        let active = self.active.as_mut()?;

        if let Some(index) = open_field_step(&active.steps, &bundle, &page) {
            let step = &mut active.steps[index];
            if event.kind == EventKind::Blur && value.is_empty() {
                return None;
            }
            step.action = action;
            step.description = describe(action, &bundle, Some(&value));
            step.value = Some(value);
            return Some((index, false));
        }
        if value.is_empty() {
            return None;
        }
        let mut step = Step::new(describe(action, &bundle, Some(&value)), action).with_value(value);
        step.selector_bundle = Some(bundle);
        step.page_url_pattern = page;
        active.steps.push(step);
        Some((active.steps.len() - 1, false))
    }

    /// The page moved to `url` while recording.
    pub async fn note_navigation(&mut self, url: &str) -> Result<()> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        active.current_url = url.to_string();
        self.save_now().await
    }

    pub async fn stop(&mut self) -> Result<RecordingResult> {
        let active = self.active.take().ok_or(GuideError::NotRecording)?;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state = RecorderState::Idle;

        let result = RecordingResult {
            steps: active.steps,
            start_url: active.start_url,
            end_url: active.current_url,
            duration_ms: (now_ms() - active.started_at).max(0),
        };
        let value = serde_json::to_value(&result).map_err(StorageError::from)?;
        self.store.set(keys::COMPLETED_RECORDING, value).await?;
        self.store.remove(keys::ACTIVE_RECORDING).await?;
        log::info!(
            "recording stopped: {} step(s) in {}ms",
            result.steps.len(),
            result.duration_ms
        );
        Ok(result)
    }

    /// Consume the last completed recording, if any.
    pub async fn take_completed(store: &dyn KeyValueStore) -> Result<Option<RecordingResult>> {
        let result: Option<RecordingResult> = get_json(store, keys::COMPLETED_RECORDING).await?;
        if result.is_some() {
            store.remove(keys::COMPLETED_RECORDING).await?;
        }
        Ok(result)
    }

    async fn save_now(&mut self) -> Result<()> {
        // supersede any pending debounced write
        self.generation.fetch_add(1, Ordering::SeqCst);
        let Some(active) = self.active.as_ref() else {
            return Ok(());
        };
        let value = serde_json::to_value(active).map_err(StorageError::from)?;
        self.store.set(keys::ACTIVE_RECORDING, value).await?;
        Ok(())
    }

    fn schedule_save(&mut self) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        let value = match serde_json::to_value(active) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("could not serialize recording: {}", e);
                return;
            }
        };
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let latest = self.generation.clone();
        let store = self.store.clone();
        let delay = self.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if latest.load(Ordering::SeqCst) != generation {
                return;
            }
            if let Err(e) = store.set(keys::ACTIVE_RECORDING, value).await {
                log::warn!("debounced recording save failed: {}", e);
            }
        });
    }
}
