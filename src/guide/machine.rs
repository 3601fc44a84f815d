//! Guide progression across steps, pages and reloads.
//!
//! The machine owns the single working [`GuideSession`]. Every operation that
//! may unload the page persists the session first through
//! [`SessionPersistence::save_now`]; a fresh page load consults the persisted
//! snapshot through [`check_resume`].
//!
//! Resolution attempts carry the [`Interrupt`] epoch they started under. Any
//! step change or stop bumps the epoch, which wakes pending backoff timers and
//! makes the superseded attempt discard its result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use super::session::{check_resume, revisit_guard, DiscardReason, GuideSession, ResumeDecision};
use super::step::{page_pattern, Step, StepAction};
use crate::archive::{ArchiveEntry, GuideArchive};
use crate::config::{GuideConfig, Settings};
use crate::dom::text::truncate_chars;
use crate::dom::{BoundingBox, Document, DomSnapshot, NodeId};
use crate::error::{GuideError, Result};
use crate::fingerprint::{is_loading, is_scan_id, Extraction, Extractor, SCAN_ID_ATTR};
use crate::host::{PageHost, UrlWatch};
use crate::planner::{plan_with_retry, PlannerRequest, StepPlanner};
use crate::resolver::{MatchTier, Resolution, Resolver};
use crate::storage::SessionPersistence;
use crate::synth::synthesize;

const GUIDE_NAME_LIMIT: usize = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Backoff before each repeated resolution attempt.
    pub delays_ms: Vec<u64>,
    /// Pause after performing a step's action before showing the next one.
    pub settle_ms: u64,
    pub planner_attempts: u32,
    pub planner_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delays_ms: vec![500, 1000, 1500],
            settle_ms: 400,
            planner_attempts: 3,
            planner_backoff_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GuideMode {
    /// Planner-driven.
    #[default]
    Live,
    /// Saved guide, no planner.
    Replay,
    /// Freshly recorded guide, no planner.
    Recorded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum GuideState {
    Idle,
    Active {
        page: u32,
    },
    AwaitingContinuation {
        page: u32,
    },
    /// Element unresolved after every retry; waits for a re-scan.
    NotFound {
        page: u32,
        #[serde(rename = "stepIndex")]
        step_index: usize,
    },
    Completed,
}

/// Cancellation epoch shared between the machine and its callers.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    epoch: Arc<AtomicU64>,
    wake: Arc<Notify>,
}

impl Interrupt {
    pub fn current(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.current() == epoch
    }

    /// Invalidate work in flight and wake pending timers.
    pub fn bump(&self) -> u64 {
        let next = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.wake.notify_waiters();
        next
    }

    /// Sleep unless superseded; true when `epoch` is still current afterwards.
    pub async fn sleep(&self, duration: Duration, epoch: u64) -> bool {
        let woken = self.wake.notified();
        if !self.is_current(epoch) {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = woken => {}
        }
        self.is_current(epoch)
    }
}

#[derive(Debug, Clone, Copy)]
struct Highlight {
    step_index: usize,
    node: NodeId,
    bounds: BoundingBox,
    tier: MatchTier,
}

/// What the guide panel shows for the current step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub index: usize,
    pub absolute_index: usize,
    pub total: usize,
    pub description: String,
    pub action: StepAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<MatchTier>,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Archive name derived from the task text.
pub fn guide_name(task: &str) -> String {
    let trimmed = truncate_chars(task.trim(), GUIDE_NAME_LIMIT);
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Untitled guide".to_string(),
    }
}

pub struct GuideMachine {
    host: Arc<dyn PageHost>,
    planner: Arc<dyn StepPlanner>,
    persistence: SessionPersistence,
    archive: GuideArchive,
    config: GuideConfig,
    extractor: Extractor,
    resolver: Resolver,
    interrupt: Interrupt,
    url_watch: UrlWatch,
    state: GuideState,
    page: u32,
    session: Option<GuideSession>,
    /// Session of the last completed guide, kept for a manual save.
    finished: Option<GuideSession>,
    doc: Option<Document>,
    extraction: Option<Extraction>,
    /// Scan ids in the current batch still refer to the live scan.
    scan_ids_live: bool,
    /// The planner marked the current batch as the last one.
    batch_final: bool,
    highlight: Option<Highlight>,
    last_saved_guide: Option<String>,
}

impl GuideMachine {
    pub fn new(
        host: Arc<dyn PageHost>,
        planner: Arc<dyn StepPlanner>,
        persistence: SessionPersistence,
        archive: GuideArchive,
        config: GuideConfig,
    ) -> Self {
        Self {
            host,
            planner,
            persistence,
            archive,
            extractor: Extractor::new(config.max_elements),
            resolver: Resolver::new(config.scores.clone()),
            config,
            interrupt: Interrupt::default(),
            url_watch: UrlWatch::new(),
            state: GuideState::Idle,
            page: 0,
            session: None,
            finished: None,
            doc: None,
            extraction: None,
            scan_ids_live: false,
            batch_final: false,
            highlight: None,
            last_saved_guide: None,
        }
    }

    /// Handle for cancelling work without holding the machine.
    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    pub fn state(&self) -> &GuideState {
        &self.state
    }

    pub fn session(&self) -> Option<&GuideSession> {
        self.session.as_ref()
    }

    pub fn extraction(&self) -> Option<&Extraction> {
        self.extraction.as_ref()
    }

    pub fn dom_snapshot(&self) -> Option<DomSnapshot> {
        self.doc.as_ref().map(Document::to_snapshot)
    }

    pub fn archive(&self) -> &GuideArchive {
        &self.archive
    }

    pub fn settings(&self) -> &Settings {
        &self.config.settings
    }

    /// Apply and persist new settings; they take effect for the next guide.
    pub async fn update_settings(&mut self, settings: Settings) -> Result<()> {
        settings.save(self.persistence.durable().as_ref()).await?;
        log::info!("settings updated (provider {})", settings.provider);
        self.config.settings = settings;
        Ok(())
    }

    /// Id of the guide saved when the last guide completed.
    pub fn last_saved_guide(&self) -> Option<&str> {
        self.last_saved_guide.as_deref()
    }

    pub fn view(&self) -> Option<StepView> {
        let session = self.session.as_ref()?;
        let step = session.current_step()?;
        let highlight = self
            .highlight
            .as_ref()
            .filter(|h| h.step_index == session.step_index);
        Some(StepView {
            index: session.step_index,
            absolute_index: session.absolute_index(session.step_index),
            total: session.steps.len(),
            description: step.description.clone(),
            action: step.action,
            value: step.value.clone(),
            found: highlight.is_some() || !step.action.targets_element(),
            tier: highlight.map(|h| h.tier),
        })
    }

    /// Fresh scan of the live page, for planning outside a guide.
    pub async fn extract(&mut self) -> Result<Extraction> {
        self.scan().await?;
        self.extraction.clone().ok_or(GuideError::NoPage)
    }

    pub async fn start_guide(
        &mut self,
        task: &str,
        steps: Vec<Step>,
        mode: GuideMode,
        saved_guide_id: Option<String>,
    ) -> Result<GuideState> {
        self.interrupt.bump();
        self.clear_highlight().await;
        let url = self.host.current_url().await?;

        let mut session = match mode {
            GuideMode::Live => GuideSession::new(task, steps),
            GuideMode::Replay => GuideSession::replay(task, steps, false),
            GuideMode::Recorded => GuideSession::replay(task, steps, true),
        };
        session.saved_guide_id = saved_guide_id;
        session.start_url = Some(url.clone());
        session.record_visit(&url);
        log::info!("starting {:?} guide \"{}\" on {}", mode, task, url);

        let has_steps = !session.steps.is_empty();
        self.session = Some(session);
        self.finished = None;
        self.last_saved_guide = None;
        self.batch_final = false;
        self.page = 1;
        self.url_watch.reset(&url);
        self.state = GuideState::Active { page: self.page };

        // steps planned by the caller against our last scan keep its ids
        let reuse_scan = mode == GuideMode::Live
            && has_steps
            && self.extraction.as_ref().is_some_and(|e| e.url == url);
        if reuse_scan {
            self.tag_batch_page();
            self.scan_ids_live = true;
        } else {
            self.scan().await?;
        }

        if mode == GuideMode::Live && !has_steps {
            self.persist(false).await?;
            if !self.request_batch().await? {
                return self.empty_batch().await;
            }
        }
        self.persist(false).await?;
        self.show_step().await
    }

    /// Resolve and highlight the current step, retrying with backoff.
    pub async fn show_step(&mut self) -> Result<GuideState> {
        self.clear_highlight().await;
        let (step, index) = loop {
            let session = self.session.as_ref().ok_or(GuideError::NoActiveGuide)?;
            if let Some(step) = session.current_step() {
                break (step.clone(), session.step_index);
            }
            if !self.continue_after_batch().await? {
                return Ok(self.state.clone());
            }
        };
        let epoch = self.interrupt.current();

        if !step.action.targets_element() {
            self.state = GuideState::Active { page: self.page };
            return Ok(self.state.clone());
        }

        // A match on a page still showing spinners may point at placeholder
        // content, so loading pages wait out the ladder before resolving.
        let mut loading = self.doc.as_ref().is_some_and(is_loading);
        let mut found = if loading { None } else { self.try_resolve(&step) };
        let delays = self.config.retry.delays_ms.clone();
        for (attempt, delay) in delays.iter().enumerate() {
            if found.is_some() {
                break;
            }
            if loading {
                log::debug!("page still loading, step {} waits {}ms", index + 1, delay);
            } else {
                log::debug!("step {} not resolved, retry {} in {}ms", index + 1, attempt + 1, delay);
            }
            if !self.interrupt.sleep(Duration::from_millis(*delay), epoch).await {
                return Ok(self.state.clone());
            }
            let doc = self.host.capture().await?;
            loading = is_loading(&doc);
            self.doc = Some(doc);
            if !loading {
                found = self.try_resolve(&step);
            }
        }
        if found.is_none() {
            log::info!("step {} still unresolved, re-scanning", index + 1);
            self.scan().await?;
            found = self.try_resolve(&step);
        }
        if !self.interrupt.is_current(epoch) {
            return Ok(self.state.clone());
        }

        match found {
            Some(resolution) => {
                let bounds = self
                    .doc
                    .as_ref()
                    .and_then(|d| d.get(resolution.node))
                    .map(|e| e.bounds)
                    .ok_or(GuideError::NoPage)?;
                self.host.highlight(bounds, &step.description).await?;
                log::debug!("step {} resolved via {:?}", index + 1, resolution.tier);
                self.highlight = Some(Highlight {
                    step_index: index,
                    node: resolution.node,
                    bounds,
                    tier: resolution.tier,
                });
                self.state = GuideState::Active { page: self.page };
            }
            None => {
                log::warn!("step {} not found: {}", index + 1, step.description);
                self.state = GuideState::NotFound {
                    page: self.page,
                    step_index: index,
                };
            }
        }
        Ok(self.state.clone())
    }

    /// "Next": the user completed the current step themselves.
    pub async fn advance_step(&mut self) -> Result<GuideState> {
        self.interrupt.bump();
        self.complete_current_step()?;
        self.persist(false).await?;
        if self.should_auto_complete() {
            return self.complete().await;
        }
        self.show_step().await
    }

    /// Perform the current step's action on the highlighted element.
    pub async fn click_step(&mut self) -> Result<GuideState> {
        let session = self.session.as_ref().ok_or(GuideError::NoActiveGuide)?;
        let index = session.step_index;
        let step = session.current_step().cloned().ok_or(GuideError::StepOutOfRange {
            index,
            len: session.steps.len(),
        })?;
        let highlight = self
            .highlight
            .filter(|h| h.step_index == index)
            .ok_or_else(|| GuideError::ElementNotFound(step.description.clone()))?;
        let doc = self.doc.clone().ok_or(GuideError::NoPage)?;

        self.interrupt.bump();
        self.complete_current_step()?;
        // the action may unload the page; never dispatch on an unconfirmed save
        self.persist(true).await?;

        match (step.action, step.value.as_deref()) {
            (StepAction::Type | StepAction::Select, Some(value)) => {
                self.host.type_text(&doc, highlight.node, value).await?
            }
            _ => self.host.click(&doc, highlight.node).await?,
        }

        let epoch = self.interrupt.current();
        let settle = Duration::from_millis(self.config.retry.settle_ms);
        if !self.interrupt.sleep(settle, epoch).await {
            return Ok(self.state.clone());
        }
        let url = self.host.current_url().await?;
        if let Some(changed) = self.url_watch.observe(&url) {
            return self.on_url_changed(&changed).await;
        }
        if self.should_auto_complete() {
            return self.complete().await;
        }
        self.show_step().await
    }

    pub async fn retreat_step(&mut self) -> Result<GuideState> {
        self.interrupt.bump();
        let session = self.session.as_mut().ok_or(GuideError::NoActiveGuide)?;
        if session.step_index > 0 {
            session.step_index -= 1;
            if session.completed_steps.len() > session.steps_before_page {
                session.completed_steps.pop();
                session.all_steps_for_saving.pop();
            }
        }
        self.persist(false).await?;
        self.show_step().await
    }

    /// Rewrite the description of step `index` of the current batch.
    pub async fn edit_step(&mut self, index: usize, description: &str) -> Result<GuideState> {
        let text = description.trim().to_string();
        let session = self.session.as_mut().ok_or(GuideError::NoActiveGuide)?;
        let len = session.steps.len();
        let step = session
            .steps
            .get_mut(index)
            .ok_or(GuideError::StepOutOfRange { index, len })?;
        step.description = text.clone();

        let absolute = session.absolute_index(index);
        if let Some(done) = session.completed_steps.get_mut(absolute) {
            done.description = text.clone();
        }
        if let Some(saved) = session.all_steps_for_saving.get_mut(absolute) {
            saved.description = text.clone();
        }
        session.edited = true;
        let current = session.step_index;

        if let Some(id) = session.saved_guide_id.clone() {
            self.archive.update_step_description(&id, absolute, &text).await?;
        }
        self.persist(false).await?;

        if index == current {
            if let Some(h) = self.highlight.filter(|h| h.step_index == current) {
                self.host.highlight(h.bounds, &text).await?;
            }
        }
        Ok(self.state.clone())
    }

    pub async fn delete_step(&mut self, index: usize) -> Result<GuideState> {
        let session = self.session.as_mut().ok_or(GuideError::NoActiveGuide)?;
        let len = session.steps.len();
        if index >= len {
            return Err(GuideError::StepOutOfRange { index, len });
        }
        session.steps.remove(index);
        let absolute = session.absolute_index(index);
        if absolute < session.completed_steps.len() {
            session.completed_steps.remove(absolute);
        }
        if absolute < session.all_steps_for_saving.len() {
            session.all_steps_for_saving.remove(absolute);
        }
        let was_current = index == session.step_index;
        if index < session.step_index {
            session.step_index -= 1;
        }
        session.edited = true;

        if let Some(id) = session.saved_guide_id.clone() {
            self.archive.delete_step(&id, absolute).await?;
        }
        self.persist(false).await?;

        if was_current {
            self.interrupt.bump();
            return self.show_step().await;
        }
        if let Some(h) = self.highlight.as_mut() {
            if index < h.step_index {
                h.step_index -= 1;
            }
        }
        Ok(self.state.clone())
    }

    /// Stop the guide. A full stop ends resumability for every tab; a local
    /// stop leaves the shared snapshot for other tabs.
    pub async fn stop(&mut self, full: bool) -> Result<GuideState> {
        self.interrupt.bump();
        self.clear_highlight().await;
        self.session = None;
        self.batch_final = false;
        if full {
            self.persistence.clear_shared().await;
        } else {
            self.persistence.clear_local();
        }
        log::info!("guide stopped ({})", if full { "full" } else { "local" });
        self.state = GuideState::Idle;
        Ok(self.state.clone())
    }

    /// Re-scan the page and retry the current step; re-plans when waiting
    /// on a continuation.
    pub async fn rescan(&mut self) -> Result<GuideState> {
        self.interrupt.bump();
        let uses_planner = self
            .session
            .as_ref()
            .ok_or(GuideError::NoActiveGuide)?
            .uses_planner();
        self.scan().await?;
        if uses_planner && matches!(self.state, GuideState::AwaitingContinuation { .. }) {
            if !self.request_batch().await? {
                return self.empty_batch().await;
            }
            self.persist(false).await?;
        }
        self.show_step().await
    }

    /// Entry point for a freshly loaded document.
    pub async fn on_page_load(&mut self) -> Result<GuideState> {
        let url = self.host.current_url().await?;
        let navigation = self.host.navigation_type().await?;
        self.url_watch.reset(&url);
        self.interrupt.bump();
        self.highlight = None;

        let snapshot = self.persistence.load_latest().await;
        match check_resume(snapshot.as_ref(), now_ms(), navigation, &url, &self.config.resume) {
            ResumeDecision::Resume => {
                let Some(mut session) = snapshot else {
                    return Ok(self.state.clone());
                };
                session.record_visit(&url);
                log::info!(
                    "resuming \"{}\" at step {} on {}",
                    session.original_task,
                    session.completed_steps.len() + 1,
                    url
                );
                self.session = Some(session);
                self.enter_page().await
            }
            ResumeDecision::Discard(reason) => {
                log::info!("discarding guide snapshot on {}: {:?}", url, reason);
                if matches!(reason, DiscardReason::Completed | DiscardReason::Stale) {
                    self.persistence.clear_shared().await;
                }
                self.session = None;
                self.state = GuideState::Idle;
                Ok(self.state.clone())
            }
            ResumeDecision::Nothing => {
                self.session = None;
                self.state = GuideState::Idle;
                Ok(self.state.clone())
            }
        }
    }

    /// Same-document route change.
    pub async fn on_url_changed(&mut self, url: &str) -> Result<GuideState> {
        self.url_watch.reset(url);
        if matches!(self.state, GuideState::Idle | GuideState::Completed) {
            return Ok(self.state.clone());
        }
        if self.session.is_none() {
            return Ok(self.state.clone());
        }
        let navigation = self.host.navigation_type().await?;
        let guard = self
            .session
            .as_ref()
            .and_then(|s| revisit_guard(s, navigation, url));
        if let Some(reason) = guard {
            log::info!("not advancing on {}: {:?}", url, reason);
            self.interrupt.bump();
            self.clear_highlight().await;
            return Ok(self.state.clone());
        }
        let Some(session) = self.session.as_mut() else {
            return Ok(self.state.clone());
        };
        session.record_visit(url);
        log::info!("route changed to {}", url);
        self.enter_page().await
    }

    /// Poll the host URL and react to a change.
    pub async fn poll_url(&mut self) -> Result<GuideState> {
        let url = self.host.current_url().await?;
        match self.url_watch.observe(&url) {
            Some(changed) => self.on_url_changed(&changed).await,
            None => Ok(self.state.clone()),
        }
    }

    /// Save the active or last finished guide to the archive.
    pub async fn save_guide(&mut self, name: Option<&str>) -> Result<ArchiveEntry> {
        let session = self
            .session
            .as_ref()
            .or(self.finished.as_ref())
            .ok_or(GuideError::NoActiveGuide)?;
        let steps = if session.all_steps_for_saving.is_empty() {
            session.steps.clone()
        } else {
            session.all_steps_for_saving.clone()
        };
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| guide_name(&session.original_task));
        let entry = self
            .archive
            .save(&name, &session.original_task, steps, session.start_url.clone())
            .await?;
        self.last_saved_guide = Some(entry.id.clone());
        Ok(entry)
    }

    async fn scan(&mut self) -> Result<()> {
        self.pin_scan_refs();
        let mut doc = self.host.capture().await?;
        let extraction = self.extractor.extract(&mut doc);
        self.host.sync_scan_ids(&doc).await?;
        log::debug!(
            "scan {} found {} elements on {}",
            extraction.scan,
            extraction.elements.len(),
            extraction.url
        );
        self.doc = Some(doc);
        self.extraction = Some(extraction);
        self.scan_ids_live = false;
        Ok(())
    }

    fn try_resolve(&self, step: &Step) -> Option<Resolution> {
        let doc = self.doc.as_ref()?;
        let allow_scan_id =
            self.scan_ids_live && self.session.as_ref().is_some_and(GuideSession::uses_planner);
        self.resolver.resolve(doc, &step.resolve_request(allow_scan_id))
    }

    async fn persist(&mut self, required: bool) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        session.saved_at = now_ms();
        match self.persistence.save_now(session).await {
            Ok(()) => Ok(()),
            Err(e) if required => Err(e.into()),
            Err(e) => {
                log::warn!("session save failed: {}", e);
                Ok(())
            }
        }
    }

    async fn clear_highlight(&mut self) {
        self.highlight = None;
        if let Err(e) = self.host.clear_highlight().await {
            log::debug!("clearing highlight failed: {}", e);
        }
    }

    /// Ask the planner for the next batch. Returns whether it has steps.
    async fn request_batch(&mut self) -> Result<bool> {
        let request = {
            let session = self.session.as_ref().ok_or(GuideError::NoActiveGuide)?;
            let extraction = self.extraction.as_ref().ok_or(GuideError::NoPage)?;
            PlannerRequest::from_extraction(
                &session.original_task,
                extraction,
                session.completed_steps.clone(),
            )
        };
        self.state = GuideState::AwaitingContinuation { page: self.page };

        let retry = &self.config.retry;
        let response = plan_with_retry(
            self.planner.as_ref(),
            &request,
            retry.planner_attempts,
            Duration::from_millis(retry.planner_backoff_ms),
        )
        .await
        .map_err(|e| {
            log::warn!("planner failed, guide paused: {}", e);
            GuideError::from(e)
        })?;

        let session = self.session.as_mut().ok_or(GuideError::NoActiveGuide)?;
        if !session.completed_steps.is_empty() {
            session.continuation_count += 1;
        }
        session.steps_before_page = session.completed_steps.len();
        session.steps = response.steps;
        session.step_index = 0;
        session.is_multi_page_task |= !response.can_complete;
        let has_steps = !session.steps.is_empty();
        self.batch_final = response.completed || response.refused;
        if let Some(note) = &response.note {
            log::info!("planner note: {}", note);
        }
        log::info!("planner returned {} step(s) for {}", session.steps.len(), request.url);

        self.tag_batch_page();
        self.scan_ids_live = true;
        if has_steps {
            self.state = GuideState::Active { page: self.page };
        }
        Ok(has_steps)
    }

    fn tag_batch_page(&mut self) {
        let (Some(doc), Some(session)) = (self.doc.as_ref(), self.session.as_mut()) else {
            return;
        };
        let pattern = page_pattern(&doc.url);
        for step in session.steps.iter_mut().filter(|s| s.page_url_pattern.is_none()) {
            step.page_url_pattern = pattern.clone();
        }
    }

    /// Before scan ids are reassigned, give every step that names one a
    /// selector bundle synthesized from the element it pointed at.
    fn pin_scan_refs(&mut self) {
        if !self.scan_ids_live {
            return;
        }
        let (Some(doc), Some(session)) = (self.doc.as_ref(), self.session.as_mut()) else {
            return;
        };
        for step in session.steps.iter_mut().filter(|s| s.selector_bundle.is_none()) {
            let Some(reference) = step.legacy_element_ref.as_deref().filter(|r| is_scan_id(r)) else {
                continue;
            };
            let node = doc
                .all_elements()
                .into_iter()
                .find(|&n| doc.attr(n, SCAN_ID_ATTR) == Some(reference));
            if let Some(node) = node {
                step.selector_bundle = Some(synthesize(doc, node));
            }
        }
    }

    /// An empty batch ends the guide if final, otherwise waits for a re-scan.
    async fn empty_batch(&mut self) -> Result<GuideState> {
        if self.batch_final {
            return self.complete().await;
        }
        log::info!("planner had nothing to do on this page");
        self.state = GuideState::AwaitingContinuation { page: self.page };
        Ok(self.state.clone())
    }

    /// Current batch exhausted. Returns true when a new batch is ready.
    async fn continue_after_batch(&mut self) -> Result<bool> {
        let session = self.session.as_ref().ok_or(GuideError::NoActiveGuide)?;
        if !session.uses_planner() || self.batch_final {
            self.complete().await?;
            return Ok(false);
        }
        if self
            .config
            .completion
            .continuations_exhausted(&session.original_task, session.continuation_count)
        {
            log::info!("continuation ceiling reached after {} requests", session.continuation_count);
            self.complete().await?;
            return Ok(false);
        }
        self.persist(true).await?;
        self.scan().await?;
        if !self.request_batch().await? {
            self.empty_batch().await?;
            return Ok(false);
        }
        self.persist(false).await?;
        Ok(true)
    }

    /// Take over a newly shown page with the session already in memory.
    async fn enter_page(&mut self) -> Result<GuideState> {
        self.interrupt.bump();
        self.highlight = None;
        let (uses_planner, visited) = match self.session.as_ref() {
            Some(s) => (s.uses_planner(), s.visited_urls.len()),
            None => return Ok(self.state.clone()),
        };
        self.page = visited.max(1) as u32;
        self.state = GuideState::Active { page: self.page };
        self.scan().await?;

        if uses_planner {
            if self.should_auto_complete() || self.continuations_exhausted() {
                return self.complete().await;
            }
            self.batch_final = false;
            self.persist(false).await?;
            if !self.request_batch().await? {
                return self.empty_batch().await;
            }
        }
        self.persist(false).await?;
        self.show_step().await
    }

    fn should_auto_complete(&self) -> bool {
        self.session.as_ref().is_some_and(|s| {
            s.uses_planner()
                && self
                    .config
                    .completion
                    .should_auto_complete(&s.original_task, &s.completed_steps)
        })
    }

    fn continuations_exhausted(&self) -> bool {
        self.session.as_ref().is_some_and(|s| {
            self.config
                .completion
                .continuations_exhausted(&s.original_task, s.continuation_count)
        })
    }

    /// Move the current step into the completed logs. The saved copy takes
    /// its selector bundle from the element highlighted right now.
    fn complete_current_step(&mut self) -> Result<()> {
        let doc = self.doc.as_ref();
        let highlight = self.highlight.take();
        let session = self.session.as_mut().ok_or(GuideError::NoActiveGuide)?;
        let index = session.step_index;
        let step = session
            .steps
            .get(index)
            .cloned()
            .ok_or(GuideError::StepOutOfRange {
                index,
                len: session.steps.len(),
            })?;

        let mut saved = step.clone();
        if let (Some(doc), Some(h)) = (doc, highlight.filter(|h| h.step_index == index)) {
            if doc.get(h.node).is_some() {
                saved.selector_bundle = Some(synthesize(doc, h.node));
            }
            if let Some(pattern) = page_pattern(&doc.url) {
                saved.page_url_pattern = Some(pattern);
            }
        }
        saved.legacy_element_ref = saved.legacy_element_ref.filter(|r| !is_scan_id(r));

        session.completed_steps.push(step);
        session.all_steps_for_saving.push(saved);
        session.step_index += 1;
        Ok(())
    }

    async fn complete(&mut self) -> Result<GuideState> {
        self.interrupt.bump();
        self.clear_highlight().await;
        self.state = GuideState::Completed;
        let Some(mut session) = self.session.take() else {
            return Ok(self.state.clone());
        };

        if let Err(e) = self.persistence.mark_completed(&mut session).await {
            log::warn!("could not flag the guide as completed: {}", e);
        }
        self.persistence.clear_shared().await;
        log::info!(
            "guide \"{}\" completed after {} step(s)",
            session.original_task,
            session.completed_steps.len()
        );

        if session.uses_planner()
            && self.config.settings.auto_save
            && !session.all_steps_for_saving.is_empty()
        {
            match self
                .archive
                .save(
                    &guide_name(&session.original_task),
                    &session.original_task,
                    session.all_steps_for_saving.clone(),
                    session.start_url.clone(),
                )
                .await
            {
                Ok(entry) => self.last_saved_guide = Some(entry.id),
                Err(e) => log::warn!("auto-save failed: {}", e),
            }
        } else if session.edited {
            log::info!("edits were written to the saved guide as they happened");
        }
        self.finished = Some(session);
        Ok(self.state.clone())
    }
}
