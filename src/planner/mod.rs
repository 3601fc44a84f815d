//! Step-planner boundary.
//!
//! A planner looks at the task, the page description produced by the
//! extractor and the steps done so far, and proposes the next batch of steps.

mod claude;
pub mod parse;
pub mod prompt;
mod scripted;

pub use claude::ClaudeCliPlanner;
pub use parse::parse_response;
pub use prompt::build_prompt;
pub use scripted::ScriptedPlanner;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fingerprint::{ElementDescriptor, Extraction, PageContext};
use crate::guide::Step;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlannerError {
    #[error("planner unreachable: {0}")]
    Transport(String),

    #[error("planner exited with status {code}: {stderr}")]
    Status { code: i32, stderr: String },

    #[error("planner response could not be parsed: {0}")]
    Malformed(String),
}

impl PlannerError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlannerError::Transport(_) | PlannerError::Status { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerRequest {
    pub task: String,
    pub url: String,
    pub title: String,
    pub elements: Vec<ElementDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_context: Option<PageContext>,
    pub completed_steps: Vec<Step>,
}

impl PlannerRequest {
    pub fn from_extraction(task: &str, extraction: &Extraction, completed_steps: Vec<Step>) -> Self {
        Self {
            task: task.to_string(),
            url: extraction.url.clone(),
            title: extraction.title.clone(),
            elements: extraction.elements.clone(),
            page_context: Some(extraction.page_context.clone()),
            completed_steps,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerResponse {
    pub steps: Vec<Step>,
    /// The task can be finished on this page.
    #[serde(default)]
    pub can_complete: bool,
    /// This batch is the last one.
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// The planner declined; `steps` holds a single info step with its text.
    #[serde(default)]
    pub refused: bool,
}

#[async_trait]
pub trait StepPlanner: Send + Sync {
    async fn plan(&self, request: &PlannerRequest) -> Result<PlannerResponse, PlannerError>;
}

/// Call `planner`, retrying transient failures with a fixed backoff.
pub async fn plan_with_retry(
    planner: &dyn StepPlanner,
    request: &PlannerRequest,
    max_attempts: u32,
    backoff: Duration,
) -> Result<PlannerResponse, PlannerError> {
    let attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match planner.plan(request).await {
            Ok(response) => return Ok(response),
            Err(e) if e.is_retryable() && attempt < attempts => {
                log::warn!("planner attempt {}/{} failed: {}", attempt, attempts, e);
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
