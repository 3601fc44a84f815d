//! Recording mode: user interactions become guide steps.

mod describe;
mod recorder;

pub use recorder::Recorder;

use serde::{Deserialize, Serialize};

use crate::dom::NodeId;
use crate::guide::Step;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecorderState {
    #[default]
    Idle,
    Recording,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Click,
    Input,
    Change,
    Blur,
}

/// One raw interaction on the live page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedEvent {
    pub kind: EventKind,
    pub target: NodeId,
    /// Field value after the event, for input-like events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl RecordedEvent {
    pub fn click(target: NodeId) -> Self {
        Self {
            kind: EventKind::Click,
            target,
            value: None,
        }
    }

    pub fn input(kind: EventKind, target: NodeId, value: impl Into<String>) -> Self {
        Self {
            kind,
            target,
            value: Some(value.into()),
        }
    }
}

/// In-progress recording, persisted under `guideme.activeRecording` so it
/// survives navigations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActiveRecording {
    pub steps: Vec<Step>,
    pub start_url: String,
    pub current_url: String,
    /// Milliseconds since the epoch.
    pub started_at: i64,
    pub paused: bool,
}

/// Hand-off produced when recording stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingResult {
    pub steps: Vec<Step>,
    pub start_url: String,
    pub end_url: String,
    pub duration_ms: i64,
}
