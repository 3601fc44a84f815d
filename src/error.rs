use thiserror::Error;

use crate::archive::ImportError;
use crate::dom::SelectorError;
use crate::planner::PlannerError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum GuideError {
    #[error("Failed to connect to Chrome: {0}")]
    ConnectionFailed(String),

    #[error("Failed to launch Chrome: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("No page available")]
    NoPage,

    #[error("CDP error: {0}")]
    CdpError(#[from] chromiumoxide::error::CdpError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Planner error: {0}")]
    Planner(#[from] PlannerError),

    #[error("Import failed: {0}")]
    Import(#[from] ImportError),

    #[error("Serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid selector: {0}")]
    Selector(#[from] SelectorError),

    #[error("No active guide")]
    NoActiveGuide,

    #[error("Step index {index} out of range ({len} steps)")]
    StepOutOfRange { index: usize, len: usize },

    #[error("Recording is not active")]
    NotRecording,

    #[error("Saved guide not found: {0}")]
    GuideNotFound(String),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, GuideError>;
