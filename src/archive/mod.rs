//! Saved guides and the portable `.guideme` file format.

mod category;
mod codec;
mod collection;
pub mod format;

pub use category::{infer_category, infer_tags};
pub use codec::{compute_checksum, export_entry, export_session, import, to_pretty_json, ImportedGuide, SECONDS_PER_STEP};
pub use collection::{new_guide_id, ArchiveEntry, GuideArchive};
pub use format::ArchiveDocument;

use thiserror::Error;

/// Reasons a `.guideme` file is rejected outright.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("missing format identifier: expected \"format\": \"guideme\"")]
    MissingFormat,

    #[error("unexpected format \"{0}\", expected \"guideme\"")]
    WrongFormat(String),

    #[error("unsupported version {found} (supported: {supported})")]
    UnsupportedVersion { found: String, supported: String },

    #[error("metadata.name is missing")]
    MissingName,

    #[error("guide has no steps")]
    NoSteps,
}
