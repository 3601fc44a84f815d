//! `.guideme` document layout.

use serde::{Deserialize, Serialize};

pub const FORMAT_ID: &str = "guideme";
pub const FORMAT_VERSION: &str = "1.0";
pub const SCHEMA_URL: &str = "https://guideme.dev/schema/guide-v1.json";
pub const CHECKSUM_PREFIX: &str = "sha256:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveDocument {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub version: String,
    pub format: String,
    pub metadata: ArchiveMetadata,
    pub compatibility: Compatibility,
    pub steps: Vec<ArchiveStep>,
    pub checksum: String,
    /// Reserved; always null in this version.
    pub signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub language: String,
    /// Seconds.
    #[serde(default)]
    pub estimated_time: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compatibility {
    #[serde(default)]
    pub url_patterns: Vec<String>,
    #[serde(default)]
    pub min_version: String,
    #[serde(default)]
    pub tested_on: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveStep {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub instruction: String,
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ArchiveTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveTarget {
    pub primary: TargetSignal,
    #[serde(default)]
    pub fallbacks: Vec<TargetSignal>,
}

/// One identifying signal, `type` naming the selector-bundle field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSignal {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    /// Sibling count, for `sibling` signals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl TargetSignal {
    pub fn new(kind: &str, value: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            value: value.into(),
            count: None,
        }
    }
}
