//! Runtime configuration.
//!
//! Every tunable table lives here so thresholds can change without touching
//! control flow. All fields default, so a partial (or absent) config file is
//! valid.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fingerprint::DEFAULT_MAX_ELEMENTS;
use crate::guide::{CompletionPolicy, ResumePolicy, RetryPolicy};
use crate::resolver::ScoreTable;
use crate::storage::{get_json, keys, set_json, KeyValueStore, StorageError};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// User-facing settings, also stored under `guideme.settings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Step-planner backend name.
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub highlight_color: String,
    /// Save finished planner-driven guides to the archive.
    pub auto_save: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: "claude-cli".to_string(),
            api_key: None,
            highlight_color: "#4f46e5".to_string(),
            auto_save: true,
        }
    }
}

impl Settings {
    pub async fn load(store: &dyn KeyValueStore) -> Result<Self, StorageError> {
        Ok(get_json(store, keys::SETTINGS).await?.unwrap_or_default())
    }

    pub async fn save(&self, store: &dyn KeyValueStore) -> Result<(), StorageError> {
        set_json(store, keys::SETTINGS, self).await
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuideConfig {
    pub settings: Settings,
    pub retry: RetryPolicy,
    pub completion: CompletionPolicy,
    pub resume: ResumePolicy,
    pub scores: ScoreTable,
    /// Element cap per scan.
    pub max_elements: usize,
    /// Debounce for non-navigation recording saves.
    pub recording_debounce_ms: u64,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            retry: RetryPolicy::default(),
            completion: CompletionPolicy::default(),
            resume: ResumePolicy::default(),
            scores: ScoreTable::default(),
            max_elements: DEFAULT_MAX_ELEMENTS,
            recording_debounce_ms: 750,
        }
    }
}

impl GuideConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Load `path` when given and present, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) if p.exists() => {
                log::info!("loading config from {}", p.display());
                Self::load(p)
            }
            Some(p) => {
                log::info!("config {} not found, using defaults", p.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = GuideConfig::from_json(
            r#"{"settings": {"autoSave": false}, "resume": {"maxAgeMs": 1000}, "scores": {"minScore": 25}}"#,
        )
        .unwrap();
        assert!(!config.settings.auto_save);
        assert_eq!(config.settings.provider, "claude-cli");
        assert_eq!(config.resume.max_age_ms, 1000);
        assert_eq!(config.scores.min_score, 25);
        assert_eq!(config.scores.exact, 30);
        assert_eq!(config.retry.delays_ms, vec![500, 1000, 1500]);
        assert_eq!(config.max_elements, 100);
        assert_eq!(config.completion.complex.min_steps, 8);
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = GuideConfig::load_or_default(Some(Path::new("/nonexistent/guideme.json"))).unwrap();
        assert_eq!(config, GuideConfig::default());
    }

    #[tokio::test]
    async fn test_settings_round_trip_through_store() {
        let store = MemoryStore::new();
        assert_eq!(Settings::load(&store).await.unwrap(), Settings::default());
        let settings = Settings {
            highlight_color: "#ff0000".into(),
            ..Default::default()
        };
        settings.save(&store).await.unwrap();
        assert_eq!(Settings::load(&store).await.unwrap().highlight_color, "#ff0000");
    }
}
