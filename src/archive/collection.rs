//! Saved-guide collection persisted under a single storage key.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::codec::{self, ImportedGuide};
use super::format::{ArchiveDocument, CHECKSUM_PREFIX};
use crate::error::{GuideError, Result};
use crate::guide::Step;
use crate::storage::{get_json, keys, set_json, KeyValueStore};

/// One saved guide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntry {
    pub id: String,
    pub name: String,
    pub task: String,
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub checksum: String,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, task: impl Into<String>, steps: Vec<Step>, start_url: Option<String>) -> Self {
        let mut entry = Self {
            id: new_guide_id(),
            name: name.into(),
            task: task.into(),
            steps,
            start_url,
            created_at: Utc::now(),
            checksum: String::new(),
        };
        entry.checksum = entry.content_checksum();
        entry
    }

    /// Digest of name, task and steps.
    pub fn content_checksum(&self) -> String {
        let body = serde_json::json!({
            "name": self.name,
            "task": self.task,
            "steps": self.steps,
        });
        format!("{}{:x}", CHECKSUM_PREFIX, Sha256::digest(body.to_string().as_bytes()))
    }
}

/// Length of the random part of a guide id.
const ID_SUFFIX_LEN: usize = 12;

/// `guide_<millis>_<random>`; the random part is a v4 UUID prefix.
pub fn new_guide_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("guide_{}_{}", Utc::now().timestamp_millis(), &uuid[..ID_SUFFIX_LEN])
}

/// Saved guides, newest first.
#[derive(Clone)]
pub struct GuideArchive {
    store: Arc<dyn KeyValueStore>,
}

impl GuideArchive {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<ArchiveEntry>> {
        let entries: Option<Vec<ArchiveEntry>> = get_json(self.store.as_ref(), keys::ARCHIVE).await?;
        Ok(entries.unwrap_or_default())
    }

    async fn write(&self, entries: &[ArchiveEntry]) -> Result<()> {
        set_json(self.store.as_ref(), keys::ARCHIVE, entries).await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<ArchiveEntry>> {
        Ok(self.list().await?.into_iter().find(|e| e.id == id))
    }

    /// Store a new guide and return it.
    pub async fn save(
        &self,
        name: &str,
        task: &str,
        steps: Vec<Step>,
        start_url: Option<String>,
    ) -> Result<ArchiveEntry> {
        let entry = ArchiveEntry::new(name, task, steps, start_url);
        self.upsert(entry.clone()).await?;
        log::info!("saved guide {} ({} steps)", entry.id, entry.steps.len());
        Ok(entry)
    }

    /// Insert, or replace the entry with the same id.
    pub async fn upsert(&self, entry: ArchiveEntry) -> Result<()> {
        let mut entries = self.list().await?;
        entries.retain(|e| e.id != entry.id);
        entries.insert(0, entry);
        self.write(&entries).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let mut entries = self.list().await?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.write(&entries).await?;
        Ok(true)
    }

    async fn modify<F>(&self, id: &str, change: F) -> Result<ArchiveEntry>
    where
        F: FnOnce(&mut ArchiveEntry) -> Result<()>,
    {
        let mut entries = self.list().await?;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| GuideError::GuideNotFound(id.to_string()))?;
        change(entry)?;
        entry.checksum = entry.content_checksum();
        let updated = entry.clone();
        self.write(&entries).await?;
        Ok(updated)
    }

    pub async fn update_step_description(&self, id: &str, index: usize, description: &str) -> Result<ArchiveEntry> {
        self.modify(id, |entry| {
            let len = entry.steps.len();
            let step = entry
                .steps
                .get_mut(index)
                .ok_or(GuideError::StepOutOfRange { index, len })?;
            step.description = description.trim().to_string();
            Ok(())
        })
        .await
    }

    pub async fn delete_step(&self, id: &str, index: usize) -> Result<ArchiveEntry> {
        self.modify(id, |entry| {
            if index >= entry.steps.len() {
                return Err(GuideError::StepOutOfRange {
                    index,
                    len: entry.steps.len(),
                });
            }
            entry.steps.remove(index);
            Ok(())
        })
        .await
    }

    pub async fn export_entry(&self, id: &str) -> Result<ArchiveDocument> {
        let entry = self
            .get(id)
            .await?
            .ok_or_else(|| GuideError::GuideNotFound(id.to_string()))?;
        Ok(codec::export_entry(&entry, Utc::now()))
    }

    /// Validate raw `.guideme` text and add it to the collection. An id that
    /// is already taken gets a fresh one.
    pub async fn import_document(&self, raw: &str) -> Result<ImportedGuide> {
        let mut imported = codec::import(raw)?;
        if self.get(&imported.entry.id).await?.is_some() {
            imported.entry.id = new_guide_id();
        }
        self.upsert(imported.entry.clone()).await?;
        for warning in &imported.warnings {
            log::warn!("import {}: {}", imported.entry.id, warning);
        }
        Ok(imported)
    }
}
