//! Key-value storage boundary.
//!
//! The durable store is asynchronous and shared by every tab; the sync store
//! is the same-origin fallback written synchronously right before anything
//! that may unload the page. Both are last-write-wins over JSON values.

mod file;
mod memory;
mod persistence;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use persistence::SessionPersistence;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Well-known storage keys.
pub mod keys {
    pub const ACTIVE_SESSION: &str = "guideme.activeSession";
    pub const ACTIVE_RECORDING: &str = "guideme.activeRecording";
    pub const COMPLETED_RECORDING: &str = "guideme.completedRecording";
    pub const ARCHIVE: &str = "guideme.archive";
    pub const SETTINGS: &str = "guideme.settings";
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Synchronous same-origin store.
pub trait SyncStore: Send + Sync {
    fn get_sync(&self, key: &str) -> Result<Option<Value>, StorageError>;
    fn set_sync(&self, key: &str, value: Value) -> Result<(), StorageError>;
    fn remove_sync(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and deserialize `key`. A value of the wrong shape is reported as an
/// error rather than silently ignored.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    store.set(key, serde_json::to_value(value)?).await
}
