use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use super::{KeyValueStore, StorageError, SyncStore};

/// One JSON file per key under a directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never sees a half-written value.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `~/.guideme`, or the working directory when no home is known.
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".guideme")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }

    fn tmp_path_for(&self, key: &str) -> PathBuf {
        self.path_for(key).with_extension("json.tmp")
    }
}

fn parse(bytes: &[u8]) -> Result<Value, StorageError> {
    Ok(serde_json::from_slice(bytes)?)
}

impl SyncStore for FileStore {
    fn get_sync(&self, key: &str) -> Result<Option<Value>, StorageError> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => parse(&bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_sync(&self, key: &str, value: Value) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        let tmp = self.tmp_path_for(key);
        std::fs::write(&tmp, serde_json::to_vec_pretty(&value)?)?;
        std::fs::rename(&tmp, self.path_for(key))?;
        Ok(())
    }

    fn remove_sync(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => parse(&bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = self.tmp_path_for(key);
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&value)?).await?;
        tokio::fs::rename(&tmp, self.path_for(key)).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_store(name: &str) -> FileStore {
        let dir = std::env::temp_dir().join(format!("guideme-store-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        FileStore::new(dir)
    }

    #[tokio::test]
    async fn test_async_and_sync_paths_agree() {
        let store = temp_store("agree");
        store.set("guideme.settings", json!({"autoSave": true})).await.unwrap();
        assert_eq!(
            store.get_sync("guideme.settings").unwrap(),
            Some(json!({"autoSave": true}))
        );
        store.remove_sync("guideme.settings").unwrap();
        assert_eq!(store.get("guideme.settings").await.unwrap(), None);
        // removing a missing key is not an error
        store.remove("guideme.settings").await.unwrap();
        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_keys_are_sanitized() {
        let store = FileStore::new("/tmp/x");
        assert_eq!(store.path_for("a/b c"), PathBuf::from("/tmp/x/a_b_c.json"));
    }
}
