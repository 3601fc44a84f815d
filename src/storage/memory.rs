use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::{KeyValueStore, StorageError, SyncStore};

/// In-process store. Clones share the same map, so several hosts built from
/// one `MemoryStore` behave like tabs of one browser profile.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, Value>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, to exercise degraded paths.
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .values
            .lock()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Value>>, StorageError> {
        self.values
            .lock()
            .map_err(|_| StorageError::Unavailable("store lock poisoned".to_string()))
    }
}

impl SyncStore for MemoryStore {
    fn get_sync(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_sync(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.check_writable()?;
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    fn remove_sync(&self, key: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        self.lock()?.remove(key);
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        self.get_sync(key)
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.set_sync(key, value)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.remove_sync(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_clones_share_values() {
        let a = MemoryStore::new();
        let b = a.clone();
        a.set("k", json!({"n": 1})).await.unwrap();
        assert_eq!(b.get("k").await.unwrap(), Some(json!({"n": 1})));
        b.remove("k").await.unwrap();
        assert_eq!(a.get_sync("k").unwrap(), None);
    }

    #[test]
    fn test_failing_writes() {
        let store = MemoryStore::new();
        store.set_failing(true);
        assert!(matches!(
            store.set_sync("k", json!(1)),
            Err(StorageError::Unavailable(_))
        ));
        store.set_failing(false);
        store.set_sync("k", json!(1)).unwrap();
        assert_eq!(store.keys(), vec!["k".to_string()]);
    }
}
