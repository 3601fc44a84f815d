use std::sync::Arc;

use super::{keys, KeyValueStore, StorageError, SyncStore};
use crate::guide::GuideSession;

/// Resumption snapshot I/O over the durable store plus the sync fallback.
#[derive(Clone)]
pub struct SessionPersistence {
    durable: Arc<dyn KeyValueStore>,
    local: Arc<dyn SyncStore>,
}

impl SessionPersistence {
    pub fn new(durable: Arc<dyn KeyValueStore>, local: Arc<dyn SyncStore>) -> Self {
        Self { durable, local }
    }

    pub fn durable(&self) -> &Arc<dyn KeyValueStore> {
        &self.durable
    }

    /// Persist `session` before anything that may unload the page.
    ///
    /// The synchronous write must succeed; its error is returned so the caller
    /// does not navigate on an unconfirmed save. A durable-store failure is
    /// logged and tolerated.
    pub async fn save_now(&self, session: &GuideSession) -> Result<(), StorageError> {
        let value = serde_json::to_value(session)?;
        self.local.set_sync(keys::ACTIVE_SESSION, value.clone())?;
        if let Err(e) = self.durable.set(keys::ACTIVE_SESSION, value).await {
            log::warn!("durable session save failed, sync copy kept: {}", e);
        }
        Ok(())
    }

    /// Most recently saved snapshot from either store.
    pub async fn load_latest(&self) -> Option<GuideSession> {
        let durable = match self.durable.get(keys::ACTIVE_SESSION).await {
            Ok(value) => value,
            Err(e) => {
                log::warn!("reading durable session failed: {}", e);
                None
            }
        };
        let local = match self.local.get_sync(keys::ACTIVE_SESSION) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("reading local session failed: {}", e);
                None
            }
        };

        let decode = |value: Option<serde_json::Value>| {
            value.and_then(|v| match serde_json::from_value::<GuideSession>(v) {
                Ok(session) => Some(session),
                Err(e) => {
                    log::warn!("ignoring unreadable session snapshot: {}", e);
                    None
                }
            })
        };

        match (decode(durable), decode(local)) {
            (Some(a), Some(b)) => Some(if b.saved_at > a.saved_at { b } else { a }),
            (a, b) => a.or(b),
        }
    }

    /// Flag `session` as finished and write it to both stores. A session
    /// already flagged is left untouched.
    pub async fn mark_completed(&self, session: &mut GuideSession) -> Result<(), StorageError> {
        if session.completed {
            return Ok(());
        }
        session.completed = true;
        session.saved_at = chrono::Utc::now().timestamp_millis();
        self.save_now(session).await
    }

    /// Remove the snapshot everywhere, ending resumability for every tab.
    pub async fn clear_shared(&self) {
        if let Err(e) = self.local.remove_sync(keys::ACTIVE_SESSION) {
            log::warn!("clearing local session failed: {}", e);
        }
        if let Err(e) = self.durable.remove(keys::ACTIVE_SESSION).await {
            log::warn!("clearing durable session failed: {}", e);
        }
    }

    /// Remove only this tab's copy; the shared snapshot stays for other tabs.
    pub fn clear_local(&self) {
        if let Err(e) = self.local.remove_sync(keys::ACTIVE_SESSION) {
            log::warn!("clearing local session failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn persistence() -> (SessionPersistence, MemoryStore, MemoryStore) {
        let durable = MemoryStore::new();
        let local = MemoryStore::new();
        let p = SessionPersistence::new(Arc::new(durable.clone()), Arc::new(local.clone()));
        (p, durable, local)
    }

    fn session(saved_at: i64, task: &str) -> GuideSession {
        let mut s = GuideSession::new(task, vec![]);
        s.saved_at = saved_at;
        s
    }

    #[tokio::test]
    async fn test_load_prefers_newest_copy() {
        let (p, durable, local) = persistence();
        durable
            .set_sync(keys::ACTIVE_SESSION, serde_json::to_value(session(100, "old")).unwrap())
            .unwrap();
        local
            .set_sync(keys::ACTIVE_SESSION, serde_json::to_value(session(200, "new")).unwrap())
            .unwrap();
        assert_eq!(p.load_latest().await.unwrap().original_task, "new");
    }

    #[tokio::test]
    async fn test_save_requires_sync_path() {
        let (p, durable, local) = persistence();
        durable.set_failing(true);
        p.save_now(&session(1, "t")).await.unwrap();
        assert!(local.get_sync(keys::ACTIVE_SESSION).unwrap().is_some());

        local.set_failing(true);
        assert!(p.save_now(&session(2, "t")).await.is_err());
    }

    #[tokio::test]
    async fn test_mark_completed_and_clear() {
        let (p, durable, _local) = persistence();
        let mut finished = session(1, "t");
        p.mark_completed(&mut finished).await.unwrap();
        let saved_at = finished.saved_at;
        p.mark_completed(&mut finished).await.unwrap();
        assert_eq!(finished.saved_at, saved_at);
        let stored = p.load_latest().await.unwrap();
        assert!(stored.completed);
        assert_eq!(stored.step_index, finished.step_index);

        p.clear_local();
        assert!(durable.get_sync(keys::ACTIVE_SESSION).unwrap().is_some());
        p.clear_shared().await;
        assert!(p.load_latest().await.is_none());
    }
}
