use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{SessionRecord, SessionStore, StoreError};
use crate::types::SessionId;

struct Entry {
    record: SessionRecord,
    expires_at: Instant,
}

/// In-process session store for development and tests.
///
/// Expired entries are dropped when loaded and swept on every `create`.
/// Availability can be toggled to exercise the store-down path.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Entry>>,
    ttl: Duration,
    available: AtomicBool,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of live (unexpired) sessions.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.sessions
            .read()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(24 * 60 * 60))
    }
}

impl SessionStore for MemorySessionStore {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn create(&self, record: SessionRecord) -> Result<SessionId, StoreError> {
        self.check()?;
        let session_id = SessionId::generate();
        let now = Instant::now();
        let entry = Entry {
            record,
            expires_at: now + self.ttl,
        };
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, e| e.expires_at > now);
        sessions.insert(session_id.clone(), entry);
        Ok(session_id)
    }

    async fn load(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        self.check()?;
        let mut sessions = self.sessions.write().await;
        match sessions.get(session_id) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.record.clone())),
            Some(_) => {
                sessions.remove(session_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn replace_access_token(
        &self,
        session_id: &SessionId,
        access_token: &str,
    ) -> Result<(), StoreError> {
        self.check()?;
        if let Some(entry) = self.sessions.write().await.get_mut(session_id) {
            entry.record.access_token = access_token.to_owned();
        }
        Ok(())
    }

    async fn destroy(&self, session_id: &SessionId) -> Result<(), StoreError> {
        self.check()?;
        self.sessions.write().await.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Handle;

    fn record() -> SessionRecord {
        SessionRecord {
            handle: Handle::from("alice.bsky.social"),
            access_token: "a1".into(),
            refresh_token: "r1".into(),
            user_created: true,
        }
    }

    #[tokio::test]
    async fn create_then_load() {
        let store = MemorySessionStore::default();
        let id = store.create(record()).await.unwrap();
        assert_eq!(store.load(&id).await.unwrap(), Some(record()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_session_is_none() {
        let store = MemorySessionStore::default();
        let id = SessionId::from("nope".to_string());
        assert_eq!(store.load(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn replace_access_token_keeps_refresh() {
        let store = MemorySessionStore::default();
        let id = store.create(record()).await.unwrap();
        store.replace_access_token(&id, "a2").await.unwrap();

        let loaded = store.load(&id).await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "a2");
        assert_eq!(loaded.refresh_token, "r1");
    }

    #[tokio::test]
    async fn last_refresh_write_wins() {
        let store = MemorySessionStore::default();
        let id = store.create(record()).await.unwrap();
        let (a, b) = tokio::join!(
            store.replace_access_token(&id, "a2"),
            store.replace_access_token(&id, "a3"),
        );
        a.unwrap();
        b.unwrap();

        let token = store.load(&id).await.unwrap().unwrap().access_token;
        assert!(token == "a2" || token == "a3");
    }

    #[tokio::test]
    async fn destroy_removes() {
        let store = MemorySessionStore::default();
        let id = store.create(record()).await.unwrap();
        store.destroy(&id).await.unwrap();
        assert_eq!(store.load(&id).await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = MemorySessionStore::new(Duration::from_secs(60));
        let id = store.create(record()).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.load(&id).await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.load(&id).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn create_sweeps_expired_entries() {
        let store = MemorySessionStore::new(Duration::from_secs(60));
        store.create(record()).await.unwrap();
        store.create(record()).await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        let live = store.create(record()).await.unwrap();

        let sessions = store.sessions.read().await;
        assert_eq!(sessions.len(), 1);
        assert!(sessions.contains_key(&live));
    }

    #[tokio::test]
    async fn unavailable_store_refuses_everything() {
        let store = MemorySessionStore::default();
        let id = store.create(record()).await.unwrap();
        store.set_available(false);

        assert!(!store.is_available());
        assert_eq!(store.load(&id).await, Err(StoreError::Unavailable));
        assert_eq!(store.create(record()).await, Err(StoreError::Unavailable));
        assert_eq!(store.destroy(&id).await, Err(StoreError::Unavailable));

        store.set_available(true);
        assert!(store.load(&id).await.unwrap().is_some());
    }
}
