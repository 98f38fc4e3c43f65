use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::{SessionRecord, SessionStore, StoreError};
use crate::types::SessionId;

const HEALTH_INTERVAL: Duration = Duration::from_secs(5);

/// Redis-backed session store.
///
/// Records are JSON under `{prefix}{session_id}` with a `SET EX` TTL.
/// Health is tracked in an `AtomicBool`: a background `PING` loop keeps it
/// current and any I/O failure on a command flips it off immediately.
pub struct RedisSessionStore {
    conn: ConnectionManager,
    prefix: String,
    ttl: Duration,
    healthy: Arc<AtomicBool>,
}

impl RedisSessionStore {
    /// Connect and start the health loop.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Backend` for an invalid URL and
    /// `StoreError::Unavailable` if the initial connection fails.
    pub async fn connect(
        url: &str,
        prefix: impl Into<String>,
        ttl: Duration,
    ) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(url).map_err(|e| StoreError::Backend(format!("redis url: {e}")))?;
        let conn = ConnectionManager::new(client).await.map_err(|e| {
            tracing::warn!(error = %e, "redis connect failed");
            StoreError::Unavailable
        })?;

        let healthy = Arc::new(AtomicBool::new(true));
        tokio::spawn(health_loop(conn.clone(), Arc::downgrade(&healthy)));

        Ok(Self {
            conn,
            prefix: prefix.into(),
            ttl,
            healthy,
        })
    }

    fn key(&self, session_id: &SessionId) -> String {
        session_key(&self.prefix, session_id)
    }

    fn classify(&self, e: redis::RedisError) -> StoreError {
        classify(&self.healthy, e)
    }
}

fn session_key(prefix: &str, session_id: &SessionId) -> String {
    format!("{prefix}{session_id}")
}

/// Connection-level failures mark the store down; anything else is a
/// backend error and leaves the health flag alone.
fn classify(healthy: &AtomicBool, e: redis::RedisError) -> StoreError {
    let down = e.is_io_error()
        || e.is_connection_dropped()
        || e.is_connection_refusal()
        || e.is_timeout();
    if down {
        if healthy.swap(false, Ordering::SeqCst) {
            tracing::warn!(error = %e, "redis session store went down");
        }
        StoreError::Unavailable
    } else {
        StoreError::Backend(e.to_string())
    }
}

// Ends once the store itself is dropped.
async fn health_loop(mut conn: ConnectionManager, healthy: Weak<AtomicBool>) {
    let mut interval = tokio::time::interval(HEALTH_INTERVAL);
    loop {
        interval.tick().await;
        let Some(healthy) = healthy.upgrade() else {
            return;
        };
        let pong: redis::RedisResult<()> = redis::cmd("PING").query_async(&mut conn).await;
        let up = pong.is_ok();
        let was_up = healthy.swap(up, Ordering::SeqCst);
        if up != was_up {
            if up {
                tracing::info!("redis session store is back");
            } else {
                tracing::warn!("redis session store unreachable");
            }
        }
    }
}

impl SessionStore for RedisSessionStore {
    fn is_available(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    async fn create(&self, record: SessionRecord) -> Result<SessionId, StoreError> {
        let session_id = SessionId::generate();
        let json = serde_json::to_string(&record).map_err(|e| StoreError::Backend(e.to_string()))?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(self.key(&session_id), json, self.ttl.as_secs())
            .await
            .map_err(|e| self.classify(e))?;
        Ok(session_id)
    }

    async fn load(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(self.key(session_id))
            .await
            .map_err(|e| self.classify(e))?;

        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|e| StoreError::Backend(format!("corrupt session record: {e}")))
    }

    async fn replace_access_token(
        &self,
        session_id: &SessionId,
        access_token: &str,
    ) -> Result<(), StoreError> {
        let Some(mut record) = self.load(session_id).await? else {
            return Ok(());
        };
        record.access_token = access_token.to_owned();
        let json = serde_json::to_string(&record).map_err(|e| StoreError::Backend(e.to_string()))?;

        // XX: never resurrect a session evicted between the read and the write
        let mut conn = self.conn.clone();
        let _: Option<String> = redis::cmd("SET")
            .arg(self.key(session_id))
            .arg(json)
            .arg("KEEPTTL")
            .arg("XX")
            .query_async(&mut conn)
            .await
            .map_err(|e| self.classify(e))?;
        Ok(())
    }

    async fn destroy(&self, session_id: &SessionId) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(self.key(session_id))
            .await
            .map_err(|e| self.classify(e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use redis::{ErrorKind, RedisError};

    use super::*;
    use crate::types::Handle;

    #[test]
    fn keys_are_prefixed_session_ids() {
        let id = SessionId::from("01HZX".to_string());
        assert_eq!(session_key("skybridge:sess:", &id), "skybridge:sess:01HZX");
    }

    #[test]
    fn io_errors_flip_health_off() {
        let healthy = AtomicBool::new(true);
        let refused = RedisError::from(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));

        assert_eq!(classify(&healthy, refused), StoreError::Unavailable);
        assert!(!healthy.load(Ordering::SeqCst));
    }

    #[test]
    fn protocol_errors_keep_store_up() {
        let healthy = AtomicBool::new(true);
        let err = RedisError::from((ErrorKind::TypeError, "unexpected reply"));

        assert!(matches!(classify(&healthy, err), StoreError::Backend(_)));
        assert!(healthy.load(Ordering::SeqCst));
    }

    // Integration tests against a live server:
    // REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored

    fn record() -> SessionRecord {
        SessionRecord {
            handle: Handle::from("alice.bsky.social"),
            access_token: "a1".into(),
            refresh_token: "r1".into(),
            user_created: true,
        }
    }

    async fn live_store(ttl: Duration) -> RedisSessionStore {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let prefix = format!("skybridge:test:{}:", SessionId::generate());
        RedisSessionStore::connect(&url, prefix, ttl).await.unwrap()
    }

    async fn remaining_ttl(store: &RedisSessionStore, id: &SessionId) -> i64 {
        let mut conn = store.conn.clone();
        conn.ttl(store.key(id)).await.unwrap()
    }

    #[tokio::test]
    #[ignore = "needs a Redis server at REDIS_URL"]
    async fn create_sets_expiry_and_load_round_trips() {
        let store = live_store(Duration::from_secs(60)).await;
        let id = store.create(record()).await.unwrap();

        assert!(store.is_available());
        assert_eq!(store.load(&id).await.unwrap(), Some(record()));
        let ttl = remaining_ttl(&store, &id).await;
        assert!((1..=60).contains(&ttl), "ttl {ttl}");

        store.destroy(&id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "needs a Redis server at REDIS_URL"]
    async fn replace_keeps_ttl_and_refresh_token() {
        let store = live_store(Duration::from_secs(60)).await;
        let id = store.create(record()).await.unwrap();

        store.replace_access_token(&id, "a2").await.unwrap();

        let after = store.load(&id).await.unwrap().unwrap();
        assert_eq!(after.access_token, "a2");
        assert_eq!(after.refresh_token, "r1");
        let ttl = remaining_ttl(&store, &id).await;
        assert!((1..=60).contains(&ttl), "ttl {ttl}");

        store.destroy(&id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "needs a Redis server at REDIS_URL"]
    async fn replace_never_resurrects_destroyed_session() {
        let store = live_store(Duration::from_secs(60)).await;
        let id = store.create(record()).await.unwrap();

        store.destroy(&id).await.unwrap();
        assert_eq!(store.load(&id).await.unwrap(), None);

        store.replace_access_token(&id, "a2").await.unwrap();
        assert_eq!(store.load(&id).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore = "needs a Redis server at REDIS_URL"]
    async fn health_loop_ends_with_the_store() {
        let store = live_store(Duration::from_secs(60)).await;
        let conn = store.conn.clone();
        let flag = Arc::new(AtomicBool::new(false));
        let weak = Arc::downgrade(&flag);

        // First tick fires at once and a PING marks the store up.
        let handle = tokio::spawn(health_loop(conn, weak));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(flag.load(Ordering::SeqCst));

        drop(flag);
        tokio::time::timeout(HEALTH_INTERVAL * 2, handle)
            .await
            .unwrap()
            .unwrap();
    }
}
