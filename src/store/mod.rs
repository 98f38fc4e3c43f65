//! Session persistence behind a capability trait.
//!
//! The Auth Gate never assumes exclusive access to a session: two requests
//! racing to refresh the same session both write, and the last write wins.
//! Both access tokens stay independently valid until their own expiry.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::types::{Handle, SessionId};

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemorySessionStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisSessionStore;

/// Server-side session state. The client only ever holds the [`SessionId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Owner of both tokens.
    pub handle: Handle,
    pub access_token: String,
    pub refresh_token: String,
    /// Set once a login completed in this session.
    pub user_created: bool,
}

/// Session store failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Backing connection is down. Expected and recoverable.
    #[error("session store unavailable")]
    Unavailable,

    #[error("session store error: {0}")]
    Backend(String),
}

/// External key-value store holding session records.
///
/// Records expire after a store-defined TTL.
pub trait SessionStore: Send + Sync + 'static {
    /// Synchronous health check, consulted before any token work.
    fn is_available(&self) -> bool;

    /// Persist a new session. Returns its freshly generated ID.
    fn create(
        &self,
        record: SessionRecord,
    ) -> impl Future<Output = Result<SessionId, StoreError>> + Send;

    /// Look up a session. `None` if it never existed or was evicted.
    fn load(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<Option<SessionRecord>, StoreError>> + Send;

    /// Overwrite the access token in place, keeping the remaining TTL.
    /// A missing session is not an error.
    fn replace_access_token(
        &self,
        session_id: &SessionId,
        access_token: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete a session (logout).
    fn destroy(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
