//! The Auth Gate: per-request session state machine.
//!
//! Checks run in a fixed order and the first terminal answer wins:
//! store health, restart fence, session lookup, fence confirmation,
//! access token, refresh token.

use crate::error::Error;
use crate::fence::RestartFence;
use crate::store::{SessionRecord, SessionStore, StoreError};
use crate::token::TokenService;
use crate::types::{Handle, SessionId};

use super::types::SessionStatus;

/// Authenticated caller, attached to protected requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub session_id: SessionId,
    pub handle: Handle,
    /// Access token now stored for the session.
    pub access_token: String,
    /// `access_token` was minted during this request.
    pub refreshed: bool,
}

/// Result of evaluating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Authenticated(SessionUser),
    StoreUnavailable,
    ServerRestarted,
    NoUserFound,
    AllTokensExpired,
}

impl GateOutcome {
    /// Response body for this outcome.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        let base = SessionStatus {
            data_store: true,
            ..SessionStatus::default()
        };
        match self {
            Self::Authenticated(user) => SessionStatus {
                logged_in: true,
                access_token: Some(user.access_token.clone()),
                token_refreshed: user.refreshed,
                ..base
            },
            Self::StoreUnavailable => SessionStatus::default(),
            Self::ServerRestarted => SessionStatus {
                server_restarted: true,
                ..base
            },
            Self::NoUserFound => SessionStatus {
                no_user_found: true,
                ..base
            },
            Self::AllTokensExpired => SessionStatus {
                all_tokens_expired: true,
                ..base
            },
        }
    }
}

/// Evaluate the gate for one request.
///
/// `session_id` and `fence_cookie` are whatever the client sent, if anything.
///
/// # Errors
///
/// Only genuine failures: a store backend error other than "unavailable",
/// or a token that cannot be minted. Every expected session state is an
/// `Ok` outcome.
pub async fn evaluate<S: SessionStore>(
    store: &S,
    tokens: &TokenService,
    fence: &RestartFence,
    session_id: Option<&SessionId>,
    fence_cookie: Option<&str>,
) -> Result<GateOutcome, Error> {
    if !store.is_available() {
        return Ok(GateOutcome::StoreUnavailable);
    }

    if fence.is_stale(fence_cookie) {
        return Ok(GateOutcome::ServerRestarted);
    }

    let Some(session_id) = session_id else {
        return Ok(GateOutcome::NoUserFound);
    };

    let record = match store.load(session_id).await {
        Ok(Some(record)) => record,
        Ok(None) => return Ok(GateOutcome::NoUserFound),
        Err(StoreError::Unavailable) => return Ok(GateOutcome::StoreUnavailable),
        Err(e) => return Err(e.into()),
    };

    // A live session without the current fence was opened by another process.
    if !fence.confirms(fence_cookie) {
        return Ok(GateOutcome::ServerRestarted);
    }

    if let Some(handle) = owned_by(&record, tokens.verify_access(&record.access_token)) {
        return Ok(GateOutcome::Authenticated(SessionUser {
            session_id: session_id.clone(),
            handle,
            access_token: record.access_token,
            refreshed: false,
        }));
    }

    let Some(handle) = owned_by(&record, tokens.verify_refresh(&record.refresh_token)) else {
        return Ok(if record.user_created {
            GateOutcome::AllTokensExpired
        } else {
            GateOutcome::NoUserFound
        });
    };

    let access_token = tokens.issue_access(&handle)?;
    match store.replace_access_token(session_id, &access_token).await {
        Ok(()) => {}
        Err(StoreError::Unavailable) => return Ok(GateOutcome::StoreUnavailable),
        Err(e) => return Err(e.into()),
    }
    tracing::info!(handle = %handle, "access token refreshed");

    Ok(GateOutcome::Authenticated(SessionUser {
        session_id: session_id.clone(),
        handle,
        access_token,
        refreshed: true,
    }))
}

/// A verified token only counts if it belongs to the session's owner.
fn owned_by(record: &SessionRecord, verified: Result<Handle, Error>) -> Option<Handle> {
    match verified {
        Ok(handle) if handle == record.handle => Some(handle),
        Ok(handle) => {
            tracing::warn!(token = %handle, session = %record.handle, "token owner mismatch");
            None
        }
        Err(_) => None,
    }
}
