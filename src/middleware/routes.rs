use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::{CookieJar, PrivateCookieJar};

use super::config::BridgeConfig;
use super::cookies;
use super::error::ApiError;
use super::extractor::RefreshedToken;
use super::gate::{GateOutcome, SessionUser};
use super::state::AppState;
use super::types::{
    BlocksRequest, HandlesRequest, LoginRequest, LoginResponse, ReconcileResponse,
    SearchResponse, SessionStatus,
};
use crate::app_password::AppPassword;
use crate::correlate::{self, CorrelationSummary};
use crate::gateway::{AccountGateway, BLOCKS_PAGE_SIZE, BlockedPage};
use crate::store::{SessionRecord, SessionStore, StoreError};
use crate::types::SessionId;

/// Create the bridge router.
///
/// | route                 | gated | purpose                          |
/// |-----------------------|-------|----------------------------------|
/// | `GET /check-login`    | yes   | session status                   |
/// | `POST /login`         | no    | remote login, new session        |
/// | `POST /logout`        | no    | destroy session, clear cookies   |
/// | `POST /search`        | yes   | existence filter over candidates |
/// | `POST /get-my-blocks` | yes   | one page of the remote blocks    |
/// | `POST /reconcile`     | yes   | full correlation                 |
pub fn bridge_routes<S, G>(config: BridgeConfig, store: Arc<S>, gateway: Arc<G>) -> Router
where
    S: SessionStore,
    G: AccountGateway,
{
    let state = AppState {
        store,
        gateway,
        tokens: Arc::new(config.tokens),
        fence: Arc::new(config.fence),
        settings: config.settings,
    };

    Router::new()
        .route("/check-login", get(check_login::<S, G>))
        .route("/login", post(login::<S, G>))
        .route("/logout", post(logout::<S, G>))
        .route("/search", post(search::<S, G>))
        .route("/get-my-blocks", post(get_my_blocks::<S, G>))
        .route("/reconcile", post(reconcile::<S, G>))
        .with_state(state)
}

// ── Session status ─────────────────────────────────────────────────

async fn check_login<S: SessionStore, G: AccountGateway>(
    outcome: GateOutcome,
) -> Json<SessionStatus> {
    Json(outcome.status())
}

// ── Login ──────────────────────────────────────────────────────────

async fn login<S: SessionStore, G: AccountGateway>(
    State(state): State<AppState<S, G>>,
    private: PrivateCookieJar,
    plain: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(PrivateCookieJar, CookieJar, Json<LoginResponse>), ApiError> {
    let password: AppPassword = req.app_password.parse().map_err(|e| {
        tracing::warn!(handle = %req.handle, "login with malformed app password");
        ApiError::from(e)
    })?;

    // Nowhere to keep the session: do not spend a remote login attempt.
    if !state.store.is_available() {
        return Err(ApiError::Session(SessionStatus::default()));
    }

    let pair = state.tokens.issue_tokens(&req.handle)?;

    state
        .gateway
        .login(&req.handle, &password)
        .await
        .map_err(|e| {
            tracing::warn!(handle = %req.handle, error = %e, "remote login failed");
            ApiError::from(e)
        })?;

    // A new login never reuses a session ID the client already held.
    if let Some(old) = private.get(&state.settings.session_cookie_name) {
        let old = SessionId(old.value().to_string());
        if let Err(e) = state.store.destroy(&old).await {
            tracing::warn!(error = %e, "previous session cleanup failed");
        }
    }

    let created = state
        .store
        .create(SessionRecord {
            handle: req.handle.clone(),
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token,
            user_created: true,
        })
        .await;
    let session_id = match created {
        Ok(id) => id,
        Err(e) => {
            // No session will ever reference the remote login.
            state.gateway.logout(&req.handle).await;
            return Err(match e {
                StoreError::Unavailable => ApiError::Session(SessionStatus::default()),
                e => ApiError::Internal(format!("session creation failed: {e}")),
            });
        }
    };

    let session_cookie = cookies::session_cookie(
        &state.settings.session_cookie_name,
        session_id.as_str(),
        state.settings.session_ttl,
        state.settings.secure_cookies,
    );
    let fence_cookie = cookies::fence_cookie(
        &state.settings.fence_cookie_name,
        state.fence.current(),
        state.settings.session_ttl,
        state.settings.secure_cookies,
    );

    tracing::info!(handle = %req.handle, session_id = %session_id, "login successful");

    Ok((
        private.add(session_cookie),
        plain.add(fence_cookie),
        Json(LoginResponse {
            message: format!("Login successful for: {}", req.handle),
            access_token: pair.access_token,
        }),
    ))
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<S: SessionStore, G: AccountGateway>(
    State(state): State<AppState<S, G>>,
    private: PrivateCookieJar,
    plain: CookieJar,
) -> Result<(PrivateCookieJar, CookieJar, &'static str), ApiError> {
    if let Some(cookie) = private.get(&state.settings.session_cookie_name) {
        let session_id = SessionId(cookie.value().to_string());
        let owner = match state.store.load(&session_id).await {
            Ok(record) => record.map(|r| r.handle),
            Err(_) => None,
        };

        state.store.destroy(&session_id).await.map_err(|e| {
            tracing::error!(error = %e, "session destruction failed during logout");
            ApiError::LogoutFailed
        })?;

        if let Some(handle) = owner {
            state.gateway.logout(&handle).await;
            tracing::info!(handle = %handle, "logout successful");
        }
    }

    let private = private.remove(cookies::clear_cookie(&state.settings.session_cookie_name));
    let plain = plain.remove(cookies::clear_cookie(&state.settings.fence_cookie_name));
    Ok((private, plain, "Logout successful"))
}

// ── Correlation ────────────────────────────────────────────────────

async fn search<S: SessionStore, G: AccountGateway>(
    State(state): State<AppState<S, G>>,
    user: SessionUser,
    Json(req): Json<HandlesRequest>,
) -> (RefreshedToken, Json<SearchResponse>) {
    let results = correlate::existing(state.gateway.as_ref(), &user.handle, &req.handles).await;

    let body = SearchResponse {
        message: format!(
            "Searching Bluesky for {} handles of accounts blocked on the source platform...",
            req.handles.len()
        ),
        results,
    };
    (user.refreshed_token(), Json(body))
}

async fn get_my_blocks<S: SessionStore, G: AccountGateway>(
    State(state): State<AppState<S, G>>,
    user: SessionUser,
    Json(req): Json<BlocksRequest>,
) -> Result<(RefreshedToken, Json<BlockedPage>), ApiError> {
    let page = state
        .gateway
        .list_blocked(&user.handle, req.cursor.as_deref(), BLOCKS_PAGE_SIZE)
        .await?;
    Ok((user.refreshed_token(), Json(page)))
}

async fn reconcile<S: SessionStore, G: AccountGateway>(
    State(state): State<AppState<S, G>>,
    user: SessionUser,
    Json(req): Json<HandlesRequest>,
) -> Result<(RefreshedToken, Json<ReconcileResponse>), ApiError> {
    let results = correlate::correlate(state.gateway.as_ref(), &user.handle, &req.handles).await?;
    let summary = CorrelationSummary::of(&results);

    let body = ReconcileResponse {
        message: format!(
            "{} handles found on Bluesky, of which {} are already blocked and {} are not blocked.",
            results.len(),
            summary.blocked_count,
            summary.not_blocked_count
        ),
        results,
        summary,
    };
    Ok((user.refreshed_token(), Json(body)))
}
