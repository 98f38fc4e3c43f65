use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::HeaderValue;
use axum::http::header::HeaderName;
use axum::http::request::Parts;
use axum::response::{IntoResponseParts, ResponseParts};
use axum_extra::extract::cookie::Key;
use axum_extra::extract::{CookieJar, PrivateCookieJar};

use super::error::ApiError;
use super::gate::{self, GateOutcome, SessionUser};
use super::state::AppState;
use crate::gateway::AccountGateway;
use crate::store::SessionStore;
use crate::types::SessionId;

/// Response header carrying an access token minted during the request.
pub const ACCESS_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-access-token");

/// Runs the Auth Gate for the request.
///
/// Every session state is an `Ok` outcome; only genuine failures reject.
impl<S, G> FromRequestParts<AppState<S, G>> for GateOutcome
where
    S: SessionStore,
    G: AccountGateway,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S, G>,
    ) -> Result<Self, Self::Rejection> {
        let plain = CookieJar::from_headers(&parts.headers);
        let private: PrivateCookieJar<Key> =
            PrivateCookieJar::from_headers(&parts.headers, state.settings.cookie_key.clone());

        let fence_cookie = plain
            .get(&state.settings.fence_cookie_name)
            .map(|c| c.value().to_string());
        let session_id = private
            .get(&state.settings.session_cookie_name)
            .map(|c| SessionId(c.value().to_string()));

        gate::evaluate(
            state.store.as_ref(),
            &state.tokens,
            &state.fence,
            session_id.as_ref(),
            fence_cookie.as_deref(),
        )
        .await
        .map_err(ApiError::from)
    }
}

/// Authenticated user for protected routes.
///
/// Unauthenticated callers are answered with the HTTP 200 session status
/// body before the handler runs.
///
/// ```rust,ignore
/// async fn protected(user: SessionUser) -> impl IntoResponse {
///     format!("Hello, {}", user.handle)
/// }
/// ```
impl<S, G> FromRequestParts<AppState<S, G>> for SessionUser
where
    S: SessionStore,
    G: AccountGateway,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S, G>,
    ) -> Result<Self, Self::Rejection> {
        match GateOutcome::from_request_parts(parts, state).await? {
            GateOutcome::Authenticated(user) => Ok(user),
            other => Err(ApiError::Session(other.status())),
        }
    }
}

/// Echoes a rotated access token back in [`ACCESS_TOKEN_HEADER`].
pub struct RefreshedToken(pub Option<String>);

impl SessionUser {
    #[must_use]
    pub fn refreshed_token(&self) -> RefreshedToken {
        RefreshedToken(self.refreshed.then(|| self.access_token.clone()))
    }
}

impl IntoResponseParts for RefreshedToken {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if let Some(value) = self.0.and_then(|t| HeaderValue::from_str(&t).ok()) {
            res.headers_mut().insert(ACCESS_TOKEN_HEADER, value);
        }
        Ok(res)
    }
}
