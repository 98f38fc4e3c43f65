use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;
use url::Url;

use super::{AccountGateway, BlockedPage};
use crate::app_password::AppPassword;
use crate::error::Error;
use crate::types::Handle;

const CREATE_SESSION: &str = "com.atproto.server.createSession";
const REFRESH_SESSION: &str = "com.atproto.server.refreshSession";
const GET_PROFILE: &str = "app.bsky.actor.getProfile";
const GET_BLOCKS: &str = "app.bsky.graph.getBlocks";

/// Bluesky / AT Protocol gateway configuration.
///
/// ```rust,ignore
/// let config = BlueskyConfig::new()
///     .with_service_url("https://bsky.social".parse()?)
///     .with_handle_domain("bsky.social");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct BlueskyConfig {
    pub(crate) service_url: Url,
    pub(crate) handle_domain: String,
}

impl BlueskyConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            service_url: "https://bsky.social".parse().expect("valid default URL"),
            handle_domain: "bsky.social".into(),
        }
    }

    /// Override the PDS / entryway URL.
    #[must_use]
    pub fn with_service_url(mut self, url: Url) -> Self {
        self.service_url = url;
        self
    }

    /// Domain appended to bare candidate handles before probing.
    #[must_use]
    pub fn with_handle_domain(mut self, domain: impl Into<String>) -> Self {
        self.handle_domain = domain.into();
        self
    }

    #[must_use]
    pub fn service_url(&self) -> &Url {
        &self.service_url
    }

    #[must_use]
    pub fn handle_domain(&self) -> &str {
        &self.handle_domain
    }

    /// `alice` → `alice.bsky.social`; qualified handles pass through.
    #[must_use]
    pub fn qualify(&self, handle: &Handle) -> Handle {
        if handle.is_qualified() {
            handle.clone()
        } else {
            Handle(format!("{}.{}", handle, self.handle_domain))
        }
    }
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Remote credentials from `createSession` / `refreshSession`.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteSession {
    access_jwt: String,
    refresh_jwt: String,
    #[serde(default)]
    did: Option<String>,
}

struct RemoteEntry {
    session: RemoteSession,
    expires_at: Instant,
}

#[derive(Serialize)]
struct CreateSessionBody<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct XrpcError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// XRPC client holding one remote session per logged-in handle.
///
/// Remote sessions expire after [`with_session_ttl`](Self::with_session_ttl)
/// even without a logout; expired entries are pruned on every login.
pub struct BlueskyGateway {
    config: BlueskyConfig,
    http: reqwest::Client,
    sessions: RwLock<HashMap<Handle, RemoteEntry>>,
    session_ttl: Duration,
}

impl BlueskyGateway {
    pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

    #[must_use]
    pub fn new(config: BlueskyConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            sessions: RwLock::new(HashMap::new()),
            session_ttl: Self::DEFAULT_SESSION_TTL,
        }
    }

    /// How long a remote session is kept after login.
    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &BlueskyConfig {
        &self.config
    }

    fn xrpc(&self, nsid: &str) -> String {
        format!(
            "{}/xrpc/{nsid}",
            self.config.service_url.as_str().trim_end_matches('/')
        )
    }

    async fn remote_session(&self, viewer: &Handle) -> Result<RemoteSession, Error> {
        self.sessions
            .read()
            .await
            .get(viewer)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.session.clone())
            .ok_or_else(|| Error::NoRemoteSession(viewer.clone()))
    }

    #[cfg(test)]
    async fn remote_session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn refresh(&self, viewer: &Handle) -> Result<RemoteSession, Error> {
        let current = self.remote_session(viewer).await?;
        let response = self
            .http
            .post(self.xrpc(REFRESH_SESSION))
            .bearer_auth(&current.refresh_jwt)
            .send()
            .await?;
        let response = Self::ensure_success(response, "refresh session").await?;
        let refreshed: RemoteSession = response.json().await?;

        // Refreshing never extends the entry's lifetime.
        if let Some(entry) = self.sessions.write().await.get_mut(viewer) {
            entry.session = refreshed.clone();
        }
        tracing::debug!(handle = %viewer, "remote session refreshed");
        Ok(refreshed)
    }

    /// Authenticated GET; an `ExpiredToken` answer triggers one refresh and retry.
    async fn get_authed<T: DeserializeOwned>(
        &self,
        viewer: &Handle,
        nsid: &str,
        operation: &'static str,
        query: &[(&str, &str)],
    ) -> Result<T, Error> {
        let mut session = self.remote_session(viewer).await?;
        let mut refreshed = false;
        loop {
            let response = self
                .http
                .get(self.xrpc(nsid))
                .query(query)
                .bearer_auth(&session.access_jwt)
                .send()
                .await?;

            match Self::ensure_success(response, operation).await {
                Ok(response) => return response.json::<T>().await.map_err(Into::into),
                Err(e) if !refreshed && is_expired_token(&e) => {
                    session = self.refresh(viewer).await?;
                    refreshed = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let detail = match serde_json::from_str::<XrpcError>(&body) {
            Ok(XrpcError {
                error: Some(error),
                message,
            }) => match message {
                Some(message) => format!("{error}: {message}"),
                None => error,
            },
            _ => body,
        };
        Err(Error::Remote {
            operation,
            status: Some(status),
            detail,
        })
    }
}

fn is_expired_token(e: &Error) -> bool {
    matches!(e, Error::Remote { detail, .. } if detail.starts_with("ExpiredToken"))
}

impl AccountGateway for BlueskyGateway {
    async fn login(&self, handle: &Handle, password: &AppPassword) -> Result<(), Error> {
        let body = CreateSessionBody {
            identifier: handle.as_str(),
            password: password.expose(),
        };
        let response = self
            .http
            .post(self.xrpc(CREATE_SESSION))
            .json(&body)
            .send()
            .await?;

        let session: RemoteSession = match Self::ensure_success(response, "create session").await {
            Ok(response) => response.json().await?,
            Err(Error::Remote {
                status: Some(400 | 401),
                detail,
                ..
            }) => return Err(Error::AuthFailure(detail)),
            Err(e) => return Err(e),
        };

        tracing::debug!(handle = %handle, did = ?session.did, "remote session created");
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, entry| entry.expires_at > now);
        sessions.insert(
            handle.clone(),
            RemoteEntry {
                session,
                expires_at: now + self.session_ttl,
            },
        );
        Ok(())
    }

    async fn logout(&self, handle: &Handle) {
        self.sessions.write().await.remove(handle);
    }

    async fn profile_exists(&self, viewer: &Handle, candidate: &Handle) -> bool {
        let actor = self.config.qualify(candidate);
        let result = self
            .get_authed::<serde_json::Value>(
                viewer,
                GET_PROFILE,
                "get profile",
                &[("actor", actor.as_str())],
            )
            .await;

        match result {
            Ok(_) => true,
            Err(Error::Remote {
                status: Some(400), ..
            }) => {
                tracing::debug!(actor = %actor, "profile not found");
                false
            }
            // Rate limits and outages are not proof of absence, but count as it.
            Err(e) => {
                tracing::debug!(actor = %actor, error = %e, "profile probe failed");
                false
            }
        }
    }

    async fn list_blocked(
        &self,
        viewer: &Handle,
        cursor: Option<&str>,
        limit: u8,
    ) -> Result<BlockedPage, Error> {
        let limit = limit.to_string();
        let mut query = vec![("limit", limit.as_str())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        self.get_authed(viewer, GET_BLOCKS, "get blocks", &query)
            .await
    }
}
