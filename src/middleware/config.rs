use std::net::SocketAddr;
use std::str::FromStr;

use axum_extra::extract::cookie::Key;
use time::Duration;
use url::Url;

use crate::fence::RestartFence;
use crate::gateway::BlueskyConfig;
use crate::token::TokenService;

/// Configuration errors, raised before the server starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Shared session settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct BridgeSettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_cookie_name: String,
    pub(crate) fence_cookie_name: String,
    pub(crate) session_ttl: Duration,
    pub(crate) secure_cookies: bool,
}

impl BridgeSettings {
    fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            session_cookie_name: "__skybridge_session".into(),
            fence_cookie_name: "__skybridge_fence".into(),
            session_ttl: Duration::days(1),
            secure_cookies: true,
        }
    }
}

/// Session and token configuration for [`bridge_routes`](super::bridge_routes).
///
/// The token service is a constructor parameter; everything else has a
/// default and a `with_*` override. Each config carries its own
/// [`RestartFence`], generated at construction.
pub struct BridgeConfig {
    pub(super) tokens: TokenService,
    pub(super) fence: RestartFence,
    pub(super) settings: BridgeSettings,
}

impl BridgeConfig {
    #[must_use]
    pub fn new(tokens: TokenService) -> Self {
        Self {
            tokens,
            fence: RestartFence::generate(),
            settings: BridgeSettings::defaults(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `JWT_SECRET`: access-token secret
    /// - `REFRESH_TOKEN_SECRET`: refresh-token secret, distinct from `JWT_SECRET`
    ///
    /// # Optional env vars
    /// - `ACCESS_TOKEN_TTL_SECS` (default 120), `REFRESH_TOKEN_TTL_SECS` (default 600)
    /// - `SESSION_TTL_SECS` (default 86400)
    /// - `COOKIE_KEY`: private-cookie key bytes (at least 64)
    /// - `SECURE_COOKIES`: `0`/`false` to allow plain-HTTP development
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required var is missing or a value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let access_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let refresh_secret = lookup("REFRESH_TOKEN_SECRET")
            .ok_or(ConfigError::Missing("REFRESH_TOKEN_SECRET"))?;
        if access_secret == refresh_secret {
            return Err(ConfigError::Invalid {
                var: "REFRESH_TOKEN_SECRET",
                reason: "must differ from JWT_SECRET".into(),
            });
        }

        let access_ttl = parse_or(&lookup, "ACCESS_TOKEN_TTL_SECS", 120_i64)?;
        let refresh_ttl = parse_or(&lookup, "REFRESH_TOKEN_TTL_SECS", 600_i64)?;
        let session_ttl = parse_or(&lookup, "SESSION_TTL_SECS", 86_400_i64)?;
        if access_ttl <= 0 || refresh_ttl < access_ttl || session_ttl <= 0 {
            return Err(ConfigError::Invalid {
                var: "ACCESS_TOKEN_TTL_SECS",
                reason: "TTLs must be positive and refresh must outlive access".into(),
            });
        }

        let tokens = TokenService::new(&access_secret, &refresh_secret)
            .with_access_ttl(Duration::seconds(access_ttl))
            .with_refresh_ttl(Duration::seconds(refresh_ttl));

        let cookie_key = match lookup("COOKIE_KEY") {
            Some(k) => Key::try_from(k.as_bytes()).map_err(|_| ConfigError::Invalid {
                var: "COOKIE_KEY",
                reason: "must be at least 64 bytes; unset it to use an ephemeral key".into(),
            })?,
            None => Key::generate(),
        };

        let secure = !matches!(lookup("SECURE_COOKIES").as_deref(), Some("0" | "false"));

        Ok(Self::new(tokens)
            .with_cookie_key(cookie_key)
            .with_session_ttl(Duration::seconds(session_ttl))
            .with_secure_cookies(secure))
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_fence_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.fence_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.settings.session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_fence(mut self, fence: RestartFence) -> Self {
        self.fence = fence;
        self
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        self.settings.session_ttl
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }
}

/// Where sessions live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redis { url: String, prefix: String },
}

/// Whole-process configuration for the `skybridge` binary.
pub struct ServiceConfig {
    pub bridge: BridgeConfig,
    pub bluesky: BlueskyConfig,
    pub store: StoreBackend,
    pub bind_addr: SocketAddr,
    pub allowed_origin: String,
}

impl ServiceConfig {
    /// [`BridgeConfig::from_env`] plus:
    ///
    /// - `BSKY_SERVICE_URL` (default `https://bsky.social`), `HANDLE_DOMAIN` (default `bsky.social`)
    /// - `SESSION_BACKEND` = `redis` (default) | `memory`
    /// - `REDIS_URL` (default `redis://127.0.0.1:6379`), `REDIS_PREFIX` (default `skybridge:sess:`)
    /// - `BIND_ADDR` (default `0.0.0.0:3001`), `ALLOWED_ORIGIN` (default `http://localhost:5173`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on missing or invalid values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let bridge = BridgeConfig::from_lookup(&lookup)?;

        let mut bluesky = BlueskyConfig::new();
        if let Some(url) = lookup("BSKY_SERVICE_URL") {
            let url: Url = url.parse().map_err(|e| ConfigError::Invalid {
                var: "BSKY_SERVICE_URL",
                reason: format!("{e}"),
            })?;
            bluesky = bluesky.with_service_url(url);
        }
        if let Some(domain) = lookup("HANDLE_DOMAIN") {
            bluesky = bluesky.with_handle_domain(domain.trim_start_matches('.'));
        }

        let store = match lookup("SESSION_BACKEND").as_deref() {
            None | Some("redis") => StoreBackend::Redis {
                url: lookup("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".into()),
                prefix: lookup("REDIS_PREFIX").unwrap_or_else(|| "skybridge:sess:".into()),
            },
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "SESSION_BACKEND",
                    reason: format!("unknown backend '{other}' (expected redis or memory)"),
                });
            }
        };

        let bind_addr = parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3001)))?;
        let allowed_origin =
            lookup("ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:5173".into());

        Ok(Self {
            bridge,
            bluesky,
            store,
            bind_addr,
            allowed_origin,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    const SECRETS: [(&str, &str); 2] = [("JWT_SECRET", "a"), ("REFRESH_TOKEN_SECRET", "r")];

    #[test]
    fn secrets_are_required() {
        let err = BridgeConfig::from_lookup(env(&[])).err().unwrap();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET")));

        let err = BridgeConfig::from_lookup(env(&[("JWT_SECRET", "a")]))
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::Missing("REFRESH_TOKEN_SECRET")));
    }

    #[test]
    fn secrets_must_differ() {
        let err = BridgeConfig::from_lookup(env(&[
            ("JWT_SECRET", "same"),
            ("REFRESH_TOKEN_SECRET", "same"),
        ]))
        .err()
        .unwrap();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn defaults_apply() {
        let config = BridgeConfig::from_lookup(env(&SECRETS)).unwrap();
        assert_eq!(config.tokens().access_ttl(), Duration::minutes(2));
        assert_eq!(config.tokens().refresh_ttl(), Duration::minutes(10));
        assert_eq!(config.session_ttl(), Duration::days(1));
        assert!(config.settings.secure_cookies);
    }

    #[test]
    fn ttl_overrides_and_validation() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("ACCESS_TOKEN_TTL_SECS", "60"));
        let config = BridgeConfig::from_lookup(env(&pairs)).unwrap();
        assert_eq!(config.tokens().access_ttl(), Duration::seconds(60));

        let mut pairs = SECRETS.to_vec();
        pairs.push(("REFRESH_TOKEN_TTL_SECS", "30"));
        assert!(BridgeConfig::from_lookup(env(&pairs)).is_err());

        let mut pairs = SECRETS.to_vec();
        pairs.push(("SESSION_TTL_SECS", "soon"));
        assert!(BridgeConfig::from_lookup(env(&pairs)).is_err());
    }

    #[test]
    fn short_cookie_key_rejected() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("COOKIE_KEY", "too-short"));
        let err = BridgeConfig::from_lookup(env(&pairs)).err().unwrap();
        assert!(matches!(err, ConfigError::Invalid { var: "COOKIE_KEY", .. }));
    }

    #[test]
    fn insecure_cookies_opt_in() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("SECURE_COOKIES", "false"));
        let config = BridgeConfig::from_lookup(env(&pairs)).unwrap();
        assert!(!config.settings.secure_cookies);
    }

    #[test]
    fn service_defaults() {
        let config = ServiceConfig::from_lookup(env(&SECRETS)).unwrap();
        assert_eq!(
            config.store,
            StoreBackend::Redis {
                url: "redis://127.0.0.1:6379".into(),
                prefix: "skybridge:sess:".into()
            }
        );
        assert_eq!(config.bind_addr.port(), 3001);
        assert_eq!(config.bluesky.handle_domain(), "bsky.social");
        assert_eq!(config.allowed_origin, "http://localhost:5173");
    }

    #[test]
    fn service_overrides() {
        let mut pairs = SECRETS.to_vec();
        pairs.extend([
            ("SESSION_BACKEND", "memory"),
            ("HANDLE_DOMAIN", ".example.social"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("BSKY_SERVICE_URL", "http://localhost:2583"),
        ]);
        let config = ServiceConfig::from_lookup(env(&pairs)).unwrap();
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.bluesky.handle_domain(), "example.social");
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.bluesky.service_url().as_str(), "http://localhost:2583/");
    }

    #[test]
    fn unknown_backend_rejected() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("SESSION_BACKEND", "sled"));
        assert!(ServiceConfig::from_lookup(env(&pairs)).is_err());
    }
}
