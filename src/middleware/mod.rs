//! Axum integration: the Auth Gate and the bridge routes.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use skybridge::middleware::{BridgeConfig, bridge_routes};
//! use skybridge::{BlueskyConfig, BlueskyGateway, MemorySessionStore};
//!
//! let config = BridgeConfig::from_env()?;
//! let store = Arc::new(MemorySessionStore::default());
//! let gateway = Arc::new(BlueskyGateway::new(BlueskyConfig::new()));
//!
//! let app = axum::Router::new().merge(bridge_routes(config, store, gateway));
//! ```
//!
//! Every gated route answers an unauthenticated caller with HTTP 200 and a
//! [`SessionStatus`] body rather than an error status.

mod config;
mod cookies;
mod error;
mod extractor;
mod gate;
mod routes;
mod state;
mod types;


pub use config::{BridgeConfig, ConfigError, ServiceConfig, StoreBackend};
pub use error::ApiError;
pub use extractor::{ACCESS_TOKEN_HEADER, RefreshedToken};
pub use gate::{GateOutcome, SessionUser, evaluate};
pub use routes::bridge_routes;
pub use types::SessionStatus;

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
