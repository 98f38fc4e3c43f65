use std::sync::Arc;

use anyhow::Context;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use skybridge::middleware::{ACCESS_TOKEN_HEADER, ServiceConfig, StoreBackend, bridge_routes};
use skybridge::{BlueskyGateway, MemorySessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,skybridge=debug")),
        )
        .init();

    let config = ServiceConfig::from_env().context("invalid configuration")?;
    let session_ttl = std::time::Duration::try_from(config.bridge.session_ttl())
        .context("SESSION_TTL_SECS must be positive")?;
    let remote_ttl = std::time::Duration::try_from(config.bridge.tokens().refresh_ttl())
        .context("REFRESH_TOKEN_TTL_SECS must be positive")?;
    let gateway =
        Arc::new(BlueskyGateway::new(config.bluesky.clone()).with_session_ttl(remote_ttl));

    let bridge = match &config.store {
        StoreBackend::Memory => {
            tracing::warn!("using in-memory session store; sessions are lost on restart");
            bridge_routes(
                config.bridge,
                Arc::new(MemorySessionStore::new(session_ttl)),
                gateway,
            )
        }
        #[cfg(feature = "redis")]
        StoreBackend::Redis { url, prefix } => {
            let store = skybridge::RedisSessionStore::connect(url, prefix.clone(), session_ttl)
                .await
                .context("redis session store")?;
            bridge_routes(config.bridge, Arc::new(store), gateway)
        }
        #[cfg(not(feature = "redis"))]
        StoreBackend::Redis { .. } => {
            anyhow::bail!("SESSION_BACKEND=redis requires the `redis` feature")
        }
    };

    let origin: HeaderValue = config
        .allowed_origin
        .parse()
        .context("ALLOWED_ORIGIN is not a valid header value")?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([ACCESS_TOKEN_HEADER]);

    let app = bridge.layer(cors).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "skybridge listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
