use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::BridgeSettings;
use crate::fence::RestartFence;
use crate::gateway::AccountGateway;
use crate::store::SessionStore;
use crate::token::TokenService;

/// Shared state for bridge route handlers.
pub(super) struct AppState<S, G> {
    pub(super) store: Arc<S>,
    pub(super) gateway: Arc<G>,
    pub(super) tokens: Arc<TokenService>,
    pub(super) fence: Arc<RestartFence>,
    pub(super) settings: BridgeSettings,
}

// Manual Clone: avoid derive adding `S: Clone, G: Clone` bounds.
impl<S, G> Clone for AppState<S, G> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            gateway: self.gateway.clone(),
            tokens: self.tokens.clone(),
            fence: self.fence.clone(),
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<S: SessionStore, G: AccountGateway> FromRef<AppState<S, G>> for Key {
    fn from_ref(state: &AppState<S, G>) -> Self {
        state.settings.cookie_key.clone()
    }
}
