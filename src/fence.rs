use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;

/// Per-process nonce that invalidates client-held sessions across restarts.
///
/// Generated once at startup and never persisted. A client echoes it back in
/// a cookie; any value other than [`current`](RestartFence::current) is stale,
/// even when the session store and the client's tokens survived the restart.
#[derive(Debug, Clone)]
pub struct RestartFence {
    value: String,
}

impl RestartFence {
    /// Generates a fresh fence (64 random bytes → 86-char base64url string).
    #[must_use]
    pub fn generate() -> Self {
        let random_bytes: [u8; 64] = rand::rng().random();
        Self {
            value: URL_SAFE_NO_PAD.encode(random_bytes),
        }
    }

    /// Current fence value, to be set in the client's fence cookie on login.
    #[must_use]
    pub fn current(&self) -> &str {
        &self.value
    }

    /// Whether a client-echoed value is stale.
    ///
    /// An absent cookie is not stale: the session checks that follow decide
    /// between "never logged in" and "expired".
    #[must_use]
    pub fn is_stale(&self, client_value: Option<&str>) -> bool {
        client_value.is_some_and(|v| v != self.value)
    }

    /// Whether the client echoed exactly the current value.
    ///
    /// Required before any token is trusted: a missing cookie does not
    /// prove the session was opened by this process.
    #[must_use]
    pub fn confirms(&self, client_value: Option<&str>) -> bool {
        client_value == Some(self.value.as_str())
    }
}

impl Default for RestartFence {
    fn default() -> Self {
        Self::generate()
    }
}
