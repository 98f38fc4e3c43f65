use std::sync::Arc;

use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::version4::V4;
use pasetors::{Local, local};
use sha2::{Digest, Sha256};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use crate::error::Error;
use crate::types::Handle;

const ISSUER: &str = "skybridge";

/// Source of "now" for token issuance.
pub type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

/// Which secret and audience a token is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn audience(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// Access/refresh pair issued together for one handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues and verifies PASETO `v4.local` access and refresh tokens.
///
/// Each kind has its own 32-byte key (SHA-256 of the configured secret) and
/// its own lifetime. Verification needs no store lookup.
#[derive(Clone)]
pub struct TokenService {
    access_key: [u8; 32],
    refresh_key: [u8; 32],
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Clock,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Access tokens live 2 minutes, refresh tokens 10 minutes.
    pub const DEFAULT_ACCESS_TTL: Duration = Duration::minutes(2);
    pub const DEFAULT_REFRESH_TTL: Duration = Duration::minutes(10);

    #[must_use]
    pub fn new(access_secret: &str, refresh_secret: &str) -> Self {
        Self {
            access_key: derive_key(access_secret),
            refresh_key: derive_key(refresh_secret),
            access_ttl: Self::DEFAULT_ACCESS_TTL,
            refresh_ttl: Self::DEFAULT_REFRESH_TTL,
            clock: Arc::new(OffsetDateTime::now_utc),
        }
    }

    #[must_use]
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    /// Replace the issuance clock. Verification always uses the wall clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Issues an access/refresh pair bound to `handle`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Token` if claim construction or encryption fails.
    pub fn issue_tokens(&self, handle: &Handle) -> Result<TokenPair, Error> {
        Ok(TokenPair {
            access_token: self.issue(TokenKind::Access, handle)?,
            refresh_token: self.issue(TokenKind::Refresh, handle)?,
        })
    }

    /// Mints a single access token (the refresh path does not rotate the
    /// refresh token).
    ///
    /// # Errors
    ///
    /// Returns `Error::Token` if claim construction or encryption fails.
    pub fn issue_access(&self, handle: &Handle) -> Result<String, Error> {
        self.issue(TokenKind::Access, handle)
    }

    /// Verifies an access token and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns `Error::Token` on a wrong key, tampering, expiry, or a
    /// refresh token presented as an access token.
    pub fn verify_access(&self, token: &str) -> Result<Handle, Error> {
        self.verify(TokenKind::Access, token)
    }

    /// Verifies a refresh token and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns `Error::Token` under the same conditions as
    /// [`verify_access`](Self::verify_access).
    pub fn verify_refresh(&self, token: &str) -> Result<Handle, Error> {
        self.verify(TokenKind::Refresh, token)
    }

    fn key(&self, kind: TokenKind) -> Result<SymmetricKey<V4>, Error> {
        let bytes = match kind {
            TokenKind::Access => &self.access_key,
            TokenKind::Refresh => &self.refresh_key,
        };
        SymmetricKey::<V4>::from(bytes).map_err(|e| Error::Token(e.to_string()))
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    fn issue(&self, kind: TokenKind, handle: &Handle) -> Result<String, Error> {
        let now = (self.clock)();
        let issued_at = rfc3339(now)?;
        let expires_at = rfc3339(now + self.ttl(kind))?;

        let claims = build_claims(handle, kind.audience(), &issued_at, &expires_at)
            .map_err(|e| Error::Token(e.to_string()))?;

        local::encrypt(&self.key(kind)?, &claims, None, None)
            .map_err(|e| Error::Token(e.to_string()))
    }

    fn verify(&self, kind: TokenKind, token_str: &str) -> Result<Handle, Error> {
        if !token_str.starts_with("v4.local.") {
            return Err(Error::Token("invalid token format".into()));
        }

        // exp, nbf and iat are checked against the wall clock by default
        let mut validation_rules = ClaimsValidationRules::new();
        validation_rules.validate_issuer_with(ISSUER);
        validation_rules.validate_audience_with(kind.audience());

        let untrusted_token = UntrustedToken::<Local, V4>::try_from(token_str)
            .map_err(|e| Error::Token(e.to_string()))?;

        let trusted_token =
            local::decrypt(&self.key(kind)?, &untrusted_token, &validation_rules, None, None)
                .map_err(|e| Error::Token(e.to_string()))?;

        let claims = trusted_token
            .payload_claims()
            .ok_or_else(|| Error::Token("missing payload".into()))?;

        claims
            .get_claim("sub")
            .and_then(|v| v.as_str())
            .map(Handle::from)
            .ok_or_else(|| Error::Token("missing claim: sub".into()))
    }
}

fn build_claims(
    handle: &Handle,
    audience: &str,
    issued_at: &str,
    expires_at: &str,
) -> Result<Claims, pasetors::errors::Error> {
    let mut claims = Claims::new()?;
    claims.issued_at(issued_at)?;
    claims.not_before(issued_at)?;
    claims.expiration(expires_at)?;
    claims.issuer(ISSUER)?;
    claims.audience(audience)?;
    claims.subject(handle.as_str())?;
    Ok(claims)
}

fn derive_key(secret: &str) -> [u8; 32] {
    let digest = Sha256::digest(secret.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

fn rfc3339(at: OffsetDateTime) -> Result<String, Error> {
    at.format(&Rfc3339).map_err(|e| Error::Token(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("access-secret", "refresh-secret")
    }

    /// Same keys as `service()`, but issuing as if `ago` had already passed.
    fn issued_ago(ago: Duration) -> TokenService {
        service().with_clock(Arc::new(move || OffsetDateTime::now_utc() - ago))
    }

    #[test]
    fn issued_pair_verifies() {
        let svc = service();
        let alice = Handle::from("alice.bsky.social");
        let pair = svc.issue_tokens(&alice).unwrap();

        assert_eq!(svc.verify_access(&pair.access_token).unwrap(), alice);
        assert_eq!(svc.verify_refresh(&pair.refresh_token).unwrap(), alice);
        assert_ne!(pair.access_token, pair.refresh_token);
    }

    #[test]
    fn kinds_do_not_cross_verify() {
        let svc = service();
        let pair = svc.issue_tokens(&Handle::from("alice")).unwrap();

        assert!(svc.verify_access(&pair.refresh_token).is_err());
        assert!(svc.verify_refresh(&pair.access_token).is_err());
    }

    #[test]
    fn same_secret_still_separates_kinds() {
        let svc = TokenService::new("shared", "shared");
        let pair = svc.issue_tokens(&Handle::from("alice")).unwrap();
        assert!(svc.verify_access(&pair.refresh_token).is_err());
    }

    #[test]
    fn foreign_secret_rejected() {
        let pair = service().issue_tokens(&Handle::from("alice")).unwrap();
        let other = TokenService::new("other-access", "other-refresh");

        assert!(other.verify_access(&pair.access_token).is_err());
        assert!(other.verify_refresh(&pair.refresh_token).is_err());
    }

    #[test]
    fn access_expires_before_refresh() {
        let svc = service();
        let pair = issued_ago(Duration::minutes(3))
            .issue_tokens(&Handle::from("alice"))
            .unwrap();

        assert!(svc.verify_access(&pair.access_token).is_err());
        assert!(svc.verify_refresh(&pair.refresh_token).is_ok());
    }

    #[test]
    fn both_expire_after_refresh_window() {
        let svc = service();
        let pair = issued_ago(Duration::minutes(11))
            .issue_tokens(&Handle::from("alice"))
            .unwrap();

        assert!(svc.verify_access(&pair.access_token).is_err());
        assert!(svc.verify_refresh(&pair.refresh_token).is_err());
    }

    #[test]
    fn custom_ttls_apply() {
        let svc = service().with_access_ttl(Duration::minutes(30));
        let pair = issued_ago(Duration::minutes(3))
            .with_access_ttl(Duration::minutes(30))
            .issue_tokens(&Handle::from("alice"))
            .unwrap();
        assert!(svc.verify_access(&pair.access_token).is_ok());
    }

    #[test]
    fn garbage_rejected() {
        let svc = service();
        assert!(svc.verify_access("").is_err());
        assert!(svc.verify_access("v4.public.abc").is_err());
        assert!(svc.verify_access("v4.local.not-a-token").is_err());
    }
}
