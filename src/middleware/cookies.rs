use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Create session cookie (goes into the private, encrypted jar).
pub(super) fn session_cookie(
    name: &str,
    session_id: &str,
    ttl: Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name.to_string(), session_id.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(ttl)
        .build()
}

/// Create restart-fence cookie. Strict same-site, and lives exactly as long
/// as the session cookie so neither outlives the other in the browser.
pub(super) fn fence_cookie(
    name: &str,
    fence: &str,
    ttl: Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name.to_string(), fence.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/".to_string())
        .max_age(ttl)
        .build()
}

/// Create removal cookie for `name` at path `/`.
pub(super) fn clear_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_attributes() {
        let c = session_cookie("sid", "01ABC", Duration::days(1), true);
        assert_eq!(c.value(), "01ABC");
        assert_eq!(c.http_only(), Some(true));
        assert_eq!(c.secure(), Some(true));
        assert_eq!(c.same_site(), Some(SameSite::Lax));
        assert_eq!(c.max_age(), Some(Duration::days(1)));
    }

    #[test]
    fn fence_cookie_is_strict_and_matches_session_lifetime() {
        let c = fence_cookie("fence", "nonce", Duration::days(1), false);
        assert_eq!(c.http_only(), Some(true));
        assert_eq!(c.same_site(), Some(SameSite::Strict));
        assert_eq!(c.max_age(), Some(Duration::days(1)));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let c = clear_cookie("sid");
        assert_eq!(c.value(), "");
        assert_eq!(c.max_age(), Some(Duration::ZERO));
    }
}
