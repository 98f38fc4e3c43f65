use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Account handle on the remote platform.
///
/// Either bare (`alice`, as imported from another platform) or fully
/// qualified (`alice.bsky.social`). Case is preserved as supplied.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct Handle(pub String);

impl Handle {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the first `.`, lowercased.
    ///
    /// `Alice.bsky.social` and `alice` both yield `alice`.
    #[must_use]
    pub fn local_part(&self) -> String {
        self.0
            .split('.')
            .next()
            .unwrap_or_default()
            .to_lowercase()
    }

    /// Whether the handle already carries a domain suffix.
    #[must_use]
    pub fn is_qualified(&self) -> bool {
        self.0.contains('.')
    }
}

impl From<&str> for Handle {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque session identifier carried in the private session cookie.
///
/// Issued by [`SessionStore::create`](crate::store::SessionStore::create).
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Fresh ULID-backed identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_part_strips_domain_and_case() {
        assert_eq!(Handle::from("Alice.bsky.social").local_part(), "alice");
        assert_eq!(Handle::from("BOB").local_part(), "bob");
        assert_eq!(Handle::from("").local_part(), "");
    }

    #[test]
    fn qualified_detection() {
        assert!(Handle::from("alice.bsky.social").is_qualified());
        assert!(!Handle::from("alice").is_qualified());
    }

    #[test]
    fn handle_serde_is_transparent() {
        let h = Handle::from("alice");
        assert_eq!(serde_json::to_string(&h).unwrap(), "\"alice\"");
        let parsed: Handle = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(parsed, h);
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[test]
    fn newtypes_prevent_mixing() {
        fn takes_handle(_: &Handle) {}
        fn takes_session_id(_: &SessionId) {}

        takes_handle(&Handle::from("id"));
        takes_session_id(&SessionId::from("id".to_string()));
        // takes_handle(&SessionId::from("id".to_string()));  // Compile error!
    }
}
