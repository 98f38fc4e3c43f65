//! Remote Account Gateway: the thin seam over the social platform.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::app_password::AppPassword;
use crate::error::Error;
use crate::types::Handle;

mod bluesky;

pub use bluesky::{BlueskyConfig, BlueskyGateway};

/// Page size for blocked-account listings.
pub const BLOCKS_PAGE_SIZE: u8 = 100;

/// One account on the remote blocked list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedAccount {
    pub did: String,
    /// Fully qualified handle (`alice.bsky.social`).
    pub handle: Handle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// One page of the remote blocked list. `next_cursor` is absent on the last page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedPage {
    #[serde(rename = "blocks", default)]
    pub accounts: Vec<BlockedAccount>,
    #[serde(rename = "cursor", default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Access to the remote social platform on behalf of logged-in users.
///
/// Implementations hold one remote session per handle that logged in.
pub trait AccountGateway: Send + Sync + 'static {
    /// Authenticate `handle` against the remote platform.
    ///
    /// The password type guarantees the secret is well-formed, so malformed
    /// secrets never reach the remote side.
    fn login(
        &self,
        handle: &Handle,
        password: &AppPassword,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Drop any remote session held for `handle`.
    fn logout(&self, handle: &Handle) -> impl Future<Output = ()> + Send;

    /// Existence probe for `candidate`, as seen by `viewer`.
    ///
    /// Any remote failure (not found, rate limit, timeout) yields `false`.
    fn profile_exists(
        &self,
        viewer: &Handle,
        candidate: &Handle,
    ) -> impl Future<Output = bool> + Send;

    /// Fetch one page of `viewer`'s blocked accounts.
    fn list_blocked(
        &self,
        viewer: &Handle,
        cursor: Option<&str>,
        limit: u8,
    ) -> impl Future<Output = Result<BlockedPage, Error>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_page_reads_xrpc_shape() {
        let json = r#"{
            "blocks": [
                {"did": "did:plc:1", "handle": "alice.bsky.social", "displayName": "Alice",
                 "viewer": {"blocking": "at://x"}},
                {"did": "did:plc:2", "handle": "bob.bsky.social"}
            ],
            "cursor": "abc"
        }"#;
        let page: BlockedPage = serde_json::from_str(json).unwrap();

        assert_eq!(page.accounts.len(), 2);
        assert_eq!(page.accounts[0].display_name.as_deref(), Some("Alice"));
        assert_eq!(page.accounts[1].avatar, None);
        assert_eq!(page.next_cursor.as_deref(), Some("abc"));
    }

    #[test]
    fn last_page_has_no_cursor() {
        let page: BlockedPage = serde_json::from_str(r#"{"blocks": []}"#).unwrap();
        assert!(page.next_cursor.is_none());

        let out = serde_json::to_value(&page).unwrap();
        assert!(out.get("cursor").is_none());
    }
}
