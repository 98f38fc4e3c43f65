use serde::{Deserialize, Serialize};

use crate::correlate::{CorrelationResult, CorrelationSummary};
use crate::types::Handle;

/// Session status body returned by `/check-login` and by every protected
/// route whose caller is not authenticated. Always sent with HTTP 200.
///
/// Flags that are `false` are omitted, so the client can branch on
/// presence (`serverRestarted`, `noUserFound`, `allTokensExpired`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub logged_in: bool,
    pub data_store: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub server_restarted: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_user_found: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub all_tokens_expired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub token_refreshed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LoginRequest {
    #[serde(alias = "identity")]
    pub(super) handle: Handle,
    #[serde(alias = "secret")]
    pub(super) app_password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LoginResponse {
    pub(super) message: String,
    pub(super) access_token: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct HandlesRequest {
    pub(super) handles: Vec<Handle>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct BlocksRequest {
    #[serde(default)]
    pub(super) cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct SearchResponse {
    pub(super) message: String,
    pub(super) results: Vec<Handle>,
}

#[derive(Debug, Serialize)]
pub(super) struct ReconcileResponse {
    pub(super) message: String,
    pub(super) results: Vec<CorrelationResult>,
    #[serde(flatten)]
    pub(super) summary: CorrelationSummary,
}
