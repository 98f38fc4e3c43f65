use crate::types::Handle;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("malformed app password")]
    MalformedSecret,
    #[error("remote login rejected: {0}")]
    AuthFailure(String),
    #[error("{operation} failed (status {status:?}): {detail}")]
    Remote {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Token verification error: {0}")]
    Token(String),
    #[error("blocked-account listing abandoned after {0} pages")]
    PaginationExhausted(usize),
    #[error("Session store unavailable")]
    StoreUnavailable,
    #[error("Session store error: {0}")]
    Store(String),
    #[error("no remote session for {0}")]
    NoRemoteSession(Handle),
}

impl From<crate::store::StoreError> for Error {
    fn from(e: crate::store::StoreError) -> Self {
        match e {
            crate::store::StoreError::Unavailable => Self::StoreUnavailable,
            crate::store::StoreError::Backend(msg) => Self::Store(msg),
        }
    }
}
