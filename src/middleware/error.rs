use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::types::SessionStatus;

/// HTTP-facing errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Caller is not authenticated. Rendered as HTTP 200 with the status body
    /// so clients branch on payload fields, not status codes.
    #[error("session not authenticated")]
    Session(SessionStatus),

    /// App password failed local validation.
    #[error("Invalid app password")]
    MalformedSecret,

    /// Remote platform rejected the credentials.
    #[error("Login failed")]
    LoginFailed,

    /// Session destruction failed during logout.
    #[error("Logout failed")]
    LogoutFailed,

    /// Anything else. Detail is logged, never returned.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Session(status) => (StatusCode::OK, Json(status)).into_response(),
            Self::MalformedSecret => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
            Self::LoginFailed => (StatusCode::UNAUTHORIZED, self.to_string()).into_response(),
            Self::LogoutFailed => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
            Self::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

impl From<crate::error::Error> for ApiError {
    fn from(e: crate::error::Error) -> Self {
        match e {
            crate::error::Error::MalformedSecret => Self::MalformedSecret,
            crate::error::Error::AuthFailure(_) => Self::LoginFailed,
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn session_states_are_200() {
        let res = ApiError::Session(SessionStatus::default()).into_response();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[test]
    fn credential_errors_map_to_4xx() {
        assert_eq!(
            ApiError::from(Error::MalformedSecret).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(Error::AuthFailure("nope".into()))
                .into_response()
                .status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn remote_failures_are_500() {
        let err = Error::Remote {
            operation: "get blocks",
            status: Some(502),
            detail: "upstream secret detail".into(),
        };
        let res = ApiError::from(err).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ApiError::from(Error::PaginationExhausted(1000))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
