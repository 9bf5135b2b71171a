use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bridge_cloud::CloudError;
use bridge_email::EmailError;
use bridge_security::SecurityError;
use thiserror::Error;

/// Every failure a handler can report, mapped to one status in one place.
///
/// Display strings are logged; response bodies carry only the fixed text below.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("bad request: {0}")]
    BadRequest(&'static str),
    #[error("sign-in failed: {0}")]
    SignIn(SecurityError),
    #[error("recording not found")]
    RecordingNotFound,
    #[error("not found")]
    NotFound,
    #[error("correlation store unavailable: {0}")]
    StoreUnavailable(SecurityError),
    #[error("mail server error: {0}")]
    Mail(#[from] EmailError),
    #[error("cloud API error: {0}")]
    Cloud(#[from] CloudError),
}

impl From<SecurityError> for ApiError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::MissingPendingRedirect => {
                Self::BadRequest("no sign-in is in progress for this session")
            }
            SecurityError::MissingCode => Self::BadRequest("authorization code is missing"),
            SecurityError::StateMismatch => Self::BadRequest("authorization state does not match"),
            SecurityError::UnsafeRedirect => Self::BadRequest("sign-in target is not a local path"),
            SecurityError::Redis(_)
            | SecurityError::StoreUnavailable
            | SecurityError::TokenCollision => Self::StoreUnavailable(err),
            other => Self::SignIn(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Unauthenticated => {
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({ "error": "authentication required" })),
                )
                    .into_response();
            }
            Self::BadRequest(message) => {
                tracing::info!(reason = *message, "rejected request");
                return (StatusCode::BAD_REQUEST, *message).into_response();
            }
            Self::RecordingNotFound => {
                return (StatusCode::NOT_FOUND, "Unable to find recording.").into_response();
            }
            Self::NotFound => return StatusCode::NOT_FOUND.into_response(),
            _ => {}
        }

        let (status, message) = match &self {
            Self::StoreUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Temporarily unavailable.",
            ),
            Self::SignIn(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Unable to complete sign-in."),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Request failed."),
        };
        tracing::error!(error = %self, status = %status, "request failed");
        (status, message).into_response()
    }
}
