//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and a JSON error body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{OptionId, PollId, VoteId};
use crate::store::StoreError;

/// JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// { "error": "user has already voted in this poll", "code": 2003 }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Numeric error code (see code ranges on [`GatewayError`]).
    pub code: u32,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request              |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server          | 500 Internal Server Error    |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed. Not retryable; the caller must fix it.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Poll with the given ID was not found.
    #[error("poll not found: {0}")]
    PollNotFound(PollId),

    /// Poll option with the given ID was not found.
    #[error("poll option not found: {0}")]
    OptionNotFound(OptionId),

    /// The user already has a vote in this poll. Terminal for the pair.
    #[error("user has already voted in this poll")]
    DuplicateVote,

    /// Storage failure. No partial vote survives it, so the whole
    /// submission may be retried.
    #[error("storage error: {0}")]
    Storage(String),

    /// The vote was committed but its poll's tally could not be read.
    /// Not retryable: resubmitting yields [`GatewayError::DuplicateVote`].
    #[error("vote {0} was recorded but current results are unavailable")]
    TallyUnavailable(VoteId),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::PollNotFound(_) => 2001,
            Self::OptionNotFound(_) => 2002,
            Self::DuplicateVote => 2003,
            Self::Storage(_) => 3001,
            Self::TallyUnavailable(_) => 3002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::PollNotFound(_) | Self::OptionNotFound(_) => StatusCode::NOT_FOUND,
            Self::DuplicateVote => StatusCode::CONFLICT,
            Self::Storage(_) | Self::TallyUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateVote => Self::DuplicateVote,
            StoreError::OptionNotFound(id) => Self::OptionNotFound(id),
            StoreError::Unavailable(msg) | StoreError::Backend(msg) => Self::Storage(msg),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.error_code(),
        };
        (status, axum::Json(body)).into_response()
    }
}
