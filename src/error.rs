//! Relay error types with HTTP status code mapping.
//!
//! [`RelayError`] covers startup and plumbing failures. Steady-state
//! connection faults never become a `RelayError`: they are turned into a
//! local teardown or a notice frame where they happen.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// ```json
/// {
///   "error": {
///     "code": 3001,
///     "message": "hub unavailable"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Relay error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category      | HTTP Status                 |
/// |-----------|---------------|-----------------------------|
/// | 1000–1999 | Configuration | 500 Internal Server Error   |
/// | 3000–3999 | Runtime       | 502 / 503                   |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A configuration value is present but unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// `LISTEN_ADDR` could not be parsed.
    #[error("invalid listen address: {0}")]
    InvalidListenAddr(#[from] std::net::AddrParseError),

    /// The hub task has stopped accepting commands.
    #[error("hub unavailable")]
    HubUnavailable,

    /// Error from the upstream Redis feed.
    #[error("feed error: {0}")]
    Feed(#[from] redis::RedisError),
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Config(_) => 1001,
            Self::InvalidListenAddr(_) => 1002,
            Self::HubUnavailable => 3001,
            Self::Feed(_) => 3002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::HubUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Feed(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::InvalidListenAddr(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        (status, axum::Json(body)).into_response()
    }
}
