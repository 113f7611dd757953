//! Error-to-HTTP mapping.
//!
//! `not-found` -> 404, `invalid-input` -> 400, `conflict` -> 409,
//! `upstream-failure` -> 502, `config-error` -> 500. Bodies are always
//! `{"detail": "..."}`. Cancellations never surface as HTTP errors; they
//! are logged where they occur.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

use smartrecover_core::Error;

/// Wrapper that renders [`Error`] as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self.0 {
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Error::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Error::Upstream(msg) | Error::NotSupported(msg) => {
                warn!(detail = %msg, "Upstream failure surfaced to client");
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
            Error::Config(msg) => {
                error!(detail = %msg, "Configuration error surfaced to client");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            Error::Cancelled(msg) => {
                // The client is gone; the status is academic.
                warn!(detail = %msg, "Request cancelled");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            Error::Io(e) => {
                error!(error = %e, "I/O error surfaced to client");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            Error::Serialization(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Admin updates report configuration problems as client errors rather
/// than 500s.
pub fn admin_config_error(e: Error) -> ApiError {
    match e {
        Error::Config(msg) => ApiError(Error::invalid_input(msg)),
        other => ApiError(other),
    }
}
