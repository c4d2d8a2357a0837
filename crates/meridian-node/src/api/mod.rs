//! HTTP API handlers.

pub mod health;
pub mod intent;
pub mod link;

use axum::http::StatusCode;
use meridian_core::MeridianError;

/// Map a library error to an HTTP status and message.
pub fn error_response(err: MeridianError) -> (StatusCode, String) {
    let status = match &err {
        MeridianError::PathNotFound { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        MeridianError::IntentInvalid { .. } | MeridianError::SerializationError(_) => {
            StatusCode::BAD_REQUEST
        }
        MeridianError::HostNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}
