//! Maps [`RoofError`] onto HTTP status codes and a small JSON body for
//! the API layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use roof_errors::RoofError;
use serde::Serialize;

/// Thin wrapper so `axum` handlers can return `Result<T, ApiError>`
/// directly and get a JSON error body on the `Err` path.
#[derive(Debug)]
pub struct ApiError(pub RoofError);

impl From<RoofError> for ApiError {
    fn from(err: RoofError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            RoofError::NotInitialized => (StatusCode::CONFLICT, "not_initialized"),
            RoofError::AlreadyInitialized => (StatusCode::CONFLICT, "already_initialized"),
            RoofError::Disposed => (StatusCode::GONE, "disposed"),
            RoofError::PreconditionFailed(_) => (StatusCode::PRECONDITION_FAILED, "precondition_failed"),
            RoofError::Io(_) => (StatusCode::SERVICE_UNAVAILABLE, "io_error"),
            RoofError::Cancelled => (StatusCode::REQUEST_TIMEOUT, "cancelled"),
            RoofError::InvalidConfig(_) => (StatusCode::INTERNAL_SERVER_ERROR, "invalid_config"),
        };
        let body = ErrorBody {
            error: self.0.to_string(),
            code,
        };
        (status, Json(body)).into_response()
    }
}
