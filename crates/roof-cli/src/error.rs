//! Error types for roofctl.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("roofd is unreachable at {0}: {1}")]
    ServiceUnavailable(String, String),

    #[error("roofd rejected the request ({code}): {message}")]
    ApiError { code: String, message: String },

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
