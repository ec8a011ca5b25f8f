//! Error types for tile addressing and wire envelopes.

use thiserror::Error;

/// Result type alias using ProtocolError.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while building requests or reading responses.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid parameter value for '{field}': {message}")]
    InvalidParameter { field: String, message: String },

    #[error("Non-finite number in parameter '{0}'")]
    NonFinite(String),

    #[error("Tile request is missing its coordinate")]
    MissingCoordinate,

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    pub fn invalid_parameter(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field: field.into(),
            message: message.into(),
        }
    }
}
