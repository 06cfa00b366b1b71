use thiserror::Error;

use crate::config::ValidationError;
use crate::credentials::AuthError;
use crate::fcm::GatewayError;
use crate::firestore::StoreError;

/// Result type alias for relay operations
pub type Result<T, E = RelayError> = std::result::Result<T, E>;

/// Errors that can occur while relaying a notification request
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Failed to read request body: {0}")]
    RequestBody(String),

    #[error("Invalid notification request: {0}")]
    InvalidRequest(String),

    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    #[error("Push gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Configuration error: {0}")]
    Config(#[from] ValidationError),

    #[error("Credentials error: {0}")]
    Auth(#[from] AuthError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// The text written into the `error` field of a failed notification request.
    ///
    /// Upstream rejections record the provider's own message rather than the
    /// wrapped description.
    pub fn record_text(&self) -> String {
        match self {
            RelayError::Gateway(e) => e.provider_message(),
            RelayError::Store(e) => e.provider_message(),
            other => other.to_string(),
        }
    }
}
