//! Push delivery: the `PushGateway` seam and its FCM HTTP v1 implementation.

mod client;
mod message;

pub use client::FcmClient;
pub use message::{
    AndroidConfig, AndroidNotification, ApnsConfig, ApnsPayload, Aps, Message, Notification,
    NotificationPriority,
};

use crate::credentials::AuthError;
use async_trait::async_trait;

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("push gateway returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("credentials error: {0}")]
    Auth(#[from] AuthError),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("push gateway response carried no message id")]
    MissingMessageId,
}

impl GatewayError {
    /// The gateway's own error text when it rejected the message, otherwise the full description.
    pub fn provider_message(&self) -> String {
        match self {
            GatewayError::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Sends `message` and returns the provider's message identifier.
    async fn send(&self, message: &Message) -> Result<String, GatewayError>;
}
