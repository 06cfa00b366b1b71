//! Manually triggered test notifications.

use crate::chat_relay::{ANDROID_CHANNEL_ID, CLICK_ACTION};
use crate::fcm::{
    AndroidConfig, AndroidNotification, GatewayError, Message, Notification,
    NotificationPriority, PushGateway,
};
use crate::firestore::{DocumentStore, StoreError, is_valid_document_id};
use crate::recipient::{self, Recipient};
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const TEST_NOTIFICATION_TITLE: &str = "Test Notification";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestNotificationRequest {
    #[serde(default)]
    pub receiver_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestNotificationResponse {
    pub success: bool,
    pub message_id: String,
    pub message: &'static str,
}

impl TestNotificationResponse {
    pub fn sent(message_id: String) -> Self {
        TestNotificationResponse {
            success: true,
            message_id,
            message: "Test notification sent successfully",
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TestNotificationError {
    #[error("receiverId and message are required")]
    MissingFields,

    #[error("Invalid receiverId")]
    InvalidReceiverId,

    #[error("Receiver not found")]
    ReceiverNotFound,

    #[error("Receiver has no FCM token")]
    MissingToken,

    #[error("{}", .0.provider_message())]
    Store(#[from] StoreError),

    #[error("{}", .0.provider_message())]
    Gateway(#[from] GatewayError),
}

impl TestNotificationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            TestNotificationError::MissingFields
            | TestNotificationError::InvalidReceiverId
            | TestNotificationError::MissingToken => StatusCode::BAD_REQUEST,
            TestNotificationError::ReceiverNotFound => StatusCode::NOT_FOUND,
            TestNotificationError::Store(_) | TestNotificationError::Gateway(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// The simplified message sent by the test endpoint. It carries no APNs block.
pub fn test_message(token: String, message: &str) -> Message {
    Message {
        token,
        notification: Some(Notification {
            title: TEST_NOTIFICATION_TITLE.to_string(),
            body: message.to_string(),
        }),
        data: BTreeMap::from([
            ("type".to_string(), "test".to_string()),
            ("message".to_string(), message.to_string()),
            ("click_action".to_string(), CLICK_ACTION.to_string()),
        ]),
        android: Some(AndroidConfig {
            notification: AndroidNotification {
                channel_id: Some(ANDROID_CHANNEL_ID.to_string()),
                notification_priority: Some(NotificationPriority::PriorityHigh),
                ..Default::default()
            },
        }),
        apns: None,
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

pub struct TestNotifier {
    store: Arc<dyn DocumentStore>,
    gateway: Arc<dyn PushGateway>,
    users_collection: String,
}

impl TestNotifier {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        gateway: Arc<dyn PushGateway>,
        users_collection: impl Into<String>,
    ) -> Self {
        TestNotifier {
            store,
            gateway,
            users_collection: users_collection.into(),
        }
    }

    /// Sends a test notification to the receiver and returns the provider message id.
    pub async fn send(
        &self,
        request: &TestNotificationRequest,
    ) -> Result<String, TestNotificationError> {
        let (Some(receiver_id), Some(message)) =
            (non_empty(&request.receiver_id), non_empty(&request.message))
        else {
            return Err(TestNotificationError::MissingFields);
        };
        if !is_valid_document_id(receiver_id) {
            return Err(TestNotificationError::InvalidReceiverId);
        }

        let token =
            match recipient::lookup(self.store.as_ref(), &self.users_collection, receiver_id)
                .await?
            {
                Recipient::Token(token) => token,
                Recipient::NotFound => return Err(TestNotificationError::ReceiverNotFound),
                Recipient::NoToken => return Err(TestNotificationError::MissingToken),
            };

        let message_id = self.gateway.send(&test_message(token, message)).await?;
        tracing::info!(receiver_id, message_id = %message_id, "Sent test notification");

        Ok(message_id)
    }
}
