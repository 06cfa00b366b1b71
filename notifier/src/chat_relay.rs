//! Relays newly created chat notification requests to the push gateway.
//!
//! Each request document is handled once: it is either skipped (wrong type,
//! unknown receiver, no delivery token) without any write, or it ends with a
//! `status` of `sent` or `error` written back onto the document.

use crate::errors::{RelayError, Result};
use crate::fcm::{
    AndroidConfig, AndroidNotification, ApnsConfig, ApnsPayload, Aps, Message, Notification,
    NotificationPriority, PushGateway,
};
use crate::firestore::{Document, DocumentStore, FieldUpdate, is_valid_document_id};
use crate::metrics_defs::{NOTIFICATIONS_FAILED, NOTIFICATIONS_SENT, NOTIFICATIONS_SKIPPED};
use crate::recipient::{self, Recipient};
use shared::counter;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const CHAT_MESSAGE_TYPE: &str = "chat_message";
pub const CLICK_ACTION: &str = "FLUTTER_NOTIFICATION_CLICK";
pub const ANDROID_CHANNEL_ID: &str = "chat_notifications";

/// The fields of a notification request document the relay reads.
#[derive(Debug, Default, PartialEq)]
pub struct NotificationRequest<'a> {
    pub kind: Option<&'a str>,
    pub receiver_id: Option<&'a str>,
    pub sender_id: Option<&'a str>,
    pub sender_name: Option<&'a str>,
    pub message: Option<&'a str>,
    pub chat_room_id: Option<&'a str>,
}

impl<'a> NotificationRequest<'a> {
    pub fn from_document(document: &'a Document) -> Self {
        NotificationRequest {
            kind: document.string_field("type"),
            receiver_id: document.string_field("receiverId"),
            sender_id: document.string_field("senderId"),
            sender_name: document.string_field("senderName"),
            message: document.string_field("message"),
            chat_room_id: document.string_field("chatRoomId"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    NotChatMessage,
    ReceiverNotFound,
    MissingToken,
}

impl SkipReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NotChatMessage => "not_chat_message",
            SkipReason::ReceiverNotFound => "receiver_not_found",
            SkipReason::MissingToken => "missing_token",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    Sent { message_id: String },
    Skipped(SkipReason),
}

/// Builds the push message for a chat notification request.
///
/// Every data value must be a string, so a request missing any of the sender
/// or room fields cannot be sent.
pub fn chat_message(token: String, request: &NotificationRequest<'_>) -> Result<Message> {
    let required = |value: Option<&str>, field: &str| {
        value
            .map(str::to_owned)
            .ok_or_else(|| RelayError::InvalidRequest(format!("missing {field}")))
    };

    let sender_id = required(request.sender_id, "senderId")?;
    let sender_name = required(request.sender_name, "senderName")?;
    let chat_room_id = required(request.chat_room_id, "chatRoomId")?;
    let message = required(request.message, "message")?;

    let data = BTreeMap::from([
        ("type".to_string(), CHAT_MESSAGE_TYPE.to_string()),
        ("senderId".to_string(), sender_id),
        ("senderName".to_string(), sender_name.clone()),
        ("chatRoomId".to_string(), chat_room_id),
        ("message".to_string(), message.clone()),
        ("click_action".to_string(), CLICK_ACTION.to_string()),
    ]);

    Ok(Message {
        token,
        notification: Some(Notification {
            title: sender_name,
            body: message,
        }),
        data,
        android: Some(AndroidConfig {
            notification: AndroidNotification {
                channel_id: Some(ANDROID_CHANNEL_ID.to_string()),
                notification_priority: Some(NotificationPriority::PriorityHigh),
                default_sound: Some(true),
                default_vibrate_timings: Some(true),
            },
        }),
        apns: Some(ApnsConfig {
            payload: ApnsPayload {
                aps: Aps {
                    sound: Some("default".to_string()),
                    badge: Some(1),
                },
            },
        }),
    })
}

pub struct ChatRelay {
    store: Arc<dyn DocumentStore>,
    gateway: Arc<dyn PushGateway>,
    users_collection: String,
}

impl ChatRelay {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        gateway: Arc<dyn PushGateway>,
        users_collection: impl Into<String>,
    ) -> Self {
        ChatRelay {
            store,
            gateway,
            users_collection: users_collection.into(),
        }
    }

    /// Handles one newly created notification request document.
    ///
    /// Failures are recorded on the document as `status: error` and then
    /// returned, so the caller can report them to the invoking platform.
    pub async fn handle_created(&self, document: &Document) -> Result<RelayOutcome> {
        match self.relay(document).await {
            Ok(outcome) => {
                match &outcome {
                    RelayOutcome::Sent { .. } => counter!(NOTIFICATIONS_SENT).increment(1),
                    RelayOutcome::Skipped(reason) => {
                        counter!(NOTIFICATIONS_SKIPPED, "reason" => reason.as_str()).increment(1)
                    }
                }
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(
                    request_id = document.document_id().unwrap_or_default(),
                    error = %e,
                    "Error sending notification"
                );
                counter!(NOTIFICATIONS_FAILED).increment(1);
                self.record_failure(document, &e).await;
                Err(e)
            }
        }
    }

    async fn relay(&self, document: &Document) -> Result<RelayOutcome> {
        let request = NotificationRequest::from_document(document);

        if request.kind != Some(CHAT_MESSAGE_TYPE) {
            tracing::info!(document = %document.name, "Not a chat message notification, skipping");
            return Ok(RelayOutcome::Skipped(SkipReason::NotChatMessage));
        }

        let receiver_id = request
            .receiver_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RelayError::InvalidRequest("missing receiverId".into()))?;
        if !is_valid_document_id(receiver_id) {
            return Err(RelayError::InvalidRequest(format!(
                "invalid receiverId {receiver_id:?}"
            )));
        }

        tracing::info!(
            "Sending notification to {receiver_id} from {}",
            request.sender_name.unwrap_or_default()
        );

        let token =
            match recipient::lookup(self.store.as_ref(), &self.users_collection, receiver_id)
                .await?
            {
                Recipient::Token(token) => token,
                Recipient::NotFound => {
                    tracing::info!("Receiver {receiver_id} not found");
                    return Ok(RelayOutcome::Skipped(SkipReason::ReceiverNotFound));
                }
                Recipient::NoToken => {
                    tracing::info!("No FCM token found for receiver {receiver_id}");
                    return Ok(RelayOutcome::Skipped(SkipReason::MissingToken));
                }
            };

        let message = chat_message(token, &request)?;
        let message_id = self.gateway.send(&message).await?;
        tracing::info!(message_id = %message_id, "Successfully sent notification");

        let update = FieldUpdate::new()
            .set("status", "sent")
            .server_timestamp("sentAt")
            .set("fcmResponse", message_id.as_str());
        self.store.update(&document.name, &update).await?;

        Ok(RelayOutcome::Sent { message_id })
    }

    async fn record_failure(&self, document: &Document, error: &RelayError) {
        let update = FieldUpdate::new()
            .set("status", "error")
            .set("error", error.record_text())
            .server_timestamp("errorAt");

        if let Err(e) = self.store.update(&document.name, &update).await {
            tracing::error!(
                document = %document.name,
                error = %e,
                "Failed to record error status on notification request"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipient::FCM_TOKEN_FIELD;
    use crate::testutils::{InMemoryStore, RecordingGateway, string_document};

    const REQUEST_NAME: &str =
        "projects/chat-app/databases/(default)/documents/notification_requests/req1";

    fn chat_request() -> Document {
        string_document(
            REQUEST_NAME,
            &[
                ("type", "chat_message"),
                ("receiverId", "bob"),
                ("senderId", "alice"),
                ("senderName", "Alice"),
                ("message", "hello"),
                ("chatRoomId", "room-1"),
            ],
        )
    }

    fn store_with_bob(token: &str) -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::new().with_document(
            "users/bob",
            &[(FCM_TOKEN_FIELD, token.into())],
        ))
    }

    fn relay(store: &Arc<InMemoryStore>, gateway: &Arc<RecordingGateway>) -> ChatRelay {
        ChatRelay::new(store.clone(), gateway.clone(), "users")
    }

    #[tokio::test]
    async fn test_other_types_are_skipped() {
        let store = store_with_bob("tok");
        let gateway = Arc::new(RecordingGateway::new());

        let mut document = chat_request();
        document.fields.insert("type".into(), "friend_request".into());

        let outcome = relay(&store, &gateway).handle_created(&document).await.unwrap();
        assert_eq!(outcome, RelayOutcome::Skipped(SkipReason::NotChatMessage));
        assert!(gateway.sent().is_empty());
        assert!(store.updates().is_empty());

        document.fields.remove("type");
        let outcome = relay(&store, &gateway).handle_created(&document).await.unwrap();
        assert_eq!(outcome, RelayOutcome::Skipped(SkipReason::NotChatMessage));
        assert!(gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn test_receiver_without_token_is_skipped() {
        let store = Arc::new(InMemoryStore::new().with_document("users/bob", &[]));
        let gateway = Arc::new(RecordingGateway::new());

        let outcome = relay(&store, &gateway)
            .handle_created(&chat_request())
            .await
            .unwrap();
        assert_eq!(outcome, RelayOutcome::Skipped(SkipReason::MissingToken));
        assert!(gateway.sent().is_empty());
        assert!(store.updates().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_receiver_is_skipped() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());

        let outcome = relay(&store, &gateway)
            .handle_created(&chat_request())
            .await
            .unwrap();
        assert_eq!(outcome, RelayOutcome::Skipped(SkipReason::ReceiverNotFound));
        assert!(gateway.sent().is_empty());
        assert!(store.updates().is_empty());
    }

    #[tokio::test]
    async fn test_valid_request_is_sent_and_marked() {
        let store = store_with_bob("bob-device");
        let gateway = Arc::new(RecordingGateway::new());

        let outcome = relay(&store, &gateway)
            .handle_created(&chat_request())
            .await
            .unwrap();
        let message_id = match outcome {
            RelayOutcome::Sent { message_id } => message_id,
            other => panic!("expected the request to be sent, got {other:?}"),
        };

        let sent = gateway.sent();
        assert_eq!(sent.len(), 1);
        let message = &sent[0];
        assert_eq!(message.token, "bob-device");
        assert_eq!(
            message.notification,
            Some(Notification {
                title: "Alice".into(),
                body: "hello".into()
            })
        );
        assert_eq!(message.data["senderId"], "alice");
        assert_eq!(message.data["senderName"], "Alice");
        assert_eq!(message.data["chatRoomId"], "room-1");
        assert_eq!(message.data["message"], "hello");
        assert_eq!(message.data["type"], CHAT_MESSAGE_TYPE);
        assert_eq!(message.data["click_action"], CLICK_ACTION);
        assert_eq!(message.data.len(), 6);

        let updates = store.updates();
        assert_eq!(updates.len(), 1);
        let (name, update) = &updates[0];
        assert_eq!(name, REQUEST_NAME);
        assert_eq!(update.string_field("status"), Some("sent"));
        assert_eq!(update.string_field("fcmResponse"), Some(message_id.as_str()));
        assert_eq!(update.server_timestamps, vec!["sentAt".to_string()]);
    }

    #[tokio::test]
    async fn test_send_failure_is_recorded_and_returned() {
        let store = store_with_bob("stale-token");
        let gateway = Arc::new(RecordingGateway::failing("Requested entity was not found."));

        let err = relay(&store, &gateway)
            .handle_created(&chat_request())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Gateway(_)));

        let updates = store.updates();
        assert_eq!(updates.len(), 1);
        let (name, update) = &updates[0];
        assert_eq!(name, REQUEST_NAME);
        assert_eq!(update.string_field("status"), Some("error"));
        assert_eq!(
            update.string_field("error"),
            Some("Requested entity was not found.")
        );
        assert_eq!(update.server_timestamps, vec!["errorAt".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_sender_fields_fail() {
        let store = store_with_bob("tok");
        let gateway = Arc::new(RecordingGateway::new());

        let mut document = chat_request();
        document.fields.remove("chatRoomId");

        let err = relay(&store, &gateway)
            .handle_created(&document)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidRequest(_)));
        assert!(gateway.sent().is_empty());

        let updates = store.updates();
        assert_eq!(updates[0].1.string_field("status"), Some("error"));
        assert_eq!(
            updates[0].1.string_field("error"),
            Some("Invalid notification request: missing chatRoomId")
        );
    }

    #[tokio::test]
    async fn test_missing_receiver_is_recorded_as_error() {
        let store = store_with_bob("tok");
        let gateway = Arc::new(RecordingGateway::new());

        for receiver_id in [None, Some("")] {
            let mut document = chat_request();
            match receiver_id {
                Some(id) => document.fields.insert("receiverId".into(), id.into()),
                None => document.fields.remove("receiverId"),
            };

            let err = relay(&store, &gateway)
                .handle_created(&document)
                .await
                .unwrap_err();
            assert!(matches!(err, RelayError::InvalidRequest(_)));
        }

        assert!(gateway.sent().is_empty());
        let updates = store.updates();
        assert_eq!(updates.len(), 2);
        for (name, update) in &updates {
            assert_eq!(name, REQUEST_NAME);
            assert_eq!(update.string_field("status"), Some("error"));
            assert_eq!(
                update.string_field("error"),
                Some("Invalid notification request: missing receiverId")
            );
            assert_eq!(update.server_timestamps, vec!["errorAt".to_string()]);
        }
    }

    #[tokio::test]
    async fn test_receiver_id_cannot_leave_users_collection() {
        let store = Arc::new(
            InMemoryStore::new()
                .with_document("users/bob", &[(FCM_TOKEN_FIELD, "bob-device".into())])
                .with_document(
                    "notification_requests/req1",
                    &[(FCM_TOKEN_FIELD, "other-device".into())],
                ),
        );
        let gateway = Arc::new(RecordingGateway::new());

        let mut document = chat_request();
        document
            .fields
            .insert("receiverId".into(), "../notification_requests/req1".into());

        let err = relay(&store, &gateway)
            .handle_created(&document)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidRequest(_)));
        assert!(gateway.sent().is_empty());
        assert_eq!(store.updates()[0].1.string_field("status"), Some("error"));

        // `#` is kept inside the id instead of truncating it to `bob`
        document.fields.insert("receiverId".into(), "bob#x".into());
        let outcome = relay(&store, &gateway)
            .handle_created(&document)
            .await
            .unwrap();
        assert_eq!(outcome, RelayOutcome::Skipped(SkipReason::ReceiverNotFound));
        assert!(gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failed_status_write_still_returns_error() {
        let store = Arc::new(
            InMemoryStore::new()
                .with_document("users/bob", &[(FCM_TOKEN_FIELD, "tok".into())])
                .failing_updates(),
        );
        let gateway = Arc::new(RecordingGateway::new());

        // the sent write fails, then the error write fails too
        let err = relay(&store, &gateway)
            .handle_created(&chat_request())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Store(_)));
        assert_eq!(gateway.sent().len(), 1);
    }

    #[test]
    fn test_chat_message_shape() {
        let document = chat_request();
        let request = NotificationRequest::from_document(&document);
        let message = chat_message("tok".into(), &request).unwrap();

        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            serde_json::json!({
                "token": "tok",
                "notification": {"title": "Alice", "body": "hello"},
                "data": {
                    "type": "chat_message",
                    "senderId": "alice",
                    "senderName": "Alice",
                    "chatRoomId": "room-1",
                    "message": "hello",
                    "click_action": "FLUTTER_NOTIFICATION_CLICK"
                },
                "android": {
                    "notification": {
                        "channelId": "chat_notifications",
                        "notificationPriority": "PRIORITY_HIGH",
                        "defaultSound": true,
                        "defaultVibrateTimings": true
                    }
                },
                "apns": {"payload": {"aps": {"sound": "default", "badge": 1}}}
            })
        );
    }
}
