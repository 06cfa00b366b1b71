use crate::chat_relay::{ChatRelay, RelayOutcome};
use crate::errors::RelayError;
use crate::firestore::DocumentEvent;
use crate::http::{
    HandlerBody, add_cors_headers, empty_response, error_response, json_response, read_body,
};
use crate::metrics_defs::REQUEST_DURATION;
use crate::test_notification::{TestNotificationRequest, TestNotificationResponse, TestNotifier};
use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use shared::histogram;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Path the hosting platform posts document-created events to.
pub const TRIGGER_PATH: &str = "/events/notification-requests";
pub const TEST_NOTIFICATION_PATH: &str = "/testNotification";

#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum TriggerResponse<'a> {
    #[serde(rename_all = "camelCase")]
    Sent { message_id: &'a str },
    Skipped { reason: &'static str },
    Ignored,
}

pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 10;
pub const DEFAULT_MAX_CONCURRENT_TEST_REQUESTS: usize = 5;

/// Dispatches relay requests by path to the trigger and test handlers.
///
/// Each endpoint holds a fixed number of permits. A request arriving while all
/// of them are taken is answered with `503` instead of queueing.
#[derive(Clone)]
pub struct Router {
    chat_relay: Arc<ChatRelay>,
    test_notifier: Arc<TestNotifier>,
    requests_collection: Arc<str>,
    trigger_permits: Arc<Semaphore>,
    test_permits: Arc<Semaphore>,
}

impl Router {
    pub fn new(
        chat_relay: Arc<ChatRelay>,
        test_notifier: Arc<TestNotifier>,
        requests_collection: &str,
    ) -> Self {
        Self {
            chat_relay,
            test_notifier,
            requests_collection: requests_collection.into(),
            trigger_permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_REQUESTS)),
            test_permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_TEST_REQUESTS)),
        }
    }

    /// Caps in-flight requests on the trigger and test endpoints.
    pub fn with_concurrency_limits(mut self, trigger: usize, test: usize) -> Self {
        self.trigger_permits = Arc::new(Semaphore::new(trigger));
        self.test_permits = Arc::new(Semaphore::new(test));
        self
    }

    pub async fn route<B>(&self, req: Request<B>) -> Result<Response<HandlerBody>, RelayError>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: std::fmt::Display,
    {
        let start = Instant::now();

        let path = req.uri().path().to_owned();

        let (handler, result) = match path.as_str() {
            TRIGGER_PATH => ("trigger", self.handle_trigger(req).await),
            TEST_NOTIFICATION_PATH => ("test_notification", self.handle_test_notification(req).await),
            path => {
                tracing::warn!(method = %req.method(), path, "No route matched");
                ("none", Ok(error_response(StatusCode::NOT_FOUND, "Not found")))
            }
        };

        let status = match &result {
            Ok(response) => response.status().as_u16().to_string(),
            Err(_) => "error".to_string(),
        };
        histogram!(REQUEST_DURATION, "handler" => handler, "status" => status)
            .record(start.elapsed().as_secs_f64());

        result
    }

    /// Handles a document-created event for a notification request.
    async fn handle_trigger<B>(&self, req: Request<B>) -> Result<Response<HandlerBody>, RelayError>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        if req.method() != Method::POST {
            return Ok(error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"));
        }

        let Some(_permit) = acquire(&self.trigger_permits, "trigger") else {
            return Ok(overloaded_response());
        };

        let body = read_body(req.into_body()).await?;
        let event: DocumentEvent = match serde_json::from_slice(&body) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed document event");
                return Ok(error_response(
                    StatusCode::BAD_REQUEST,
                    &format!("invalid document event: {e}"),
                ));
            }
        };
        let document = event.value;

        if document.collection_id() != Some(&*self.requests_collection) {
            tracing::warn!(document = %document.name, "Event is not for a notification request, ignoring");
            return json_response(StatusCode::OK, &TriggerResponse::Ignored);
        }
        tracing::debug!(
            request_id = document.document_id().unwrap_or_default(),
            "Notification request created"
        );

        match self.chat_relay.handle_created(&document).await {
            Ok(RelayOutcome::Sent { message_id }) => json_response(
                StatusCode::OK,
                &TriggerResponse::Sent {
                    message_id: &message_id,
                },
            ),
            Ok(RelayOutcome::Skipped(reason)) => json_response(
                StatusCode::OK,
                &TriggerResponse::Skipped {
                    reason: reason.as_str(),
                },
            ),
            // Non-2xx hands the failure back to the platform's retry policy
            Err(e) => Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &e.to_string(),
            )),
        }
    }

    async fn handle_test_notification<B>(
        &self,
        req: Request<B>,
    ) -> Result<Response<HandlerBody>, RelayError>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let mut response = match self.test_notification_response(req).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "Error handling test notification request");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
            }
        };
        add_cors_headers(response.headers_mut());
        Ok(response)
    }

    async fn test_notification_response<B>(
        &self,
        req: Request<B>,
    ) -> Result<Response<HandlerBody>, RelayError>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        if req.method() == Method::OPTIONS {
            return Ok(empty_response(StatusCode::NO_CONTENT));
        }
        if req.method() != Method::GET && req.method() != Method::POST {
            return Ok(error_response(
                StatusCode::METHOD_NOT_ALLOWED,
                "Method not allowed",
            ));
        }

        let Some(_permit) = acquire(&self.test_permits, "test_notification") else {
            return Ok(overloaded_response());
        };

        let body = read_body(req.into_body()).await?;
        let request = if body.iter().all(u8::is_ascii_whitespace) {
            TestNotificationRequest::default()
        } else {
            match serde_json::from_slice::<TestNotificationRequest>(&body) {
                Ok(request) => request,
                Err(e) => {
                    return Ok(error_response(
                        StatusCode::BAD_REQUEST,
                        &format!("invalid JSON body: {e}"),
                    ));
                }
            }
        };

        match self.test_notifier.send(&request).await {
            Ok(message_id) => json_response(
                StatusCode::OK,
                &TestNotificationResponse::sent(message_id),
            ),
            Err(e) => {
                if e.status_code().is_server_error() {
                    tracing::error!(error = %e, "Error sending test notification");
                }
                Ok(error_response(e.status_code(), &e.to_string()))
            }
        }
    }
}

fn acquire(permits: &Arc<Semaphore>, handler: &'static str) -> Option<OwnedSemaphorePermit> {
    let permit = permits.clone().try_acquire_owned().ok();
    if permit.is_none() {
        tracing::warn!(handler, "Concurrency limit reached, rejecting request");
    }
    permit
}

fn overloaded_response() -> Response<HandlerBody> {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "Too many concurrent requests",
    )
}
