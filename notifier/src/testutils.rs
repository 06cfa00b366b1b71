use crate::fcm::{GatewayError, Message, PushGateway};
use crate::firestore::{
    Document, DocumentStore, FieldUpdate, StoreError, Value, is_valid_document_id, relative_path,
};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub fn string_document(name: &str, fields: &[(&str, &str)]) -> Document {
    Document {
        name: name.to_string(),
        fields: fields
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect(),
        ..Default::default()
    }
}

/// Document store keyed by relative path (`users/bob`) that records every update.
#[derive(Default)]
pub struct InMemoryStore {
    documents: Mutex<BTreeMap<String, Document>>,
    updates: Mutex<Vec<(String, FieldUpdate)>>,
    fail_reads: bool,
    fail_updates: bool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, path: &str, fields: &[(&str, Value)]) -> Self {
        let document = Document {
            name: format!("projects/test/databases/(default)/documents/{path}"),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            ..Default::default()
        };
        self.documents.lock().unwrap().insert(path.to_string(), document);
        self
    }

    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    /// Updates applied so far, as `(document name, update)`.
    pub fn updates(&self) -> Vec<(String, FieldUpdate)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        if !is_valid_document_id(id) {
            return Err(StoreError::InvalidDocumentId(id.to_owned()));
        }
        if self.fail_reads {
            return Err(StoreError::Rejected {
                status: 503,
                message: "The service is currently unavailable.".into(),
            });
        }
        Ok(self
            .documents
            .lock()
            .unwrap()
            .get(&format!("{collection}/{id}"))
            .cloned())
    }

    async fn update(&self, name: &str, update: &FieldUpdate) -> Result<(), StoreError> {
        if self.fail_updates {
            return Err(StoreError::Rejected {
                status: 503,
                message: "The service is currently unavailable.".into(),
            });
        }
        if let Some(document) = self.documents.lock().unwrap().get_mut(relative_path(name)) {
            document.fields.extend(update.fields.clone());
        }
        self.updates
            .lock()
            .unwrap()
            .push((name.to_string(), update.clone()));
        Ok(())
    }
}

/// Push gateway that records messages and either succeeds or rejects every send.
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<Message>>,
    failure: Option<String>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        RecordingGateway {
            sent: Mutex::new(Vec::new()),
            failure: Some(message.to_string()),
        }
    }

    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushGateway for RecordingGateway {
    async fn send(&self, message: &Message) -> Result<String, GatewayError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());

        match &self.failure {
            Some(failure) => Err(GatewayError::Rejected {
                status: 400,
                message: failure.clone(),
            }),
            None => Ok(format!("projects/test/messages/{}", sent.len())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

pub struct MockResponse {
    status: u16,
    body: String,
}

impl MockResponse {
    pub fn json(status: u16, body: &str) -> Self {
        MockResponse {
            status,
            body: body.to_string(),
        }
    }
}

/// Local HTTP server that replies with queued responses in order and records each request.
pub struct MockServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(responses: Vec<MockResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to address");
        let addr = listener.local_addr().unwrap();

        let requests = Arc::new(Mutex::new(Vec::new()));
        let responses = Arc::new(Mutex::new(VecDeque::from(responses)));

        let recorded = requests.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let io = TokioIo::new(stream);
                let recorded = recorded.clone();
                let responses = responses.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let recorded = recorded.clone();
                        let responses = responses.clone();
                        async move {
                            let (parts, body) = req.into_parts();
                            let body = body
                                .collect()
                                .await
                                .map(|collected| collected.to_bytes())
                                .unwrap_or_else(|_| Bytes::new());

                            recorded.lock().unwrap().push(RecordedRequest {
                                method: parts.method.to_string(),
                                path: parts.uri.path().to_string(),
                                headers: parts
                                    .headers
                                    .iter()
                                    .map(|(k, v)| {
                                        (k.to_string(), v.to_str().unwrap_or_default().to_string())
                                    })
                                    .collect(),
                                body,
                            });

                            let next = responses.lock().unwrap().pop_front().unwrap_or_else(|| {
                                MockResponse::json(
                                    500,
                                    r#"{"error": {"message": "no mock response queued"}}"#,
                                )
                            });

                            let response = Response::builder()
                                .status(next.status)
                                .header("content-type", "application/json")
                                .body(Full::new(Bytes::from(next.body)))
                                .unwrap();
                            Ok::<_, Infallible>(response)
                        }
                    });

                    if let Err(err) = Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await
                    {
                        eprintln!("Error serving connection: {:?}", err);
                    }
                });
            }
        });

        MockServer {
            addr,
            requests,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
