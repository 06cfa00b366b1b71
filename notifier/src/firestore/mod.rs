//! Document store access: the `DocumentStore` seam and its Firestore REST implementation.

mod client;
mod document;

pub use client::FirestoreClient;
pub use document::{ArrayValue, Document, DocumentEvent, FieldUpdate, LatLng, MapValue, Value};
pub(crate) use document::relative_path;

use crate::credentials::AuthError;
use async_trait::async_trait;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("document store returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("credentials error: {0}")]
    Auth(#[from] AuthError),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid document id: {0:?}")]
    InvalidDocumentId(String),
}

impl StoreError {
    /// The store's own error text when it rejected the call, otherwise the full description.
    pub fn provider_message(&self) -> String {
        match self {
            StoreError::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Whether `id` names a single document directly under a collection.
///
/// Ids are path segments, so they cannot be empty, contain `/`, or be `.`/`..`.
pub fn is_valid_document_id(id: &str) -> bool {
    !id.is_empty() && !id.contains('/') && id != "." && id != ".."
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads `collection/id`. A document that does not exist is `Ok(None)`.
    /// An id failing [`is_valid_document_id`] is `StoreError::InvalidDocumentId`.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Applies `update` to the existing document with full resource `name`.
    async fn update(&self, name: &str, update: &FieldUpdate) -> Result<(), StoreError>;
}
