use super::{Document, DocumentStore, FieldUpdate, StoreError, Value, is_valid_document_id};
use crate::credentials::Credentials;
use crate::google_api::{as_base, error_details};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;

#[derive(Serialize)]
struct CommitRequest<'a> {
    writes: Vec<Write<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Write<'a> {
    update: DocumentPatch<'a>,
    update_mask: DocumentMask<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    update_transforms: Vec<FieldTransform<'a>>,
    current_document: Precondition,
}

#[derive(Serialize)]
struct DocumentPatch<'a> {
    name: &'a str,
    fields: &'a BTreeMap<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentMask<'a> {
    field_paths: Vec<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldTransform<'a> {
    field_path: &'a str,
    set_to_server_value: &'static str,
}

#[derive(Serialize)]
struct Precondition {
    exists: bool,
}

/// Firestore REST client (`v1`), also usable against the emulator.
#[derive(Clone)]
pub struct FirestoreClient {
    client: reqwest::Client,
    credentials: Credentials,
    // {base}/projects/{project}/databases/{database}/documents/
    documents_url: Url,
    // {base}/projects/{project}/databases/{database}/documents:commit
    commit_url: Url,
}

impl FirestoreClient {
    pub fn new(
        base_url: &Url,
        project_id: &str,
        database: &str,
        client: reqwest::Client,
        credentials: Credentials,
    ) -> Result<Self, StoreError> {
        let database_path = format!("projects/{project_id}/databases/{database}");
        let base = as_base(base_url);

        let documents_url = base
            .join(&format!("{database_path}/documents/"))
            .map_err(|e| StoreError::InvalidUrl(e.to_string()))?;
        let commit_url = base
            .join(&format!("{database_path}/documents:commit"))
            .map_err(|e| StoreError::InvalidUrl(e.to_string()))?;

        Ok(FirestoreClient {
            client,
            credentials,
            documents_url,
            commit_url,
        })
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        if !is_valid_document_id(id) {
            return Err(StoreError::InvalidDocumentId(id.to_owned()));
        }

        // One percent-encoded segment each, so `?`, `#` and `%` stay inside the id
        let mut url = self.documents_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl(self.documents_url.to_string()))?
            .pop_if_empty()
            .push(collection)
            .push(id);

        let request = self.credentials.authorize(self.client.get(url)).await?;
        let response = request.send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<Document>().await?)),
            _ => {
                let (status, message) = error_details(response).await;
                Err(StoreError::Rejected { status, message })
            }
        }
    }

    async fn update(&self, name: &str, update: &FieldUpdate) -> Result<(), StoreError> {
        let body = CommitRequest {
            writes: vec![Write {
                update: DocumentPatch {
                    name,
                    fields: &update.fields,
                },
                update_mask: DocumentMask {
                    field_paths: update.fields.keys().map(String::as_str).collect(),
                },
                update_transforms: update
                    .server_timestamps
                    .iter()
                    .map(|field_path| FieldTransform {
                        field_path: field_path.as_str(),
                        set_to_server_value: "REQUEST_TIME",
                    })
                    .collect(),
                current_document: Precondition { exists: true },
            }],
        };

        let request = self
            .credentials
            .authorize(self.client.post(self.commit_url.clone()).json(&body))
            .await?;
        let response = request.send().await?;

        if !response.status().is_success() {
            let (status, message) = error_details(response).await;
            return Err(StoreError::Rejected { status, message });
        }

        Ok(())
    }
}
