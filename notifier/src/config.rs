use crate::router::{DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_MAX_CONCURRENT_TEST_REQUESTS};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1/";
pub const DEFAULT_FCM_URL: &str = "https://fcm.googleapis.com/v1/";
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Project id cannot be empty")]
    EmptyProjectId,

    #[error("Collection name cannot be empty: {0}")]
    EmptyCollection(&'static str),

    #[error("Request timeout cannot be 0")]
    ZeroTimeout,

    #[error("Concurrency limit cannot be 0: {0}")]
    ZeroConcurrencyLimit(&'static str),

    #[error("Invalid {field}: {error}")]
    InvalidUrl {
        field: &'static str,
        error: url::ParseError,
    },
}

/// Relay configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for the trigger and test notification endpoints
    pub listener: Listener,
    /// Listener for the health and readiness probes
    pub admin_listener: Listener,
    /// Project owning the document store and the push gateway sender
    pub project_id: String,
    /// Timeout applied to every outbound request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// In-flight trigger requests before new ones are rejected with `503`
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Same, for `/testNotification`
    #[serde(default = "default_max_concurrent_test_requests")]
    pub max_concurrent_test_requests: usize,
    #[serde(default)]
    pub firestore: FirestoreConfig,
    #[serde(default)]
    pub fcm: FcmConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_concurrent_requests() -> usize {
    DEFAULT_MAX_CONCURRENT_REQUESTS
}

fn default_max_concurrent_test_requests() -> usize {
    DEFAULT_MAX_CONCURRENT_TEST_REQUESTS
}

impl Config {
    /// Validates the relay configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.project_id.is_empty() {
            return Err(ValidationError::EmptyProjectId);
        }

        if self.firestore.users_collection.is_empty() {
            return Err(ValidationError::EmptyCollection("users_collection"));
        }

        if self.firestore.requests_collection.is_empty() {
            return Err(ValidationError::EmptyCollection("requests_collection"));
        }

        if self.request_timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout);
        }

        if self.max_concurrent_requests == 0 {
            return Err(ValidationError::ZeroConcurrencyLimit("max_concurrent_requests"));
        }

        if self.max_concurrent_test_requests == 0 {
            return Err(ValidationError::ZeroConcurrencyLimit(
                "max_concurrent_test_requests",
            ));
        }

        parse_url("firestore.base_url", &self.firestore.base_url)?;
        parse_url("fcm.base_url", &self.fcm.base_url)?;

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    /// Validates the listener configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Parses a configured endpoint URL.
pub fn parse_url(field: &'static str, url: &str) -> Result<Url, ValidationError> {
    Url::parse(url).map_err(|error| ValidationError::InvalidUrl { field, error })
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct FirestoreConfig {
    /// REST endpoint, or the emulator's `http://host:port/v1/`
    pub base_url: String,
    pub database: String,
    /// Collection holding user records with their `fcmToken`
    pub users_collection: String,
    /// Collection whose created documents are relayed
    pub requests_collection: String,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        FirestoreConfig {
            base_url: DEFAULT_FIRESTORE_URL.into(),
            database: "(default)".into(),
            users_collection: "users".into(),
            requests_collection: "notification_requests".into(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct FcmConfig {
    pub base_url: String,
}

impl Default for FcmConfig {
    fn default() -> Self {
        FcmConfig {
            base_url: DEFAULT_FCM_URL.into(),
        }
    }
}

/// Where outbound bearer tokens come from.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub enum CredentialsConfig {
    /// No `Authorization` header, for local emulators
    None,
    Static {
        token: String,
    },
    /// Application Default Credentials: `GOOGLE_APPLICATION_CREDENTIALS`, the
    /// gcloud user credentials file, or the metadata server
    ApplicationDefault {
        #[serde(default = "default_scopes")]
        scopes: Vec<String>,
    },
}

fn default_scopes() -> Vec<String> {
    vec![CLOUD_PLATFORM_SCOPE.into()]
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        CredentialsConfig::ApplicationDefault {
            scopes: default_scopes(),
        }
    }
}
