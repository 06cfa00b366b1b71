pub mod chat_relay;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod fcm;
pub mod firestore;
mod google_api;
pub mod http;
pub mod metrics_defs;
pub mod recipient;
pub mod router;
pub mod service;
pub mod test_notification;
#[cfg(test)]
mod testutils;

use crate::chat_relay::ChatRelay;
use crate::config::{Config, parse_url};
use crate::credentials::Credentials;
use crate::errors::RelayError;
use crate::fcm::FcmClient;
use crate::firestore::FirestoreClient;
use crate::router::Router;
use crate::service::RelayService;
use crate::test_notification::TestNotifier;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;
use std::time::Duration;

/// The relay's handlers wired to the live document store and push gateway.
pub struct Relay {
    pub chat_relay: Arc<ChatRelay>,
    pub test_notifier: Arc<TestNotifier>,
    requests_collection: String,
    max_concurrent_requests: usize,
    max_concurrent_test_requests: usize,
}

impl Relay {
    pub fn from_config(config: &Config) -> Result<Self, RelayError> {
        let firestore_url = parse_url("firestore.base_url", &config.firestore.base_url)?;
        let fcm_url = parse_url("fcm.base_url", &config.fcm.base_url)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RelayError::Internal(format!("failed to build HTTP client: {e}")))?;

        let credentials = Credentials::new(&config.credentials)?;

        let store = Arc::new(FirestoreClient::new(
            &firestore_url,
            &config.project_id,
            &config.firestore.database,
            client.clone(),
            credentials.clone(),
        )?);
        let gateway = Arc::new(FcmClient::new(
            &fcm_url,
            &config.project_id,
            client,
            credentials,
        )?);

        let users_collection = &config.firestore.users_collection;
        Ok(Relay {
            chat_relay: Arc::new(ChatRelay::new(
                store.clone(),
                gateway.clone(),
                users_collection.as_str(),
            )),
            test_notifier: Arc::new(TestNotifier::new(
                store,
                gateway,
                users_collection.as_str(),
            )),
            requests_collection: config.firestore.requests_collection.clone(),
            max_concurrent_requests: config.max_concurrent_requests,
            max_concurrent_test_requests: config.max_concurrent_test_requests,
        })
    }

    pub fn router(&self) -> Router {
        Router::new(
            self.chat_relay.clone(),
            self.test_notifier.clone(),
            &self.requests_collection,
        )
        .with_concurrency_limits(
            self.max_concurrent_requests,
            self.max_concurrent_test_requests,
        )
    }
}

/// Serves the relay and admin listeners until either fails.
pub async fn run(config: Config) -> Result<(), RelayError> {
    let relay = Relay::from_config(&config)?;
    tracing::info!(
        project_id = %config.project_id,
        requests_collection = %config.firestore.requests_collection,
        "Starting notification relay"
    );

    let relay_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        RelayService::new(relay.router()),
    );
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::<_, RelayError>::new(|| true),
    );

    tokio::try_join!(relay_task, admin_task)?;
    Ok(())
}
