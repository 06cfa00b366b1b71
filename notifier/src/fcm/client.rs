use super::{GatewayError, Message, PushGateway};
use crate::credentials::Credentials;
use crate::google_api::{as_base, error_details};
use crate::metrics_defs::GATEWAY_SEND_DURATION;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::histogram;
use std::time::Instant;
use url::Url;

#[derive(Serialize)]
struct SendRequest<'a> {
    message: &'a Message,
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Clone)]
pub struct FcmClient {
    client: reqwest::Client,
    credentials: Credentials,
    send_url: Url,
}

impl FcmClient {
    pub fn new(
        base_url: &Url,
        project_id: &str,
        client: reqwest::Client,
        credentials: Credentials,
    ) -> Result<Self, GatewayError> {
        let send_url = as_base(base_url)
            .join(&format!("projects/{project_id}/messages:send"))
            .map_err(|e| GatewayError::InvalidUrl(e.to_string()))?;

        Ok(FcmClient {
            client,
            credentials,
            send_url,
        })
    }

    async fn post(&self, message: &Message) -> Result<String, GatewayError> {
        let request = self
            .credentials
            .authorize(
                self.client
                    .post(self.send_url.clone())
                    .json(&SendRequest { message }),
            )
            .await?;
        let response = request.send().await?;

        if !response.status().is_success() {
            let (status, message) = error_details(response).await;
            return Err(GatewayError::Rejected { status, message });
        }

        response
            .json::<SendResponse>()
            .await?
            .name
            .ok_or(GatewayError::MissingMessageId)
    }
}

#[async_trait]
impl PushGateway for FcmClient {
    async fn send(&self, message: &Message) -> Result<String, GatewayError> {
        let start = Instant::now();
        let result = self.post(message).await;

        let outcome = if result.is_ok() { "success" } else { "failure" };
        histogram!(GATEWAY_SEND_DURATION, "outcome" => outcome)
            .record(start.elapsed().as_secs_f64());

        result
    }
}
