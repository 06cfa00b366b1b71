//! Helpers shared by the Google REST clients.

use serde::Deserialize;
use url::Url;

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Consumes a non-success response and extracts `(status, message)`.
///
/// Google APIs wrap failures as `{"error": {"code", "message", "status"}}`; any
/// other body is returned as-is, falling back to the reason phrase.
pub(crate) async fn error_details(response: reqwest::Response) -> (u16, String) {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    let message = match serde_json::from_str::<ErrorEnvelope>(&text) {
        Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
        _ if !text.trim().is_empty() => text.trim().to_owned(),
        _ => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned(),
    };

    (status.as_u16(), message)
}

/// Returns `url` with a trailing slash so that relative joins append to its path.
pub(crate) fn as_base(url: &Url) -> Url {
    let mut base = url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}
