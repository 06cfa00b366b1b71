//! Bearer tokens for outbound calls to the document store and push gateway.

use crate::config::CredentialsConfig;
use google_cloud_auth::credentials::{
    Builder as CredentialsBuilder, CacheableResource, Credentials as GoogleCredentials,
};
use http::{Extensions, HeaderMap};
use reqwest::header::AUTHORIZATION;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("could not load application default credentials: {0}")]
    Build(String),
    #[error("could not obtain access token: {0}")]
    Token(String),
    #[error("credentials produced no usable authorization headers")]
    NoHeaders,
}

/// Source of the `Authorization` header for outbound requests.
#[derive(Clone)]
pub struct Credentials(CredentialsInner);

#[derive(Clone)]
enum CredentialsInner {
    None,
    Static(String),
    // Refreshes and caches its own tokens
    Google(GoogleCredentials),
}

impl Credentials {
    pub fn new(config: &CredentialsConfig) -> Result<Self, AuthError> {
        let inner = match config {
            CredentialsConfig::None => CredentialsInner::None,
            CredentialsConfig::Static { token } => CredentialsInner::Static(token.clone()),
            CredentialsConfig::ApplicationDefault { scopes } => {
                let credentials = CredentialsBuilder::default()
                    .with_scopes(scopes.clone())
                    .build()
                    .map_err(|e| AuthError::Build(e.to_string()))?;
                CredentialsInner::Google(credentials)
            }
        };
        Ok(Credentials(inner))
    }

    pub fn none() -> Self {
        Credentials(CredentialsInner::None)
    }

    pub fn fixed(token: impl Into<String>) -> Self {
        Credentials(CredentialsInner::Static(token.into()))
    }

    /// Headers to attach to each request. Empty when requests go out unauthenticated.
    pub async fn headers(&self) -> Result<HeaderMap, AuthError> {
        match &self.0 {
            CredentialsInner::None => Ok(HeaderMap::new()),
            CredentialsInner::Static(token) => {
                let mut headers = HeaderMap::new();
                let value = format!("Bearer {token}")
                    .parse()
                    .map_err(|_| AuthError::NoHeaders)?;
                headers.insert(AUTHORIZATION, value);
                Ok(headers)
            }
            CredentialsInner::Google(credentials) => {
                let headers = credentials
                    .headers(Extensions::new())
                    .await
                    .map_err(|e| AuthError::Token(e.to_string()))?;
                match headers {
                    CacheableResource::New { data, .. } => {
                        tracing::trace!("Using application default credentials");
                        Ok(data)
                    }
                    // Only returned when the caller passes an entity tag
                    CacheableResource::NotModified => Err(AuthError::NoHeaders),
                }
            }
        }
    }

    /// Adds the credential headers to `request`.
    pub async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, AuthError> {
        Ok(request.headers(self.headers().await?))
    }
}
