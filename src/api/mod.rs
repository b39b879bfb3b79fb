//! REST client for the platform backend.
//!
//! ARCHITECTURE
//! ============
//! Every call is authenticated with the current access token, taken from a
//! [`TokenSource`] (the auth provider's persisted session) unless the caller
//! pins a specific token, as the reconciler does for its tagged profile fetch.
//!
//! ERROR HANDLING
//! ==============
//! Non-success responses are classified by [`ApiError::from_response`];
//! a missing token is an auth error before any request is sent.

pub mod billing;
pub mod users;

use std::sync::Arc;

pub use reqwest::Method;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::HttpTimeouts;
use crate::error::ApiError;

/// Source of the bearer token attached to authenticated calls.
pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

/// `{ "data": T }` envelope used by the backend.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub(crate) data: T,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl ApiClient {
    /// Build a client for `base_url` (trailing slash ignored).
    ///
    /// # Errors
    ///
    /// Returns a network error if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, tokens: Arc<dyn TokenSource>, timeouts: HttpTimeouts) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.request())
            .connect_timeout(timeouts.connect())
            .build()
            .map_err(|e| ApiError::network(format!("http client build failed: {e}")))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned(), tokens })
    }

    #[must_use]
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    fn current_token(&self) -> Result<String, ApiError> {
        self.tokens.access_token().ok_or_else(ApiError::auth_required)
    }

    /// Authenticated JSON request using the current session token.
    ///
    /// # Errors
    ///
    /// Returns an auth error without a token, otherwise the classified
    /// transport or response error.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, ApiError> {
        let token = self.current_token()?;
        self.request_with_token(&token, method, endpoint, body).await
    }

    /// Authenticated bodiless request with `query` appended to the endpoint.
    ///
    /// # Errors
    ///
    /// Returns an auth error without a token, otherwise the classified
    /// transport or response error.
    pub async fn request_with_query<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let token = self.current_token()?;
        let response = self.send(&token, method, endpoint, query, None).await?;
        read_json(response).await
    }

    /// Authenticated JSON request pinned to `token`.
    ///
    /// # Errors
    ///
    /// Returns the classified transport or response error.
    pub async fn request_with_token<T: DeserializeOwned>(
        &self,
        token: &str,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, ApiError> {
        let response = self.send(token, method, endpoint, &[], body).await?;
        read_json(response).await
    }

    async fn send(
        &self,
        token: &str,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.endpoint_url(endpoint);
        debug!(%method, %url, params = query.len(), "api request");
        let mut builder = self.http.request(method, url).bearer_auth(token);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }
}

/// Decode a success body as JSON, or classify the failure.
pub(crate) async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::from_response(status.as_u16(), &text));
    }
    Ok(serde_json::from_str(&text)?)
}

/// Statuses treated as success for bodiless mutations.
pub(crate) fn is_no_content_success(status: StatusCode) -> bool {
    matches!(status, StatusCode::OK | StatusCode::NO_CONTENT)
}
