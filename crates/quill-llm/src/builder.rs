//! Transport request construction

use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use quill_config::{BackendConfig, TransportConfig};
use reqwest::header::{ACCEPT, CONTENT_TYPE, DATE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Request};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::adapter::BackendAdapter;
use crate::error::LlmError;
use crate::types::LlmRequest;

/// Build the pooled HTTP client shared by every dispatch
///
/// Only the connect timeout lives here; read ceilings are applied per request
/// so that streams are bounded by idle time rather than total duration.
pub fn http_client(config: &TransportConfig) -> Result<Client, LlmError> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|e| LlmError::Config(format!("failed to build HTTP client: {e}")))
}

/// Turns a logical request into an authenticated transport request
pub struct RequestBuilder {
    client: Client,
    base_url: Url,
    adapter: Arc<dyn BackendAdapter>,
    headers: HeaderMap,
    request_timeout: Option<Duration>,
}

impl RequestBuilder {
    /// Create a builder for one configured backend
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Config` if a static header name or value is invalid.
    pub fn new(
        client: Client,
        adapter: Arc<dyn BackendAdapter>,
        backend: &BackendConfig,
        request_timeout: Option<Duration>,
    ) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::with_capacity(backend.headers.len());
        for (name, value) in &backend.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| LlmError::Config(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| LlmError::Config(format!("invalid value for header '{name}': {e}")))?;
            headers.insert(name, value);
        }

        Ok(Self {
            client,
            base_url: backend.base_url.clone(),
            adapter,
            headers,
            request_timeout,
        })
    }

    /// Adapter the builder encodes with
    pub fn adapter(&self) -> &dyn BackendAdapter {
        self.adapter.as_ref()
    }

    /// Build the HTTP request for a logical request
    ///
    /// Always sets the content type, a `Date` header and bearer authorization;
    /// `Accept: text/event-stream` is added only for streaming requests.
    pub fn build(&self, request: &LlmRequest, token: &SecretString) -> Result<Request, LlmError> {
        let url = self.endpoint(self.adapter.path(request.kind()))?;
        let body = self.adapter.encode(request)?;

        let mut builder = self
            .client
            .post(url)
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(DATE, http_date(Timestamp::now()))
            .bearer_auth(token.expose_secret())
            .body(body);

        if request.is_stream() {
            builder = builder.header(ACCEPT, "text/event-stream");
        } else if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }

        builder
            .build()
            .map_err(|e| LlmError::InvalidRequest(format!("failed to build request: {e}")))
    }

    fn endpoint(&self, path: &str) -> Result<Url, LlmError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{path}")).map_err(|e| LlmError::Config(format!("invalid endpoint URL: {e}")))
    }
}

/// RFC 1123 date in UTC, as sent in the `Date` header
pub fn http_date(now: Timestamp) -> String {
    now.strftime("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
