use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use super::Credentials;
use crate::classify;
use crate::error::LlmError;

/// Exchanges a refresh token for a new credential set
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Perform the exchange
    async fn refresh(&self, refresh_token: &SecretString) -> Result<Credentials, LlmError>;
}

/// Refresher that POSTs `{"refresh_token": ...}` to a fixed endpoint
pub struct HttpTokenRefresher {
    client: Client,
    url: Url,
}

impl HttpTokenRefresher {
    /// Create a refresher for the given endpoint
    pub const fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }
}

#[derive(serde::Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Accepts the credential fields either top-level or wrapped in `data`
#[derive(Debug, Default, Deserialize)]
struct RefreshEnvelope {
    #[serde(default)]
    data: Option<RefreshPayload>,
    #[serde(flatten)]
    payload: RefreshPayload,
}

#[derive(Debug, Default, Deserialize)]
struct RefreshPayload {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &SecretString) -> Result<Credentials, LlmError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&RefreshRequest {
                refresh_token: refresh_token.expose_secret(),
            })
            .send()
            .await
            .map_err(|e| classify::transport(&e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(LlmError::Unauthorized("refresh token rejected".to_owned()));
        }
        if status.is_server_error() {
            return Err(LlmError::ServerError { status: status.as_u16() });
        }
        if !status.is_success() {
            return Err(LlmError::BackendMessage(format!("token refresh failed with HTTP {status}")));
        }

        let envelope: RefreshEnvelope = response
            .json()
            .await
            .map_err(|e| LlmError::Unknown(format!("failed to decode refresh response: {e}")))?;
        let payload = envelope.data.unwrap_or(envelope.payload);

        let access_token = payload
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| LlmError::Unknown("refresh response carried no access token".to_owned()))?;

        Ok(Credentials {
            access_token: Some(SecretString::from(access_token)),
            refresh_token: payload.refresh_token.map(SecretString::from),
            expires_at: payload.expires_at,
        })
    }
}
