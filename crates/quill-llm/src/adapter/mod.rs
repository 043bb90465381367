//! Backend adapters: the single place backend-specific wire formats live
//!
//! An adapter is chosen once from configuration. The rest of the client only
//! deals in [`LlmRequest`] and [`NormalizedResponse`].

pub mod nova;
pub mod openai;

use std::sync::Arc;

use quill_config::{BackendConfig, BackendType};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use self::nova::NovaAdapter;
pub use self::openai::OpenAiAdapter;
use crate::error::{ErrorKind, LlmError};
use crate::types::{BackendStatus, LlmRequest, NormalizedResponse, RequestKind};

/// Encodes requests into and decodes responses from one backend's JSON schema
pub trait BackendAdapter: Send + Sync {
    /// Configured backend name
    fn name(&self) -> &str;

    /// Endpoint path (relative to the base URL) for a request family
    fn path(&self, kind: RequestKind) -> &str;

    /// Serialize a request into the backend's JSON body
    fn encode(&self, request: &LlmRequest) -> Result<Vec<u8>, LlmError>;

    /// Decode a whole response body or a single SSE payload
    ///
    /// A non-ok status declared in the body is returned in
    /// [`NormalizedResponse::backend_status`], not as an error.
    fn decode(&self, body: &str) -> Result<NormalizedResponse, LlmError>;

    /// Map a backend-declared status through the backend's code table
    fn error_kind(&self, status: &BackendStatus) -> ErrorKind;
}

/// Build the adapter for a configured backend
pub fn from_config(name: &str, config: &BackendConfig) -> Arc<dyn BackendAdapter> {
    match config.backend_type {
        BackendType::Nova => Arc::new(NovaAdapter::new(name, config)),
        BackendType::Openai => Arc::new(OpenAiAdapter::new(name, config)),
    }
}

/// Endpoint paths resolved from configuration
#[derive(Debug, Clone)]
pub(crate) struct Endpoints {
    completion: String,
    chat: String,
    agent: String,
}

impl Endpoints {
    pub(crate) fn new(config: &BackendConfig) -> Self {
        Self {
            completion: config.completion_path().to_owned(),
            chat: config.chat_path().to_owned(),
            agent: config.agent_path().to_owned(),
        }
    }

    pub(crate) fn get(&self, kind: RequestKind) -> &str {
        match kind {
            RequestKind::Completion => &self.completion,
            RequestKind::Chat => &self.chat,
            RequestKind::Agent => &self.agent,
        }
    }
}

pub(crate) fn to_json<T: Serialize>(body: &T) -> Result<Vec<u8>, LlmError> {
    serde_json::to_vec(body).map_err(|e| LlmError::InvalidRequest(format!("failed to encode request body: {e}")))
}

/// Decode failures on an otherwise successful exchange are `Unknown`
pub(crate) fn from_json<T: DeserializeOwned>(body: &str) -> Result<T, LlmError> {
    serde_json::from_str(body).map_err(|e| LlmError::Unknown(format!("failed to decode response: {e}")))
}
