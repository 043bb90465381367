//! Nova code-assistant backend

use quill_config::BackendConfig;

use super::{BackendAdapter, Endpoints, from_json, to_json};
use crate::error::{ErrorKind, LlmError};
use crate::protocol::nova::{NovaChatRequest, NovaCompletionRequest, NovaEnvelope};
use crate::types::{BackendStatus, LlmRequest, NormalizedResponse, RequestKind};

/// Codes declaring missing, expired or revoked credentials
const UNAUTHORIZED_CODES: &[&str] = &["200001", "200002", "200003"];

/// Codes declaring a content-policy rejection
const SENSITIVE_CODES: &[&str] = &["18", "200101", "200102"];

/// Codes declaring throttling or exhausted quota
const RATE_LIMITED_CODES: &[&str] = &["17", "200201"];

/// Adapter for the Nova wire format
#[derive(Debug, Clone)]
pub struct NovaAdapter {
    name: String,
    endpoints: Endpoints,
}

impl NovaAdapter {
    /// Create from backend configuration
    pub fn new(name: &str, config: &BackendConfig) -> Self {
        Self {
            name: name.to_owned(),
            endpoints: Endpoints::new(config),
        }
    }
}

impl BackendAdapter for NovaAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self, kind: RequestKind) -> &str {
        self.endpoints.get(kind)
    }

    fn encode(&self, request: &LlmRequest) -> Result<Vec<u8>, LlmError> {
        match request {
            LlmRequest::Completion(req) => to_json(&NovaCompletionRequest::from(req)),
            LlmRequest::Chat(req) => to_json(&NovaChatRequest::from(req)),
            LlmRequest::Agent(req) => to_json(&NovaChatRequest::from(req)),
        }
    }

    fn decode(&self, body: &str) -> Result<NormalizedResponse, LlmError> {
        from_json::<NovaEnvelope>(body).map(Into::into)
    }

    fn error_kind(&self, status: &BackendStatus) -> ErrorKind {
        let code = status.code.as_str();
        if UNAUTHORIZED_CODES.contains(&code) {
            ErrorKind::Unauthorized
        } else if SENSITIVE_CODES.contains(&code) {
            ErrorKind::SensitiveContent
        } else if RATE_LIMITED_CODES.contains(&code) {
            ErrorKind::RateLimited
        } else {
            ErrorKind::BackendMessage
        }
    }
}
