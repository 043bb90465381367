//! OpenAI-compatible backend

use quill_config::BackendConfig;
use url::Url;

use super::{BackendAdapter, Endpoints, from_json, to_json};
use crate::error::{ErrorKind, LlmError};
use crate::protocol::openai::{OpenAiChatRequest, OpenAiCompletionRequest, OpenAiEnvelope};
use crate::types::{BackendStatus, LlmRequest, NormalizedResponse, RequestKind};

/// Whether the backend is the canonical `OpenAI` API (vs a compatible third party)
fn is_canonical_openai(base_url: &Url) -> bool {
    base_url.host_str().is_some_and(|h| h == "api.openai.com")
}

/// Adapter for the `OpenAI` wire format
#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    name: String,
    endpoints: Endpoints,
    include_usage: bool,
}

impl OpenAiAdapter {
    /// Create from backend configuration
    pub fn new(name: &str, config: &BackendConfig) -> Self {
        Self {
            name: name.to_owned(),
            endpoints: Endpoints::new(config),
            // Many compatible servers reject `stream_options`
            include_usage: is_canonical_openai(&config.base_url),
        }
    }
}

impl BackendAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self, kind: RequestKind) -> &str {
        self.endpoints.get(kind)
    }

    fn encode(&self, request: &LlmRequest) -> Result<Vec<u8>, LlmError> {
        match request {
            LlmRequest::Completion(req) => to_json(&OpenAiCompletionRequest::new(req, self.include_usage)),
            LlmRequest::Chat(req) => to_json(&OpenAiChatRequest::new(
                &req.params,
                &req.messages,
                &[],
                self.include_usage,
            )),
            LlmRequest::Agent(req) => to_json(&OpenAiChatRequest::new(
                &req.params,
                &req.messages,
                &req.tools,
                self.include_usage,
            )),
        }
    }

    fn decode(&self, body: &str) -> Result<NormalizedResponse, LlmError> {
        from_json::<OpenAiEnvelope>(body).map(Into::into)
    }

    fn error_kind(&self, status: &BackendStatus) -> ErrorKind {
        match status.code.as_str() {
            "invalid_api_key" | "authentication_error" => ErrorKind::Unauthorized,
            "content_filter" | "content_policy_violation" => ErrorKind::SensitiveContent,
            "rate_limit_exceeded" | "insufficient_quota" => ErrorKind::RateLimited,
            _ => ErrorKind::BackendMessage,
        }
    }
}
