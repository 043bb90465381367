//! Conversion between internal types and the Nova wire format

use super::{choices, wire_messages, wire_tools};
use crate::protocol::nova::{NovaChatRequest, NovaCompletionRequest, NovaEnvelope, NovaError};
use crate::protocol::shared::WireCode;
use crate::types::{AgentRequest, BackendStatus, ChatRequest, CompletionRequest, NormalizedResponse};

/// Code Nova uses for a successful exchange
const OK_CODE: &str = "0";

// -- Outbound --

impl From<&CompletionRequest> for NovaCompletionRequest {
    fn from(req: &CompletionRequest) -> Self {
        Self {
            model: req.params.model.clone(),
            prompt: req.prompt.clone(),
            n: req.candidate_count,
            temperature: req.params.temperature,
            stop: req.params.stop.clone(),
            max_new_tokens: req.params.max_new_tokens,
            stream: req.params.stream,
        }
    }
}

impl From<&ChatRequest> for NovaChatRequest {
    fn from(req: &ChatRequest) -> Self {
        Self {
            model: req.params.model.clone(),
            conversation_id: req.conversation_id.clone(),
            messages: wire_messages(&req.messages),
            temperature: req.params.temperature,
            stop: req.params.stop.clone(),
            max_new_tokens: req.params.max_new_tokens,
            stream: req.params.stream,
            tools: None,
        }
    }
}

impl From<&AgentRequest> for NovaChatRequest {
    fn from(req: &AgentRequest) -> Self {
        Self {
            model: req.params.model.clone(),
            conversation_id: req.conversation_id.clone(),
            messages: wire_messages(&req.messages),
            temperature: req.params.temperature,
            stop: req.params.stop.clone(),
            max_new_tokens: req.params.max_new_tokens,
            stream: req.params.stream,
            tools: (!req.tools.is_empty()).then(|| wire_tools(&req.tools)),
        }
    }
}

// -- Inbound --

impl From<NovaEnvelope> for NormalizedResponse {
    fn from(envelope: NovaEnvelope) -> Self {
        let backend_status = backend_status(envelope.code, envelope.message, envelope.error);
        let payload = envelope.data.unwrap_or(envelope.payload);

        Self {
            id: payload.id,
            usage: payload.usage.map(Into::into),
            choices: choices(payload.choices),
            backend_status,
        }
    }
}

fn backend_status(
    code: Option<WireCode>,
    message: Option<String>,
    error: Option<NovaError>,
) -> Option<BackendStatus> {
    let top_level = code
        .map(WireCode::into_string)
        .filter(|code| code != OK_CODE)
        .map(|code| BackendStatus { code, message });

    top_level.or_else(|| {
        let error = error?;
        let code = error.code.map_or_else(|| "error".to_owned(), WireCode::into_string);
        (code != OK_CODE).then_some(BackendStatus {
            code,
            message: error.message,
        })
    })
}
