//! Conversion between internal types and the `OpenAI` wire format

use super::{choices, wire_messages, wire_tools};
use crate::protocol::openai::{OpenAiChatRequest, OpenAiCompletionRequest, OpenAiEnvelope, OpenAiStreamOptions};
use crate::protocol::shared::WireCode;
use crate::types::{BackendStatus, CompletionRequest, GenerationParams, Message, NormalizedResponse, ToolDefinition};

// -- Outbound --

impl OpenAiCompletionRequest {
    /// Build a completion body; `include_usage` only applies to streams
    pub fn new(req: &CompletionRequest, include_usage: bool) -> Self {
        let params = &req.params;
        Self {
            model: params.model.clone(),
            prompt: req.prompt.clone(),
            n: req.candidate_count,
            temperature: params.temperature,
            stop: stop(params),
            max_tokens: params.max_new_tokens,
            stream: params.stream.then_some(true),
            stream_options: stream_options(params, include_usage),
        }
    }
}

impl OpenAiChatRequest {
    /// Build a chat body; tools are sent only when non-empty
    pub fn new(params: &GenerationParams, messages: &[Message], tools: &[ToolDefinition], include_usage: bool) -> Self {
        Self {
            model: params.model.clone(),
            messages: wire_messages(messages),
            temperature: params.temperature,
            stop: stop(params),
            max_tokens: params.max_new_tokens,
            stream: params.stream.then_some(true),
            stream_options: stream_options(params, include_usage),
            tools: (!tools.is_empty()).then(|| wire_tools(tools)),
        }
    }
}

fn stop(params: &GenerationParams) -> Option<Vec<String>> {
    (!params.stop.is_empty()).then(|| params.stop.clone())
}

fn stream_options(params: &GenerationParams, include_usage: bool) -> Option<OpenAiStreamOptions> {
    (params.stream && include_usage).then_some(OpenAiStreamOptions { include_usage: true })
}

// -- Inbound --

impl From<OpenAiEnvelope> for NormalizedResponse {
    fn from(envelope: OpenAiEnvelope) -> Self {
        let backend_status = envelope.error.map(|error| BackendStatus {
            code: error
                .code
                .map(WireCode::into_string)
                .or(error.error_type)
                .unwrap_or_else(|| "error".to_owned()),
            message: error.message,
        });

        Self {
            id: envelope.id,
            usage: envelope.usage.map(Into::into),
            choices: choices(envelope.choices),
            backend_status,
        }
    }
}
