//! Request variants and their generation parameters

use super::message::Message;
use super::tool::ToolDefinition;
use crate::error::LlmError;

/// Sampling and transport parameters shared by every request variant
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Model name
    pub model: String,
    /// Sampling temperature
    pub temperature: Option<f64>,
    /// Stop sequences
    pub stop: Vec<String>,
    /// Upper bound on generated tokens
    pub max_new_tokens: Option<u32>,
    /// Whether the response is streamed over SSE
    pub stream: bool,
}

impl GenerationParams {
    /// Non-streaming parameters for the given model
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            stop: Vec::new(),
            max_new_tokens: None,
            stream: false,
        }
    }

    /// Request an SSE response
    #[must_use]
    pub const fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    /// Set the sampling temperature
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the stop sequences
    #[must_use]
    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    /// Cap the number of generated tokens
    #[must_use]
    pub const fn with_max_new_tokens(mut self, max_new_tokens: u32) -> Self {
        self.max_new_tokens = Some(max_new_tokens);
        self
    }
}

/// Raw prompt completion
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Shared parameters
    pub params: GenerationParams,
    /// Prompt text
    pub prompt: String,
    /// Number of candidates to generate
    pub candidate_count: u32,
}

/// Conversational request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Shared parameters
    pub params: GenerationParams,
    /// Backend-side conversation id
    pub conversation_id: Option<String>,
    /// Conversation so far
    pub messages: Vec<Message>,
}

/// Conversational request with tools the model may call
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRequest {
    /// Shared parameters
    pub params: GenerationParams,
    /// Backend-side conversation id
    pub conversation_id: Option<String>,
    /// Conversation so far
    pub messages: Vec<Message>,
    /// Tools available to the model
    pub tools: Vec<ToolDefinition>,
}

/// Endpoint family a request is sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Prompt completion
    Completion,
    /// Chat
    Chat,
    /// Agent chat with tools
    Agent,
}

/// A logical request, immutable once handed to the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum LlmRequest {
    /// Prompt completion
    Completion(CompletionRequest),
    /// Chat
    Chat(ChatRequest),
    /// Agent chat with tools
    Agent(AgentRequest),
}

impl LlmRequest {
    /// Prompt completion producing a single candidate
    pub fn completion(params: GenerationParams, prompt: impl Into<String>) -> Self {
        Self::Completion(CompletionRequest {
            params,
            prompt: prompt.into(),
            candidate_count: 1,
        })
    }

    /// Chat without a conversation id
    pub const fn chat(params: GenerationParams, messages: Vec<Message>) -> Self {
        Self::Chat(ChatRequest {
            params,
            conversation_id: None,
            messages,
        })
    }

    /// Agent chat without a conversation id
    pub const fn agent(params: GenerationParams, messages: Vec<Message>, tools: Vec<ToolDefinition>) -> Self {
        Self::Agent(AgentRequest {
            params,
            conversation_id: None,
            messages,
            tools,
        })
    }

    /// Shared parameters
    pub const fn params(&self) -> &GenerationParams {
        match self {
            Self::Completion(req) => &req.params,
            Self::Chat(req) => &req.params,
            Self::Agent(req) => &req.params,
        }
    }

    /// Endpoint family
    pub const fn kind(&self) -> RequestKind {
        match self {
            Self::Completion(_) => RequestKind::Completion,
            Self::Chat(_) => RequestKind::Chat,
            Self::Agent(_) => RequestKind::Agent,
        }
    }

    /// Whether the response is streamed
    pub const fn is_stream(&self) -> bool {
        self.params().stream
    }

    /// Check caller-side constraints before anything goes on the wire
    pub fn validate(&self) -> Result<(), LlmError> {
        if self.params().model.trim().is_empty() {
            return Err(LlmError::InvalidRequest("model name must not be empty".to_owned()));
        }

        match self {
            Self::Completion(req) if req.candidate_count == 0 => Err(LlmError::InvalidRequest(
                "candidate count must be at least 1".to_owned(),
            )),
            Self::Chat(ChatRequest { messages, .. }) | Self::Agent(AgentRequest { messages, .. })
                if messages.is_empty() =>
            {
                Err(LlmError::InvalidRequest("message list must not be empty".to_owned()))
            }
            _ => Ok(()),
        }
    }
}
