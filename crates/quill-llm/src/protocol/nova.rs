//! Nova code-assistant API wire format types

use serde::{Deserialize, Serialize};

use super::shared::{WireChoice, WireCode, WireMessage, WireTool, WireUsage};

// -- Request types --

/// Prompt completion request
#[derive(Debug, Clone, Serialize)]
pub struct NovaCompletionRequest {
    /// Model identifier
    pub model: String,
    /// Prompt text
    pub prompt: String,
    /// Number of candidates
    pub n: u32,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Stop sequences
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<u32>,
    /// Whether to stream the response
    pub stream: bool,
}

/// Chat or agent request
#[derive(Debug, Clone, Serialize)]
pub struct NovaChatRequest {
    /// Model identifier
    pub model: String,
    /// Backend-side conversation id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Conversation messages
    pub messages: Vec<WireMessage>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Stop sequences
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<u32>,
    /// Whether to stream the response
    pub stream: bool,
    /// Tools (agent requests only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<WireTool>>,
}

// -- Response types --

/// Response body or stream chunk
///
/// The payload is either inline or wrapped in `data`; the status is either
/// top-level `code`/`message` or nested under `error`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NovaEnvelope {
    /// Top-level status code, `0` when ok
    #[serde(default)]
    pub code: Option<WireCode>,
    /// Top-level status message
    #[serde(default)]
    pub message: Option<String>,
    /// Nested error status
    #[serde(default)]
    pub error: Option<NovaError>,
    /// Wrapped payload
    #[serde(default)]
    pub data: Option<NovaPayload>,
    /// Inline payload
    #[serde(flatten)]
    pub payload: NovaPayload,
}

/// Nested error status
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NovaError {
    /// Error code
    #[serde(default)]
    pub code: Option<WireCode>,
    /// Error message
    #[serde(default)]
    pub message: Option<String>,
}

/// Generated content and accounting
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NovaPayload {
    /// Response id
    #[serde(default)]
    pub id: Option<String>,
    /// Candidates
    #[serde(default)]
    pub choices: Vec<WireChoice>,
    /// Token accounting
    #[serde(default)]
    pub usage: Option<WireUsage>,
}
