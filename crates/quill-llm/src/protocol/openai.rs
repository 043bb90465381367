//! `OpenAI`-compatible API wire format types

use serde::{Deserialize, Serialize};

use super::shared::{WireChoice, WireCode, WireMessage, WireTool, WireUsage};

// -- Request types --

/// Legacy completion request (`/completions`)
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiCompletionRequest {
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Stream options (e.g. `include_usage`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<OpenAiStreamOptions>,
}

/// Chat completion request (`/chat/completions`)
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiChatRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<WireMessage>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Stop sequences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Stream options (e.g. `include_usage`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<OpenAiStreamOptions>,
    /// Tool definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<WireTool>>,
}

/// `OpenAI` stream options
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiStreamOptions {
    /// Include usage statistics on the final chunk
    pub include_usage: bool,
}

// -- Response types --

/// Response body or stream chunk
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiEnvelope {
    /// Response id
    #[serde(default)]
    pub id: Option<String>,
    /// Candidates
    #[serde(default)]
    pub choices: Vec<WireChoice>,
    /// Token accounting
    #[serde(default)]
    pub usage: Option<WireUsage>,
    /// Error object
    #[serde(default)]
    pub error: Option<OpenAiError>,
}

/// `OpenAI` error object
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiError {
    /// Error message
    #[serde(default)]
    pub message: Option<String>,
    /// Error type (e.g. `invalid_request_error`)
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    /// Error code (e.g. `invalid_api_key`)
    #[serde(default)]
    pub code: Option<WireCode>,
}
