//! Wire shapes both backends agree on: chat messages, tools and choices

use serde::{Deserialize, Serialize};

// -- Request types --

/// Chat message within a request body
#[derive(Debug, Clone, Serialize)]
pub struct WireMessage {
    /// Message role
    pub role: &'static str,
    /// Text content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls made by the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
    /// Tool call this message answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Completed tool call echoed back in the conversation
#[derive(Debug, Clone, Serialize)]
pub struct WireToolCall {
    /// Call id
    pub id: String,
    /// Always `"function"`
    #[serde(rename = "type")]
    pub call_type: &'static str,
    /// Function invocation
    pub function: WireFunctionCall,
}

/// Function name and JSON-encoded arguments
#[derive(Debug, Clone, Serialize)]
pub struct WireFunctionCall {
    /// Function name
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

/// Tool made available to the model
#[derive(Debug, Clone, Serialize)]
pub struct WireTool {
    /// Always `"function"`
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    /// Function definition
    pub function: WireFunction,
}

/// Function definition within a tool
#[derive(Debug, Clone, Serialize)]
pub struct WireFunction {
    /// Function name
    pub name: String,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema of the parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

// -- Response types --

/// Candidate in a response body or stream chunk
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireChoice {
    /// Candidate index, absent on some single-choice bodies
    #[serde(default)]
    pub index: Option<u32>,
    /// Completion text
    #[serde(default)]
    pub text: Option<String>,
    /// Full message (non-streaming chat)
    #[serde(default)]
    pub message: Option<WireDelta>,
    /// Incremental message (streaming chat)
    #[serde(default)]
    pub delta: Option<WireDelta>,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Message or delta content inside a choice
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireDelta {
    /// Text content
    #[serde(default)]
    pub content: Option<String>,
    /// Tool call fragments
    #[serde(default)]
    pub tool_calls: Option<Vec<WireToolCallDelta>>,
}

/// Tool call, complete or partial
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireToolCallDelta {
    /// Position within the choice
    #[serde(default)]
    pub index: Option<u32>,
    /// Call id
    #[serde(default)]
    pub id: Option<String>,
    /// Function name and argument fragment
    #[serde(default)]
    pub function: Option<WireFunctionDelta>,
}

/// Function fragment within a tool call delta
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireFunctionDelta {
    /// Function name
    #[serde(default)]
    pub name: Option<String>,
    /// Argument fragment
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Token accounting
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct WireUsage {
    /// Prompt tokens
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Generated tokens
    #[serde(default)]
    pub completion_tokens: u32,
}

/// Status code that some backends send as a number and others as a string
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireCode {
    /// Numeric code
    Number(i64),
    /// String code
    Text(String),
}

impl WireCode {
    /// Code rendered as a string
    pub fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}
