use serde::Serialize;

/// Token accounting reported by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Tokens generated
    pub completion_tokens: u32,
}

impl Usage {
    /// Prompt plus completion tokens
    pub const fn total(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// Incremental tool call fragment from an agent response
///
/// Fragments are exposed as received; joining `arguments` across chunks of the
/// same `index` is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCallDelta {
    /// Position of the call within the choice
    pub index: u32,
    /// Call id, usually present on the first fragment only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Function name, usually present on the first fragment only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Fragment of the JSON-encoded arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// One candidate within a response or stream chunk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Choice {
    /// Candidate index
    pub index: u32,
    /// Text (whole body) or delta (stream chunk)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Why generation stopped, as reported by the backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    /// Tool call fragments (agent requests)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Error status declared by the backend inside a response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    /// Backend-specific code, normalised to a string
    pub code: String,
    /// Human-readable message, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Single response or one decoded stream chunk, in backend-agnostic form
///
/// `usage` and `backend_status` are advisory: `None` means not reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedResponse {
    /// Backend response id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Token accounting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Candidates
    pub choices: Vec<Choice>,
    /// Non-ok status declared by the backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_status: Option<BackendStatus>,
}

impl NormalizedResponse {
    /// Text of the first choice
    pub fn first_token(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.token.as_deref())
    }
}
