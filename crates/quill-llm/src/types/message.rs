use serde::Serialize;

/// Role of a message participant on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction
    System,
    /// User message
    User,
    /// Assistant response or tool call request
    Assistant,
    /// Tool result
    Tool,
}

impl Role {
    /// Wire name of the role
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// One turn in a conversation
///
/// The role is implied by the variant and never stored separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// System instruction
    System(String),
    /// User message
    User(String),
    /// Assistant text
    Assistant(String),
    /// Assistant turn requesting one or more tool invocations
    ToolCalls(Vec<ToolCall>),
    /// Result of a tool invocation
    ToolResult {
        /// Id of the tool call this result answers
        tool_call_id: String,
        /// Tool output
        content: String,
    },
}

impl Message {
    /// Role derived from the variant
    pub const fn role(&self) -> Role {
        match self {
            Self::System(_) => Role::System,
            Self::User(_) => Role::User,
            Self::Assistant(_) | Self::ToolCalls(_) => Role::Assistant,
            Self::ToolResult { .. } => Role::Tool,
        }
    }

    /// Text content, if the variant carries any
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::System(text) | Self::User(text) | Self::Assistant(text) => Some(text),
            Self::ToolResult { content, .. } => Some(content),
            Self::ToolCalls(_) => None,
        }
    }
}

/// Tool invocation requested by the assistant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    /// Unique id for this call
    pub id: String,
    /// Function to invoke
    pub function: FunctionCall,
}

/// Function name and JSON-encoded arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    /// Function name
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}
