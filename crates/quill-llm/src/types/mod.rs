//! Backend-agnostic request and response types
//!
//! Every backend adapter encodes from and decodes into these; nothing outside
//! `protocol` and `convert` sees a backend wire shape.

pub mod message;
pub mod request;
pub mod response;
pub mod stream;
pub mod tool;

pub use message::{FunctionCall, Message, Role, ToolCall};
pub use request::{AgentRequest, ChatRequest, CompletionRequest, GenerationParams, LlmRequest, RequestKind};
pub use response::{BackendStatus, Choice, NormalizedResponse, ToolCallDelta, Usage};
pub use stream::StreamEvent;
pub use tool::ToolDefinition;
