use super::response::{NormalizedResponse, Usage};
use crate::error::LlmError;

/// Notification delivered to the caller of a streaming dispatch
///
/// Exactly one of [`StreamEvent::Done`] or [`StreamEvent::Error`] ends a
/// stream that was not cancelled, and [`StreamEvent::Closed`] is always last.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Response headers received with a success status
    Connected,
    /// Decoded chunk carrying one or more choices
    TokenChoices(NormalizedResponse),
    /// Usage reported mid-stream
    TokenUsage(Usage),
    /// Terminal failure
    Error(LlmError),
    /// Terminal success
    Done,
    /// Final notification, emitted regardless of outcome
    Closed,
}

impl StreamEvent {
    /// Whether this event ends the stream's content
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }
}
