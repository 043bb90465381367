//! Error taxonomy shared by every dispatch path

use thiserror::Error;

/// Failure category of an [`LlmError`], independent of its message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing, expired or rejected credentials
    Unauthorized,
    /// Backend refused the content on policy grounds
    SensitiveContent,
    /// Backend throttled the caller
    RateLimited,
    /// Any other backend-declared error carrying a readable message
    BackendMessage,
    /// 5xx response with no usable backend body
    ServerError,
    /// Malformed or prematurely terminated event stream
    StreamProtocolError,
    /// Caller supplied a request or configuration the client cannot serve
    InvalidRequest,
    /// Transport failures, undecodable bodies and everything unclassified
    Unknown,
}

/// Errors surfaced by the LLM client
///
/// Every failure leaving the dispatcher is one of these; raw transport errors
/// are converted by [`crate::classify`] before they reach the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    /// Credentials are missing or were rejected by the backend
    #[error("{0}")]
    Unauthorized(String),

    /// Backend rejected the prompt or output as sensitive
    #[error("{0}")]
    SensitiveContent(String),

    /// Backend rate limit or quota exhausted
    #[error("{0}")]
    RateLimited(String),

    /// Backend-declared error with a human-readable message
    #[error("{0}")]
    BackendMessage(String),

    /// Server-side failure; the raw body is deliberately not kept
    #[error("server error (HTTP {status})")]
    ServerError {
        /// HTTP status code in the 5xx range
        status: u16,
    },

    /// SSE stream was malformed or ended without the done sentinel
    #[error("{0}")]
    StreamProtocol(String),

    /// Request violates a client-side constraint
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Client could not be assembled from configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Unclassified failure
    #[error("{0}")]
    Unknown(String),
}

impl LlmError {
    /// Category of this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::SensitiveContent(_) => ErrorKind::SensitiveContent,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::BackendMessage(_) => ErrorKind::BackendMessage,
            Self::ServerError { .. } => ErrorKind::ServerError,
            Self::StreamProtocol(_) => ErrorKind::StreamProtocolError,
            Self::InvalidRequest(_) | Self::Config(_) => ErrorKind::InvalidRequest,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Whether this error should invalidate the stored credentials
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Build an error of the given backend-declared kind
    ///
    /// Kinds that carry no message of their own fall back to
    /// [`LlmError::BackendMessage`].
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Unauthorized => Self::Unauthorized(message),
            ErrorKind::SensitiveContent => Self::SensitiveContent(message),
            ErrorKind::RateLimited => Self::RateLimited(message),
            ErrorKind::StreamProtocolError => Self::StreamProtocol(message),
            ErrorKind::InvalidRequest => Self::InvalidRequest(message),
            ErrorKind::Unknown => Self::Unknown(message),
            ErrorKind::BackendMessage | ErrorKind::ServerError => Self::BackendMessage(message),
        }
    }
}
