//! Core LLM streaming client for Quill
//!
//! Turns a logical completion/chat/agent request into an authenticated HTTP
//! exchange against a configured backend, consumes either a single JSON body
//! or an SSE stream, classifies failures into a small error taxonomy, and
//! reports per-request lifecycle events to registered listeners.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod adapter;
pub mod auth;
pub mod builder;
pub mod classify;
pub mod context;
pub mod convert;
pub mod dispatcher;
pub mod error;
pub mod notifier;
pub mod protocol;
pub mod types;

pub use adapter::BackendAdapter;
pub use auth::{AuthListener, CredentialStore, Credentials, MemoryCredentialStore, TokenManager, TokenRefresher};
pub use context::RequestContext;
pub use dispatcher::{Dispatcher, DispatcherBuilder, Outcome};
pub use error::{ErrorKind, LlmError};
pub use notifier::{LifecycleListener, LifecycleNotifier};
pub use types::{LlmRequest, Message, NormalizedResponse, StreamEvent, Usage};
