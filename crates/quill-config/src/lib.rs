#![allow(clippy::must_use_candidate)]

//! Configuration for the quill LLM streaming client
//!
//! Hosts either build these structs directly or load them from a TOML
//! document with [`Config::load`].

pub mod auth;
mod duration;
mod env;
pub mod llm;
mod loader;
pub mod telemetry;
pub mod transport;

use serde::Deserialize;

pub use auth::*;
pub use llm::*;
pub use telemetry::*;
pub use transport::*;

/// Top-level quill configuration
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Backend configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Credential refresh and sign-in policy
    #[serde(default)]
    pub auth: AuthConfig,
    /// HTTP transport ceilings
    #[serde(default)]
    pub transport: TransportConfig,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}
