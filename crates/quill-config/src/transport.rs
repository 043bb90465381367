use std::time::Duration;

use serde::Deserialize;

/// Ceilings applied to the shared HTTP transport
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// TCP/TLS connect ceiling
    #[serde(default = "default_connect_timeout", deserialize_with = "crate::duration::deserialize")]
    pub connect_timeout: Duration,
    /// Whole-exchange ceiling for non-streaming requests
    #[serde(default = "default_request_timeout", deserialize_with = "crate::duration::deserialize")]
    pub request_timeout: Duration,
    /// Longest wait between two events of a stream
    #[serde(default = "default_idle_timeout", deserialize_with = "crate::duration::deserialize")]
    pub stream_idle_timeout: Duration,
    /// `User-Agent` header value
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            stream_idle_timeout: default_idle_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

const fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

const fn default_idle_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_user_agent() -> String {
    concat!("quill/", env!("CARGO_PKG_VERSION")).to_owned()
}
