use std::time::Duration;

use serde::Deserialize;
use url::Url;

/// Credential refresh and sign-in notification policy
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Identity the credentials are stored under
    #[serde(default = "default_identity")]
    pub identity: String,
    /// Endpoint for the refresh-token exchange; refresh is disabled when absent
    #[serde(default)]
    pub refresh_url: Option<Url>,
    /// Refresh proactively when the recorded expiry is this close to now
    #[serde(default = "default_lead_time", deserialize_with = "crate::duration::deserialize")]
    pub refresh_lead_time: Duration,
    /// Keep using the current access token when a refresh attempt fails
    #[serde(default = "default_fallback")]
    pub fallback_on_refresh_failure: bool,
    /// Minimum spacing between two "please sign in" notifications
    #[serde(default = "default_cooldown", deserialize_with = "crate::duration::deserialize")]
    pub sign_in_cooldown: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            identity: default_identity(),
            refresh_url: None,
            refresh_lead_time: default_lead_time(),
            fallback_on_refresh_failure: default_fallback(),
            sign_in_cooldown: default_cooldown(),
        }
    }
}

fn default_identity() -> String {
    "default".to_owned()
}

const fn default_lead_time() -> Duration {
    Duration::from_secs(60)
}

#[allow(clippy::missing_const_for_fn)]
fn default_fallback() -> bool {
    true
}

const fn default_cooldown() -> Duration {
    Duration::from_secs(300)
}
