//! Test configuration built from TOML, the way hosts load it

use quill_config::Config;

use super::mock_backend::MockBackend;

/// Configuration pointing the `nova` backend at a mock
pub fn for_mock(mock: &MockBackend) -> Config {
    with_refresh_path(mock, "/auth/refresh")
}

/// Same as [`for_mock`] but refreshing through the given path
pub fn with_refresh_path(mock: &MockBackend, refresh_path: &str) -> Config {
    let base = mock.base_url();
    let raw = format!(
        r#"
[llm]
default_backend = "nova"

[llm.backends.nova]
type = "nova"
base_url = "{base}"

[llm.backends.nova.headers]
"x-client" = "quill-tests"

[auth]
refresh_url = "{base}{refresh_path}"
refresh_lead_time = "60s"
sign_in_cooldown = "5m"

[transport]
connect_timeout = "2s"
request_timeout = "10s"
stream_idle_timeout = "10s"
"#
    );
    Config::from_toml(&raw).expect("test config is valid")
}
