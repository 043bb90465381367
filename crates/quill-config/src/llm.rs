use indexmap::IndexMap;
use serde::Deserialize;
use url::Url;

/// Backend selection and per-backend settings
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Backend used when the host does not name one explicitly
    #[serde(default)]
    pub default_backend: Option<String>,
    /// Backend configurations keyed by name, in declaration order
    #[serde(default)]
    pub backends: IndexMap<String, BackendConfig>,
}

impl LlmConfig {
    /// Resolve a backend by name, falling back to the default and then to the first declared
    pub fn backend(&self, name: Option<&str>) -> Option<(&str, &BackendConfig)> {
        let wanted = name.or(self.default_backend.as_deref());

        match wanted {
            Some(name) => self.backends.get_key_value(name).map(|(k, v)| (k.as_str(), v)),
            None => self.backends.first().map(|(k, v)| (k.as_str(), v)),
        }
    }
}

/// Configuration for a single LLM backend
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Wire protocol spoken by the backend
    #[serde(rename = "type")]
    pub backend_type: BackendType,
    /// Base URL that endpoint paths are appended to
    pub base_url: Url,
    /// Endpoint path overrides
    #[serde(default)]
    pub endpoints: EndpointConfig,
    /// Static headers added to every request
    #[serde(default)]
    pub headers: IndexMap<String, String>,
}

impl BackendConfig {
    /// Path for completion requests, honouring overrides
    pub fn completion_path(&self) -> &str {
        self.endpoints
            .completion
            .as_deref()
            .unwrap_or_else(|| self.backend_type.default_completion_path())
    }

    /// Path for chat requests, honouring overrides
    pub fn chat_path(&self) -> &str {
        self.endpoints
            .chat
            .as_deref()
            .unwrap_or_else(|| self.backend_type.default_chat_path())
    }

    /// Path for agent requests, honouring overrides
    pub fn agent_path(&self) -> &str {
        self.endpoints
            .agent
            .as_deref()
            .unwrap_or_else(|| self.backend_type.default_agent_path())
    }
}

/// Supported backend wire protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendType {
    /// Code-assistant backend with numeric status codes
    Nova,
    /// OpenAI-compatible API
    Openai,
}

impl BackendType {
    const fn default_completion_path(self) -> &'static str {
        match self {
            Self::Nova => "/llm/completions",
            Self::Openai => "/completions",
        }
    }

    const fn default_chat_path(self) -> &'static str {
        match self {
            Self::Nova => "/llm/chat-completions",
            Self::Openai => "/chat/completions",
        }
    }

    const fn default_agent_path(self) -> &'static str {
        match self {
            Self::Nova => "/llm/agent-completions",
            Self::Openai => "/chat/completions",
        }
    }
}

/// Per-request-kind endpoint paths
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    #[serde(default)]
    pub completion: Option<String>,
    #[serde(default)]
    pub chat: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
}

impl EndpointConfig {
    /// Iterate over the configured overrides
    pub fn overrides(&self) -> impl Iterator<Item = &str> {
        [&self.completion, &self.chat, &self.agent]
            .into_iter()
            .filter_map(|p| p.as_deref())
    }
}
