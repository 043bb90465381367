use std::path::Path;

use crate::Config;

/// Upper bound for the proactive refresh lead time
const MAX_LEAD_TIME_SECS: u64 = 3600;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a placeholder cannot be
    /// expanded, the TOML is malformed, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let config = Self::from_toml(&raw)?;
        tracing::debug!(path = %path.display(), backends = config.llm.backends.len(), "configuration loaded");

        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if a placeholder cannot be expanded, the TOML is
    /// malformed, or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error describing the first inconsistency found
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_backends()?;
        self.validate_auth()?;
        self.validate_transport()?;
        Ok(())
    }

    fn validate_backends(&self) -> anyhow::Result<()> {
        if self.llm.backends.is_empty() {
            anyhow::bail!("at least one backend must be configured");
        }

        if let Some(name) = &self.llm.default_backend
            && !self.llm.backends.contains_key(name)
        {
            anyhow::bail!("default_backend '{name}' does not name a configured backend");
        }

        for (name, backend) in &self.llm.backends {
            for path in backend.endpoints.overrides() {
                if !path.starts_with('/') {
                    anyhow::bail!("endpoint path '{path}' for backend '{name}' must start with '/'");
                }
            }
        }

        Ok(())
    }

    fn validate_auth(&self) -> anyhow::Result<()> {
        if self.auth.identity.trim().is_empty() {
            anyhow::bail!("auth.identity must not be empty");
        }

        if self.auth.refresh_lead_time.as_secs() >= MAX_LEAD_TIME_SECS {
            anyhow::bail!("auth.refresh_lead_time must be shorter than one hour");
        }

        Ok(())
    }

    fn validate_transport(&self) -> anyhow::Result<()> {
        let transport = &self.transport;

        if transport.connect_timeout.is_zero()
            || transport.request_timeout.is_zero()
            || transport.stream_idle_timeout.is_zero()
        {
            anyhow::bail!("transport timeouts must be greater than zero");
        }

        Ok(())
    }
}
