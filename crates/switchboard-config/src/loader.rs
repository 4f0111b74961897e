use std::path::Path;
use std::time::Duration;

use crate::{Config, PROVIDER_TAGS};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
        Self::parse(&raw)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
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
    /// Returns an error for a zero timeout or an unknown provider tag
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_timeouts()?;
        self.validate_provider_tags()?;
        Ok(())
    }

    /// Timeout for calls to `tag`
    pub fn provider_timeout(&self, tag: &str) -> Duration {
        self.providers
            .get(tag)
            .and_then(|p| p.timeout)
            .unwrap_or(self.gateway.request_timeout)
    }

    fn validate_timeouts(&self) -> anyhow::Result<()> {
        if self.gateway.request_timeout.is_zero() {
            anyhow::bail!("gateway.request_timeout must be greater than 0");
        }
        for (tag, provider) in &self.providers {
            if provider.timeout.is_some_and(|t| t.is_zero()) {
                anyhow::bail!("providers.{tag}.timeout must be greater than 0");
            }
        }
        Ok(())
    }

    fn validate_provider_tags(&self) -> anyhow::Result<()> {
        let sections = [
            ("providers", self.providers.keys().collect::<Vec<_>>()),
            ("credentials", self.credentials.keys().collect()),
        ];
        for (section, tags) in sections {
            if let Some(unknown) = tags.into_iter().find(|tag| !PROVIDER_TAGS.contains(&tag.as_str())) {
                anyhow::bail!(
                    "unknown provider '{unknown}' in [{section}], expected one of: {}",
                    PROVIDER_TAGS.join(", ")
                );
            }
        }
        Ok(())
    }
}
