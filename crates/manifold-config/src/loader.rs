use std::collections::HashSet;
use std::path::Path;

use crate::Config;

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

        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a raw TOML string
    ///
    /// # Errors
    ///
    /// Returns an error if variable expansion, parsing, or validation fails
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
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
    /// Returns an error if compression bounds, policy rules, or model
    /// profiles are invalid
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_compression()?;
        self.validate_policy()?;
        self.validate_models()?;
        Ok(())
    }

    fn validate_compression(&self) -> anyhow::Result<()> {
        let share = self.compression.budget_share;
        if !(share > 0.0 && share <= 1.0) {
            anyhow::bail!("compression.budget_share must be within (0, 1], got {share}");
        }

        Ok(())
    }

    /// Validate per-agent tool policies, including argument rule patterns
    fn validate_policy(&self) -> anyhow::Result<()> {
        for (agent, agent_policy) in &self.policy.agents {
            for (tool, tool_policy) in &agent_policy.tools {
                tool_policy
                    .validate()
                    .map_err(|e| anyhow::anyhow!("invalid policy for agent '{agent}', tool '{tool}': {e}"))?;
            }
        }

        Ok(())
    }

    fn validate_models(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();

        for profile in &self.models {
            if profile.context_window == 0 {
                anyhow::bail!("model profile '{}' must have a non-zero context_window", profile.model);
            }
            if !seen.insert(profile.model.as_str()) {
                anyhow::bail!("duplicate model profile prefix '{}'", profile.model);
            }
        }

        Ok(())
    }
}
