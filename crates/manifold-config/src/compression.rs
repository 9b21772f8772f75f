use serde::Deserialize;

/// Tool-result compression settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompressionConfig {
    /// Whether tool results are compressed before forwarding upstream
    #[serde(default = "crate::provider::default_true")]
    pub enabled: bool,
    /// Results at or below this token count are never touched
    #[serde(default = "default_min_tokens")]
    pub min_tokens: u32,
    /// Fraction of the model's context window one tool result may occupy
    /// before compression kicks in
    #[serde(default = "default_budget_share")]
    pub budget_share: f64,
    /// Hard ceiling in tokens. A result still above this after the
    /// compression decision is elided entirely. Off when unset.
    #[serde(default)]
    pub hard_cap_tokens: Option<u32>,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_tokens: default_min_tokens(),
            budget_share: default_budget_share(),
            hard_cap_tokens: None,
        }
    }
}

const fn default_min_tokens() -> u32 {
    500
}

const fn default_budget_share() -> f64 {
    0.1
}
