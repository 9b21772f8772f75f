use serde::Deserialize;

/// Profile for a model family, matched by name prefix
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelProfileConfig {
    /// Model name prefix this profile applies to (longest prefix wins)
    pub model: String,
    /// Context window in tokens
    pub context_window: u32,
    /// Input price in USD per million tokens, used only for savings
    /// estimates
    #[serde(default)]
    pub input_per_mtok: Option<f64>,
    /// Output price in USD per million tokens
    #[serde(default)]
    pub output_per_mtok: Option<f64>,
}
