//! Model profiles: context windows and per-token pricing
//!
//! The compressor needs a context window to size its token budget, and uses
//! the input price to log an estimated saving. Profiles are matched by name
//! prefix so one entry covers a model family's dated snapshots; config
//! entries take precedence over the built-in table.

use manifold_config::ModelProfileConfig;

/// Budget-relevant facts about one model family
#[derive(Debug, Clone, Copy)]
pub struct ModelProfile {
    /// Context window in tokens
    pub context_window: u32,
    /// Input price in USD per million tokens
    pub input_per_mtok: Option<f64>,
    /// Output price in USD per million tokens
    pub output_per_mtok: Option<f64>,
}

/// Built-in profiles, matched by prefix
///
/// Prices drift; these only feed log-line estimates, so staleness is
/// harmless.
const BUILT_IN: &[(&str, ModelProfile)] = &[
    (
        "gpt-5",
        ModelProfile {
            context_window: 400_000,
            input_per_mtok: Some(1.25),
            output_per_mtok: Some(10.0),
        },
    ),
    (
        "gpt-4o-mini",
        ModelProfile {
            context_window: 128_000,
            input_per_mtok: Some(0.15),
            output_per_mtok: Some(0.60),
        },
    ),
    (
        "gpt-4o",
        ModelProfile {
            context_window: 128_000,
            input_per_mtok: Some(2.50),
            output_per_mtok: Some(10.0),
        },
    ),
    (
        "gpt-4.1",
        ModelProfile {
            context_window: 1_047_576,
            input_per_mtok: Some(2.0),
            output_per_mtok: Some(8.0),
        },
    ),
    (
        "claude-opus-4",
        ModelProfile {
            context_window: 200_000,
            input_per_mtok: Some(15.0),
            output_per_mtok: Some(75.0),
        },
    ),
    (
        "claude-sonnet-4",
        ModelProfile {
            context_window: 200_000,
            input_per_mtok: Some(3.0),
            output_per_mtok: Some(15.0),
        },
    ),
    (
        "claude-3-5-haiku",
        ModelProfile {
            context_window: 200_000,
            input_per_mtok: Some(0.80),
            output_per_mtok: Some(4.0),
        },
    ),
    (
        "gemini-2.5-pro",
        ModelProfile {
            context_window: 1_048_576,
            input_per_mtok: Some(1.25),
            output_per_mtok: Some(10.0),
        },
    ),
    (
        "gemini-2.5-flash",
        ModelProfile {
            context_window: 1_048_576,
            input_per_mtok: Some(0.30),
            output_per_mtok: Some(2.50),
        },
    ),
    (
        "deepseek-chat",
        ModelProfile {
            context_window: 65_536,
            input_per_mtok: Some(0.27),
            output_per_mtok: Some(1.10),
        },
    ),
    (
        "deepseek-reasoner",
        ModelProfile {
            context_window: 65_536,
            input_per_mtok: Some(0.55),
            output_per_mtok: Some(2.19),
        },
    ),
];

/// Prefix-matched model profile table
pub struct ModelProfiles {
    // longest prefix first, so lookup can take the first match
    entries: Vec<(String, ModelProfile)>,
}

impl ModelProfiles {
    /// Built-in table only
    pub fn built_in() -> Self {
        Self::with_overrides(&[])
    }

    /// Built-in table plus config entries, config winning on equal prefixes
    pub fn with_overrides(configs: &[ModelProfileConfig]) -> Self {
        let mut entries: Vec<(String, ModelProfile)> = configs
            .iter()
            .map(|config| {
                (
                    config.model.clone(),
                    ModelProfile {
                        context_window: config.context_window,
                        input_per_mtok: config.input_per_mtok,
                        output_per_mtok: config.output_per_mtok,
                    },
                )
            })
            .collect();

        for (prefix, profile) in BUILT_IN {
            if !entries.iter().any(|(existing, _)| existing == prefix) {
                entries.push(((*prefix).to_owned(), *profile));
            }
        }

        entries.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Self { entries }
    }

    /// Profile whose prefix matches `model`, longest prefix winning
    pub fn lookup(&self, model: &str) -> Option<&ModelProfile> {
        self.entries
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix.as_str()))
            .map(|(_, profile)| profile)
    }

    /// Context window for `model`
    pub fn context_window(&self, model: &str) -> Option<u32> {
        self.lookup(model).map(|profile| profile.context_window)
    }

    /// Estimated input cost in USD for `tokens` tokens of `model`
    ///
    /// `None` when the model or its price is unknown; a missing price is
    /// not an error, only a skipped estimate.
    #[allow(clippy::cast_precision_loss)]
    pub fn estimate_input_cost(&self, model: &str, tokens: u64) -> Option<f64> {
        let price = self.lookup(model)?.input_per_mtok?;
        Some(tokens as f64 * price / 1_000_000.0)
    }
}

impl Default for ModelProfiles {
    fn default() -> Self {
        Self::built_in()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins() {
        let profiles = ModelProfiles::built_in();

        // "gpt-4o-mini-2024-07-18" matches both "gpt-4o" and "gpt-4o-mini".
        let mini = profiles.lookup("gpt-4o-mini-2024-07-18").unwrap();
        assert!((mini.input_per_mtok.unwrap() - 0.15).abs() < f64::EPSILON);

        let full = profiles.lookup("gpt-4o-2024-11-20").unwrap();
        assert!((full.input_per_mtok.unwrap() - 2.50).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_model_has_no_profile() {
        let profiles = ModelProfiles::built_in();
        assert!(profiles.lookup("in-house-llama").is_none());
        assert!(profiles.estimate_input_cost("in-house-llama", 1000).is_none());
    }

    #[test]
    fn config_entries_override_built_ins() {
        let profiles = ModelProfiles::with_overrides(&[ModelProfileConfig {
            model: "gpt-4o".to_owned(),
            context_window: 64_000,
            input_per_mtok: Some(1.0),
            output_per_mtok: None,
        }]);

        assert_eq!(profiles.context_window("gpt-4o-2024-11-20"), Some(64_000));
        let cost = profiles.estimate_input_cost("gpt-4o", 2_000_000).unwrap();
        assert!((cost - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cost_estimate_scales_with_tokens() {
        let profiles = ModelProfiles::built_in();
        let small = profiles.estimate_input_cost("claude-sonnet-4-20250514", 1_000).unwrap();
        let large = profiles.estimate_input_cost("claude-sonnet-4-20250514", 10_000).unwrap();
        assert!(large > small);
    }
}
