use serde::Deserialize;
use thiserror::Error;

/// Policy configuration errors
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Invalid regex pattern in an argument rule
    #[error("invalid argument pattern: {0}")]
    InvalidPattern(String),
}

/// Policy for one tool of one agent
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolPolicy {
    /// Allow this tool while untrusted content is present in the
    /// conversation. Defaults to false: configuring a policy for a tool
    /// turns the untrusted gate on unless explicitly opened.
    #[serde(default)]
    pub allow_untrusted_context: bool,
    /// Argument-level rules evaluated on every invocation
    #[serde(default)]
    pub argument_rules: Vec<ArgumentRule>,
}

impl ToolPolicy {
    /// Validate that all rule patterns compile
    pub fn validate(&self) -> Result<(), PolicyError> {
        for rule in &self.argument_rules {
            rule.validate()?;
        }
        Ok(())
    }
}

/// A single argument-level rule
///
/// Rules inspect the named argument of the parsed invocation payload.
/// Arguments that are not strings never match; unparseable payloads are
/// handled by the evaluator before rules run.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArgumentRule {
    /// Block when a string argument starts with any of the given prefixes
    PathPrefixBlocklist {
        /// Argument key to inspect
        argument: String,
        /// Blocked path prefixes
        prefixes: Vec<String>,
    },
    /// Block when a string argument exactly matches any of the given values
    ValueBlocklist {
        /// Argument key to inspect
        argument: String,
        /// Blocked values
        values: Vec<String>,
    },
    /// Block when a string argument matches a regex pattern
    Pattern {
        /// Argument key to inspect
        argument: String,
        /// Regex pattern to match
        pattern: String,
    },
}

impl ArgumentRule {
    /// Validate that the rule's pattern compiles
    pub fn validate(&self) -> Result<(), PolicyError> {
        if let Self::Pattern { pattern, .. } = self {
            regex::Regex::new(pattern).map_err(|e| PolicyError::InvalidPattern(format!("{pattern}: {e}")))?;
        }
        Ok(())
    }

    /// Check the rule against parsed invocation arguments, returning a
    /// human-readable reason on match
    pub fn matches(&self, arguments: &serde_json::Value) -> Option<String> {
        match self {
            Self::PathPrefixBlocklist { argument, prefixes } => {
                let value = arguments.get(argument)?.as_str()?;
                prefixes
                    .iter()
                    .find(|prefix| value.starts_with(prefix.as_str()))
                    .map(|prefix| format!("argument `{argument}` is under blocked path `{prefix}`"))
            }
            Self::ValueBlocklist { argument, values } => {
                let value = arguments.get(argument)?.as_str()?;
                values
                    .iter()
                    .any(|blocked| blocked == value)
                    .then(|| format!("argument `{argument}` has a blocked value"))
            }
            Self::Pattern { argument, pattern } => {
                let value = arguments.get(argument)?.as_str()?;
                match regex::Regex::new(pattern) {
                    Ok(re) => re
                        .is_match(value)
                        .then(|| format!("argument `{argument}` matches blocked pattern `{pattern}`")),
                    Err(e) => {
                        // validation should have caught this at load time
                        tracing::warn!(error = %e, %pattern, "skipping uncompilable argument rule");
                        None
                    }
                }
            }
        }
    }
}
