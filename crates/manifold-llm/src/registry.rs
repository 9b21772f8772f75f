//! Provider registry: a flat map from identifier to dialect

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::provider::{AnthropicDialect, DeepSeekDialect, GeminiDialect, OllamaDialect, OpenAiDialect, ProviderDialect};

/// Supported upstream providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString, strum::EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderId {
    /// `OpenAI` chat completions
    OpenAi,
    /// Anthropic messages
    Anthropic,
    /// Google Gemini `generateContent`
    Gemini,
    /// DeepSeek, `OpenAI`-compatible
    DeepSeek,
    /// Ollama local daemon, `OpenAI`-compatible
    Ollama,
}

/// Maps provider identifiers to their dialects
///
/// Flat and structural: registering a dialect is the only way behavior
/// enters the gateway, and one identifier maps to exactly one dialect.
pub struct ProviderRegistry {
    dialects: HashMap<ProviderId, Arc<dyn ProviderDialect>>,
}

impl ProviderRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            dialects: HashMap::new(),
        }
    }

    /// Registry with all built-in dialects
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(OpenAiDialect));
        registry.register(Arc::new(AnthropicDialect));
        registry.register(Arc::new(GeminiDialect));
        registry.register(Arc::new(DeepSeekDialect::new()));
        registry.register(Arc::new(OllamaDialect::new()));
        registry
    }

    /// Register a dialect under its own identifier, replacing any previous
    /// registration
    pub fn register(&mut self, dialect: Arc<dyn ProviderDialect>) {
        self.dialects.insert(dialect.id(), dialect);
    }

    /// Dialect for one provider
    pub fn get(&self, id: ProviderId) -> Result<Arc<dyn ProviderDialect>, GatewayError> {
        self.dialects
            .get(&id)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownProvider(id.to_string()))
    }

    /// Dialect for a provider named by string, as routing layers deliver it
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ProviderDialect>, GatewayError> {
        let id = ProviderId::from_str(name).map_err(|_| GatewayError::UnknownProvider(name.to_owned()))?;
        self.get(id)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
