use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Configuration for a single upstream provider
///
/// Every field is optional: an absent provider section still works with
/// the provider's default base URL and a client-forwarded API key.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API key for authentication
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Prefer the client's own credentials over the configured key
    #[serde(default = "default_true")]
    pub forward_authorization: bool,
}

pub(crate) const fn default_true() -> bool {
    true
}
