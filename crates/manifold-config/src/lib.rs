#![allow(clippy::must_use_candidate)]

//! Configuration for the Manifold gateway
//!
//! TOML-based with `{{ env.VAR }}` expansion, so secrets stay out of the
//! config file itself.

pub mod client;
pub mod compression;
mod env;
mod loader;
pub mod models;
pub mod policy;
pub mod provider;

use indexmap::IndexMap;
use serde::Deserialize;

pub use client::*;
pub use compression::*;
pub use models::*;
pub use policy::*;
pub use provider::*;

/// Top-level Manifold configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Provider configurations keyed by provider id
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
    /// Upstream HTTP client settings
    #[serde(default)]
    pub client: ClientConfig,
    /// Tool-result compression settings
    #[serde(default)]
    pub compression: CompressionConfig,
    /// Tool-invocation policies
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Model profiles for budget and cost calculations
    #[serde(default)]
    pub models: Vec<ModelProfileConfig>,
}
