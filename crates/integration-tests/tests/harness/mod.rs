//! Shared fixtures for gateway integration tests
#![allow(dead_code)]

pub mod mock_upstream;

use manifold_config::Config;

/// Install a test subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Gateway configuration pointed at a mock upstream
///
/// Compression thresholds are aggressive so small fixtures exercise the
/// compressor without megabyte payloads.
pub fn gateway_config(base_url: &str) -> Config {
    let toml = format!(
        r#"
[providers.openai]
api_key = "sk-test"
base_url = "{base_url}"

[compression]
min_tokens = 10
budget_share = 0.0001
"#
    );
    Config::from_toml_str(&toml).expect("valid test config")
}

/// Configuration with no credentials at all
pub fn keyless_config(base_url: &str) -> Config {
    let toml = format!(
        r#"
[providers.openai]
base_url = "{base_url}"
"#
    );
    Config::from_toml_str(&toml).expect("valid test config")
}
