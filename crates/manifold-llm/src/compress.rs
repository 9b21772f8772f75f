//! Tool-result compression
//!
//! Rewrites verbose JSON tool output into TOON when it would consume an
//! outsized share of the model's context window. Only the on-wire encoding
//! changes; the consumer-visible structure survives the round trip. Results
//! that are not JSON, or that would not shrink, are left alone, which also
//! makes the pass idempotent: TOON text fails the JSON parse on a second
//! run.

use manifold_config::CompressionConfig;
use manifold_core::CompressionStats;
use serde_json::Value;

use crate::adapter::RequestAdapter;
use crate::pricing::ModelProfiles;
use crate::tokenizer::count_tokens;

/// Compress every oversized tool result in the request
///
/// Applied before forwarding upstream; the returned stats are observational
/// and never read back into the request. When `hard_cap_tokens` is set,
/// results still above the cap after the compression decision are replaced
/// by a short elision marker so the conversation stays well formed.
pub fn compress_tool_results(
    request: &mut dyn RequestAdapter,
    config: &CompressionConfig,
    profiles: &ModelProfiles,
) -> CompressionStats {
    let mut stats = CompressionStats::default();
    if !config.enabled {
        return stats;
    }

    let model = request.model();
    let budget = token_budget(&model, config, profiles);
    let mut saved_tokens: u64 = 0;

    for result in request.tool_results() {
        stats.original_bytes += result.content.len() as u64;

        let Some((canonical, value)) = canonical_json(&result.content) else {
            // Not structured data; nothing to re-encode.
            stats.compressed_bytes += result.content.len() as u64;
            continue;
        };

        let original_tokens = count_tokens(&model, &canonical);
        let mut content = result.content.clone();
        let mut tokens = original_tokens;

        if original_tokens > budget {
            let toon = manifold_toon::encode(&value);
            let toon_tokens = count_tokens(&model, &toon);
            if toon_tokens < original_tokens {
                tracing::debug!(
                    tool = %result.name,
                    original_tokens,
                    toon_tokens,
                    "substituting TOON encoding for tool result"
                );
                saved_tokens += (original_tokens - toon_tokens) as u64;
                content = toon;
                tokens = toon_tokens;
                stats.compressed_count += 1;
            } else {
                tracing::debug!(
                    tool = %result.name,
                    original_tokens,
                    toon_tokens,
                    "TOON encoding would not shrink tool result, keeping original"
                );
            }
        }

        if let Some(cap) = config.hard_cap_tokens
            && tokens > cap as usize
        {
            tracing::warn!(tool = %result.name, tokens, cap, "tool result above hard cap, eliding");
            stats.removed_bytes += content.len() as u64;
            stats.removed_count += 1;
            content = elision_marker(&result.name, result.content.len());
        }

        stats.compressed_bytes += content.len() as u64;
        if content != result.content {
            request.update_tool_result(&result.id, content);
        }
    }

    if stats.compressed_count > 0 || stats.removed_count > 0 {
        let estimated_savings_usd = profiles.estimate_input_cost(&model, saved_tokens);
        tracing::info!(
            model = %model,
            compressed = stats.compressed_count,
            removed = stats.removed_count,
            saved_bytes = stats.saved_bytes(),
            saved_tokens,
            estimated_savings_usd,
            "compressed tool results"
        );
    }

    stats
}

/// Token budget one tool result may occupy before compression kicks in
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn token_budget(model: &str, config: &CompressionConfig, profiles: &ModelProfiles) -> usize {
    let floor = config.min_tokens as usize;
    profiles.context_window(model).map_or(floor, |window| {
        ((f64::from(window) * config.budget_share) as usize).max(floor)
    })
}

/// Parse tool content as JSON, unwrapping prior double-encoding
///
/// Tool plumbing sometimes serializes an already-serialized payload, so a
/// content string may parse to a JSON string that itself parses to the real
/// value. Returns the canonical serialized form alongside the value, or
/// `None` when the content is not JSON at all.
fn canonical_json(content: &str) -> Option<(String, Value)> {
    let mut value: Value = serde_json::from_str(content).ok()?;
    loop {
        let Value::String(inner) = &value else { break };
        match serde_json::from_str::<Value>(inner) {
            Ok(next) => value = next,
            Err(_) => break,
        }
    }
    Some((value.to_string(), value))
}

fn elision_marker(tool_name: &str, original_bytes: usize) -> String {
    serde_json::json!({
        "elided": true,
        "tool": tool_name,
        "original_bytes": original_bytes,
    })
    .to_string()
}
