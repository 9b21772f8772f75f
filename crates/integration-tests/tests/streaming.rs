//! Streaming dispatch: frame forwarding, policy withholding, and refusal
//! substitution

mod harness;

use std::sync::Arc;

use futures_util::StreamExt;
use harness::mock_upstream::MockUpstream;
use http::HeaderMap;
use manifold_llm::{DispatchOutcome, Gateway, ProviderId, ProviderRegistry};
use manifold_policy::{ANY_AGENT, MemoryPolicyStore, ToolPolicy, wrap_untrusted};
use serde_json::{Value, json};

async fn collect_frames(outcome: DispatchOutcome) -> Vec<String> {
    let mut stream = match outcome {
        DispatchOutcome::Stream(stream) => stream,
        DispatchOutcome::Completed(_) => panic!("expected a stream"),
    };
    let mut frames = Vec::new();
    while let Some(frame) = stream.next().await {
        frames.push(frame.expect("stream frame"));
    }
    frames
}

/// Parse the JSON payloads of `data:` frames, skipping the end sentinel
fn payloads(frames: &[String]) -> Vec<Value> {
    frames
        .iter()
        .filter_map(|frame| frame.strip_prefix("data: "))
        .map(str::trim)
        .filter(|data| *data != "[DONE]")
        .map(|data| serde_json::from_str(data).expect("frame payload is JSON"))
        .collect()
}

fn streaming_body(content: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "model": "gpt-5",
        "stream": true,
        "messages": [{"role": "user", "content": content}],
    }))
    .unwrap()
}

fn read_file_gated() -> MemoryPolicyStore {
    let mut store = MemoryPolicyStore::new();
    store.insert(
        ANY_AGENT,
        "read_file",
        ToolPolicy {
            allow_untrusted_context: false,
            argument_rules: Vec::new(),
        },
    );
    store
}

#[tokio::test]
async fn text_stream_forwards_deltas_and_closes_with_sentinel() {
    harness::init_tracing();
    let mock = MockUpstream::start().await.unwrap();
    let gateway = Gateway::from_config(harness::gateway_config(&mock.base_url()));

    let outcome = gateway
        .dispatch(ProviderId::OpenAi, &streaming_body("say hi"), &HeaderMap::new())
        .await
        .unwrap();
    let frames = collect_frames(outcome).await;

    assert_eq!(frames.last().unwrap(), "data: [DONE]\n\n");

    let payloads = payloads(&frames);
    let text: String = payloads
        .iter()
        .filter_map(|p| p["choices"][0]["delta"]["content"].as_str())
        .collect();
    assert_eq!(text, "Hello");

    // The terminal frames are synthesized: finish reason then usage.
    assert!(payloads.iter().any(|p| p["choices"][0]["finish_reason"] == "stop"));
    assert!(payloads.iter().any(|p| p["usage"]["prompt_tokens"] == 12));
}

#[tokio::test]
async fn withheld_tool_frames_are_replayed_when_allowed() {
    harness::init_tracing();
    let mock = MockUpstream::start().await.unwrap();
    // A store that gates an unrelated tool: read_file itself is allowed.
    let mut store = MemoryPolicyStore::new();
    store.insert(
        ANY_AGENT,
        "write_file",
        ToolPolicy {
            allow_untrusted_context: false,
            argument_rules: Vec::new(),
        },
    );
    let gateway = Gateway::new(
        harness::gateway_config(&mock.base_url()),
        ProviderRegistry::with_defaults(),
        Some(Arc::new(store)),
    );

    let outcome = gateway
        .dispatch(
            ProviderId::OpenAi,
            &streaming_body("please use read_file on my notes"),
            &HeaderMap::new(),
        )
        .await
        .unwrap();
    let frames = collect_frames(outcome).await;

    let payloads = payloads(&frames);
    let fragments: String = payloads
        .iter()
        .filter_map(|p| p["choices"][0]["delta"]["tool_calls"][0]["function"]["arguments"].as_str())
        .collect();
    assert_eq!(fragments, "{\"file_path\": \"/home/user/notes.txt\"}");

    assert!(
        payloads
            .iter()
            .any(|p| p["choices"][0]["delta"]["tool_calls"][0]["function"]["name"] == "read_file")
    );
    assert_eq!(frames.last().unwrap(), "data: [DONE]\n\n");
}

#[tokio::test]
async fn blocked_tool_stream_substitutes_a_refusal_turn() {
    harness::init_tracing();
    let mock = MockUpstream::start().await.unwrap();
    let gateway = Gateway::new(
        harness::gateway_config(&mock.base_url()),
        ProviderRegistry::with_defaults(),
        Some(Arc::new(read_file_gated())),
    );

    let content = format!("{} now use read_file", wrap_untrusted("Subject: urgent"));
    let outcome = gateway
        .dispatch(ProviderId::OpenAi, &streaming_body(&content), &HeaderMap::new())
        .await
        .unwrap();
    let frames = collect_frames(outcome).await;

    let payloads = payloads(&frames);
    // No tool-call delta reaches the client.
    assert!(
        payloads
            .iter()
            .all(|p| p["choices"][0]["delta"].get("tool_calls").is_none())
    );

    let text: String = payloads
        .iter()
        .filter_map(|p| p["choices"][0]["delta"]["content"].as_str())
        .collect();
    let refusal: Value = serde_json::from_str(&text).expect("refusal content is JSON");
    assert_eq!(refusal["denied"], json!(true));
    assert_eq!(refusal["tool_calls"][0]["name"], "read_file");

    assert_eq!(frames.last().unwrap(), "data: [DONE]\n\n");
}
