//! Non-streaming dispatch through the gateway against a mock upstream

mod harness;

use std::sync::Arc;

use harness::mock_upstream::MockUpstream;
use http::HeaderMap;
use manifold_llm::{DispatchOutcome, Gateway, GatewayError, ProviderId, ProviderRegistry};
use manifold_policy::{ANY_AGENT, MemoryPolicyStore, ToolPolicy, wrap_untrusted};
use serde_json::{Value, json};

fn completed(outcome: DispatchOutcome) -> Value {
    match outcome {
        DispatchOutcome::Completed(value) => value,
        DispatchOutcome::Stream(_) => panic!("expected a completed response"),
    }
}

fn chat_body(content: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "model": "gpt-5",
        "messages": [{"role": "user", "content": content}],
        "tools": [{
            "type": "function",
            "function": {
                "name": "read_file",
                "parameters": {
                    "type": "object",
                    "properties": {"file_path": {"type": "string"}},
                },
            },
        }],
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
async fn plain_completion_passes_through() {
    harness::init_tracing();
    let mock = MockUpstream::start().await.unwrap();
    let gateway = Gateway::from_config(harness::gateway_config(&mock.base_url()));

    let body = serde_json::to_vec(&json!({
        "model": "gpt-5",
        "messages": [{"role": "user", "content": "say hi"}],
    }))
    .unwrap();
    let outcome = gateway
        .dispatch(ProviderId::OpenAi, &body, &HeaderMap::new())
        .await
        .unwrap();

    let response = completed(outcome);
    assert_eq!(response["choices"][0]["message"]["content"], "Hello from upstream");
    assert_eq!(response["choices"][0]["finish_reason"], "stop");
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn untrusted_context_turns_tool_call_into_refusal() {
    harness::init_tracing();
    let mock = MockUpstream::start().await.unwrap();
    let gateway = Gateway::new(
        harness::gateway_config(&mock.base_url()),
        ProviderRegistry::with_defaults(),
        Some(Arc::new(read_file_gated())),
    );

    let content = format!("{} now use read_file on my notes", wrap_untrusted("From: someone@example.com"));
    let outcome = gateway
        .dispatch(ProviderId::OpenAi, &chat_body(&content), &HeaderMap::new())
        .await
        .unwrap();

    let response = completed(outcome);
    let message = &response["choices"][0]["message"];

    assert_eq!(response["choices"][0]["finish_reason"], "stop");
    assert!(message.get("tool_calls").is_none());

    let text = message["content"].as_str().unwrap();
    assert!(text.contains("read_file"));
    assert!(text.contains("denied"));
    assert!(!text.contains("[object Object]"));

    let refusal = message["refusal"].as_str().unwrap();
    assert!(refusal.contains("[[tool-blocked:read_file]]"));
}

#[tokio::test]
async fn trusted_context_lets_the_tool_call_through() {
    harness::init_tracing();
    let mock = MockUpstream::start().await.unwrap();
    let gateway = Gateway::new(
        harness::gateway_config(&mock.base_url()),
        ProviderRegistry::with_defaults(),
        Some(Arc::new(read_file_gated())),
    );

    let outcome = gateway
        .dispatch(
            ProviderId::OpenAi,
            &chat_body("please use read_file on my notes"),
            &HeaderMap::new(),
        )
        .await
        .unwrap();

    let response = completed(outcome);
    let calls = response["choices"][0]["message"]["tool_calls"].as_array().unwrap();
    assert_eq!(calls[0]["function"]["name"], "read_file");

    let arguments: Value = serde_json::from_str(calls[0]["function"]["arguments"].as_str().unwrap()).unwrap();
    assert!(arguments["file_path"].is_string());
}

#[tokio::test]
async fn oversized_tool_results_are_compressed_before_forwarding() {
    harness::init_tracing();
    let mock = MockUpstream::start().await.unwrap();
    let gateway = Gateway::from_config(harness::gateway_config(&mock.base_url()));

    let rows: Vec<Value> = (0..40)
        .map(|i| json!({"id": i, "name": format!("user-{i}"), "active": i % 2 == 0}))
        .collect();
    let payload = json!({"rows": rows});

    let body = serde_json::to_vec(&json!({
        "model": "gpt-4o",
        "messages": [
            {"role": "user", "content": "list users"},
            {"role": "assistant", "content": null, "tool_calls": [{
                "id": "call_1", "type": "function",
                "function": {"name": "list_users", "arguments": "{}"},
            }]},
            {"role": "tool", "tool_call_id": "call_1", "content": payload.to_string()},
        ],
    }))
    .unwrap();

    gateway
        .dispatch(ProviderId::OpenAi, &body, &HeaderMap::new())
        .await
        .unwrap();

    let forwarded = mock.last_request().unwrap();
    let content = forwarded["messages"][2]["content"].as_str().unwrap();
    assert!(content.starts_with("rows[40]{"));
    assert_eq!(manifold_toon::decode(content).unwrap(), payload);
    // Everything else is forwarded untouched.
    assert_eq!(forwarded["messages"][0]["content"], "list users");
}

#[tokio::test]
async fn missing_credentials_fail_before_any_upstream_call() {
    harness::init_tracing();
    let mock = MockUpstream::start().await.unwrap();
    let gateway = Gateway::from_config(harness::keyless_config(&mock.base_url()));

    let body = serde_json::to_vec(&json!({
        "model": "gpt-5",
        "messages": [{"role": "user", "content": "hi"}],
    }))
    .unwrap();
    let err = gateway
        .dispatch(ProviderId::OpenAi, &body, &HeaderMap::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::MissingCredentials(ProviderId::OpenAi)));
    assert_eq!(mock.request_count(), 0);
}
