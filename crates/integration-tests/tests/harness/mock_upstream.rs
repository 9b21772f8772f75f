//! Mock OpenAI-compatible upstream
//!
//! Captures every request body and returns canned completions. A user
//! message containing `use read_file` makes the model "call" that tool,
//! which is what the policy scenarios need; anything else gets a plain
//! text reply. Streaming requests get the same content split across SSE
//! chunks in the provider's wire form.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::{Json, Router, routing};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// A running mock upstream
pub struct MockUpstream {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    requests: Mutex<Vec<Value>>,
}

impl MockUpstream {
    /// Bind to an ephemeral port and start serving
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat_completions))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for configuring the mock as a provider
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// The most recent request body the mock received
    pub fn last_request(&self) -> Option<Value> {
        self.state.requests.lock().unwrap().last().cloned()
    }

    /// Number of requests received
    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_chat_completions(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> axum::response::Response {
    state.requests.lock().unwrap().push(body.clone());

    let wants_tool = body["messages"]
        .as_array()
        .is_some_and(|messages| {
            messages
                .iter()
                .any(|msg| msg["content"].as_str().is_some_and(|c| c.contains("use read_file")))
        });
    let streaming = body["stream"].as_bool().unwrap_or(false);
    let model = body["model"].as_str().unwrap_or("gpt-5").to_owned();

    if streaming {
        let frames = if wants_tool {
            tool_stream_frames(&model)
        } else {
            text_stream_frames(&model)
        };
        (
            [(header::CONTENT_TYPE, "text/event-stream")],
            frames.concat(),
        )
            .into_response()
    } else if wants_tool {
        Json(tool_response(&model)).into_response()
    } else {
        Json(text_response(&model)).into_response()
    }
}

fn text_response(model: &str) -> Value {
    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "Hello from upstream"},
            "finish_reason": "stop",
        }],
        "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16},
    })
}

fn tool_response(model: &str) -> Value {
    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {
                        "name": "read_file",
                        "arguments": "{\"file_path\": \"/home/user/notes.txt\"}",
                    },
                }],
            },
            "finish_reason": "tool_calls",
        }],
        "usage": {"prompt_tokens": 20, "completion_tokens": 9, "total_tokens": 29},
    })
}

fn frame(payload: &Value) -> String {
    format!("data: {payload}\n\n")
}

fn text_stream_frames(model: &str) -> Vec<String> {
    vec![
        frame(&json!({
            "id": "chatcmpl-mock", "object": "chat.completion.chunk", "model": model,
            "choices": [{"index": 0, "delta": {"role": "assistant", "content": ""}}],
        })),
        frame(&json!({
            "id": "chatcmpl-mock", "object": "chat.completion.chunk", "model": model,
            "choices": [{"index": 0, "delta": {"content": "Hello"}}],
        })),
        frame(&json!({
            "id": "chatcmpl-mock", "object": "chat.completion.chunk", "model": model,
            "choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}],
        })),
        frame(&json!({
            "id": "chatcmpl-mock", "object": "chat.completion.chunk", "model": model,
            "choices": [],
            "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16},
        })),
        "data: [DONE]\n\n".to_owned(),
    ]
}

fn tool_stream_frames(model: &str) -> Vec<String> {
    vec![
        frame(&json!({
            "id": "chatcmpl-mock", "object": "chat.completion.chunk", "model": model,
            "choices": [{"index": 0, "delta": {"role": "assistant", "content": ""}}],
        })),
        frame(&json!({
            "id": "chatcmpl-mock", "object": "chat.completion.chunk", "model": model,
            "choices": [{"index": 0, "delta": {"tool_calls": [{
                "index": 0, "id": "call_1", "type": "function",
                "function": {"name": "read_file", "arguments": "{\"file_path\":"},
            }]}}],
        })),
        frame(&json!({
            "id": "chatcmpl-mock", "object": "chat.completion.chunk", "model": model,
            "choices": [{"index": 0, "delta": {"tool_calls": [{
                "index": 0,
                "function": {"arguments": " \"/home/user/notes.txt\"}"},
            }]}}],
        })),
        frame(&json!({
            "id": "chatcmpl-mock", "object": "chat.completion.chunk", "model": model,
            "choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}],
        })),
        "data: [DONE]\n\n".to_owned(),
    ]
}
