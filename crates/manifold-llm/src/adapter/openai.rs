//! `OpenAI` chat-completions adapters, shared by the DeepSeek and Ollama
//! dialects

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use manifold_core::{Content, ContentPart, Message, Role, ToolCall, ToolDefinition, ToolResult, Usage, sse};
use serde_json::{Value, json};

use super::{ChunkDisposition, EmittedFrame, RequestAdapter, ResponseAdapter, StreamAdapter, correlate_tool_names, parse_role};
use crate::accumulator::StreamAccumulator;
use crate::error::GatewayError;
use crate::protocol::openai::{OpenAiContent, OpenAiContentPart, OpenAiMessage, OpenAiRequest, OpenAiResponse, OpenAiStreamChunk};

/// Seconds since the Unix epoch, used for synthesized response metadata
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// -- Request adapter --

/// Wraps one `OpenAI`-native chat completion request
pub struct OpenAiRequestAdapter {
    raw: Value,
    parsed: OpenAiRequest,
    model_override: Option<String>,
    tool_result_updates: HashMap<String, String>,
}

impl OpenAiRequestAdapter {
    /// Parse a raw request body
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidRequest` when the body is not valid
    /// JSON or does not match the chat-completions schema.
    pub fn parse(body: &[u8]) -> Result<Self, GatewayError> {
        let raw: Value = serde_json::from_slice(body)
            .map_err(|e| GatewayError::InvalidRequest(format!("request body is not valid JSON: {e}")))?;
        let parsed: OpenAiRequest = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::InvalidRequest(format!("failed to parse chat completion request: {e}")))?;

        Ok(Self {
            raw,
            parsed,
            model_override: None,
            tool_result_updates: HashMap::new(),
        })
    }
}

impl RequestAdapter for OpenAiRequestAdapter {
    fn model(&self) -> String {
        self.model_override.clone().unwrap_or_else(|| self.parsed.model.clone())
    }

    fn is_streaming(&self) -> bool {
        self.parsed.stream.unwrap_or(false)
    }

    fn messages(&self) -> Vec<Message> {
        let mut messages: Vec<Message> = self.parsed.messages.iter().map(convert_message).collect();
        correlate_tool_names(&mut messages);
        messages
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        self.parsed
            .tools
            .iter()
            .flatten()
            .map(|tool| ToolDefinition {
                name: tool.function.name.clone(),
                description: tool.function.description.clone(),
                input_schema: tool.function.parameters.clone(),
            })
            .collect()
    }

    fn set_model(&mut self, model: &str) {
        self.model_override = Some(model.to_owned());
    }

    fn update_tool_result(&mut self, tool_call_id: &str, new_content: String) {
        self.tool_result_updates.insert(tool_call_id.to_owned(), new_content);
    }

    fn to_provider_request(&self) -> Value {
        let mut out = self.raw.clone();

        if let Some(model) = &self.model_override {
            out["model"] = Value::String(model.clone());
        }

        if !self.tool_result_updates.is_empty()
            && let Some(messages) = out.get_mut("messages").and_then(Value::as_array_mut)
        {
            for message in messages {
                let Some(obj) = message.as_object_mut() else { continue };
                if obj.get("role").and_then(Value::as_str) != Some("tool") {
                    continue;
                }
                let update = obj
                    .get("tool_call_id")
                    .and_then(Value::as_str)
                    .and_then(|id| self.tool_result_updates.get(id));
                if let Some(new_content) = update {
                    obj.insert("content".to_owned(), Value::String(new_content.clone()));
                }
            }
        }

        out
    }
}

/// Convert one wire message to the canonical shape
fn convert_message(msg: &OpenAiMessage) -> Message {
    let role = parse_role(&msg.role);

    let content = match &msg.content {
        None => Content::default(),
        Some(OpenAiContent::Text(text)) => Content::Text(text.clone()),
        Some(OpenAiContent::Parts(parts)) => Content::Parts(
            parts
                .iter()
                .map(|part| match part {
                    OpenAiContentPart::Text { text } => ContentPart::Text { text: text.clone() },
                    OpenAiContentPart::ImageUrl { image_url } => ContentPart::Image {
                        url: image_url.url.clone(),
                        detail: image_url.detail.clone(),
                    },
                    OpenAiContentPart::Refusal { refusal } => ContentPart::Refusal {
                        refusal: refusal.clone(),
                    },
                })
                .collect(),
        ),
    };

    let tool_calls = msg.tool_calls.as_ref().map(|calls| {
        calls
            .iter()
            .map(|call| ToolCall {
                id: call.id.clone(),
                name: call.function.name.clone(),
                arguments: ToolCall::parse_arguments(&call.function.arguments),
            })
            .collect()
    });

    // A tool-role message is the result of exactly one call; the legacy
    // function role correlates by name instead of id.
    let tool_results = match role {
        Role::Tool => Some(vec![ToolResult {
            id: msg.tool_call_id.clone().unwrap_or_default(),
            name: "unknown".to_owned(),
            content: content.as_text(),
            is_error: false,
        }]),
        Role::Function => Some(vec![ToolResult {
            id: msg.name.clone().unwrap_or_default(),
            name: msg.name.clone().unwrap_or_else(|| "unknown".to_owned()),
            content: content.as_text(),
            is_error: false,
        }]),
        _ => None,
    };

    Message {
        role,
        content,
        tool_calls,
        tool_results,
    }
}

// -- Response adapter --

/// Wraps one completed `OpenAI` chat completion response
pub struct OpenAiResponseAdapter {
    raw: Value,
    parsed: OpenAiResponse,
}

impl OpenAiResponseAdapter {
    /// Wrap a raw provider response
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Upstream` when the body does not match the
    /// chat-completions response schema.
    pub fn parse(raw: Value) -> Result<Self, GatewayError> {
        let parsed: OpenAiResponse = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::Upstream(format!("failed to parse provider response: {e}")))?;
        Ok(Self { raw, parsed })
    }
}

impl ResponseAdapter for OpenAiResponseAdapter {
    fn id(&self) -> String {
        self.parsed.id.clone()
    }

    fn model(&self) -> String {
        self.parsed.model.clone()
    }

    fn text(&self) -> String {
        self.parsed
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default()
    }

    fn tool_calls(&self) -> Vec<ToolCall> {
        self.parsed
            .choices
            .first()
            .and_then(|choice| choice.message.tool_calls.as_ref())
            .into_iter()
            .flatten()
            .map(|call| ToolCall {
                id: call.id.clone(),
                name: call.function.name.clone(),
                arguments: ToolCall::parse_arguments(&call.function.arguments),
            })
            .collect()
    }

    fn usage(&self) -> Usage {
        self.parsed.usage.map_or_else(Usage::default, |usage| Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }

    fn finish_reasons(&self) -> Vec<String> {
        self.parsed
            .choices
            .iter()
            .filter_map(|choice| choice.finish_reason.clone())
            .collect()
    }

    fn to_provider_response(&self) -> Value {
        self.raw.clone()
    }

    fn to_refusal_response(&self, refusal_message: &str, content_message: &str) -> Value {
        json!({
            "id": self.parsed.id,
            "object": "chat.completion",
            "created": self.raw.get("created").cloned().unwrap_or_else(|| json!(unix_now())),
            "model": self.parsed.model,
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": content_message,
                    "refusal": refusal_message,
                },
                "finish_reason": "stop",
            }],
            "usage": self.raw.get("usage").cloned().unwrap_or_else(|| {
                json!({"prompt_tokens": 0, "completion_tokens": 0, "total_tokens": 0})
            }),
        })
    }
}

// -- Stream adapter --

/// Reconstructs one `OpenAI` streamed completion
#[derive(Default)]
pub struct OpenAiStreamAdapter {
    acc: StreamAccumulator,
}

impl OpenAiStreamAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn response_id(&self) -> String {
        self.acc
            .response_id()
            .map_or_else(|| format!("chatcmpl-{}", unix_now()), str::to_owned)
    }

    /// Synthesize one chunk in the provider's streaming envelope
    fn chunk(&self, choices: Value, usage: Option<Usage>) -> Value {
        let mut chunk = json!({
            "id": self.response_id(),
            "object": "chat.completion.chunk",
            "created": unix_now(),
            "model": self.acc.model().unwrap_or_default(),
            "choices": choices,
        });
        if let Some(usage) = usage {
            chunk["usage"] = json!({
                "prompt_tokens": usage.input_tokens,
                "completion_tokens": usage.output_tokens,
                "total_tokens": usage.total_tokens(),
            });
        }
        chunk
    }
}

impl StreamAdapter for OpenAiStreamAdapter {
    fn ingest(&mut self, data: &str) -> ChunkDisposition {
        let mut disposition = ChunkDisposition::default();
        let data = data.trim();
        if data.is_empty() {
            return disposition;
        }
        if data == "[DONE]" {
            self.acc.mark_final();
            disposition.finished = true;
            return disposition;
        }

        let chunk: OpenAiStreamChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(error = %e, data = %data, "skipping unparseable SSE chunk");
                return disposition;
            }
        };

        self.acc.mark_chunk();
        self.acc.record_identity(chunk.id.as_deref(), chunk.model.as_deref());

        if let Some(usage) = chunk.usage {
            self.acc.record_usage(Usage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            });
            if chunk.choices.is_empty() {
                // Terminal usage-only chunk
                self.acc.mark_final();
                disposition.finished = true;
                return disposition;
            }
        }

        let mut has_text = false;
        let mut has_tool_fragment = false;
        let mut has_role = false;

        for choice in &chunk.choices {
            if let Some(reason) = &choice.finish_reason {
                self.acc.record_stop_reason(reason);
                disposition.finished = true;
            }

            let delta = &choice.delta;
            if let Some(text) = &delta.content {
                self.acc.append_text(text);
                has_text = true;
            }
            if delta.refusal.is_some() {
                has_text = true;
            }
            if delta.role.is_some() {
                has_role = true;
            }
            if let Some(fragments) = &delta.tool_calls {
                for fragment in fragments {
                    let (name, arguments) = fragment
                        .function
                        .as_ref()
                        .map_or((None, None), |f| (f.name.as_deref(), f.arguments.as_deref()));
                    self.acc
                        .merge_tool_fragment(fragment.index, fragment.id.as_deref(), name, arguments);
                    has_tool_fragment = true;
                }
            }
        }

        if has_tool_fragment {
            let frame = sse::raw_data_frame(data);
            self.acc.push_raw_tool_event(frame.clone());
            disposition.frames.push(EmittedFrame::tool_call(frame));
        } else if has_text {
            disposition.frames.push(EmittedFrame::text(sse::raw_data_frame(data)));
        } else if has_role {
            disposition.frames.push(EmittedFrame::control(sse::raw_data_frame(data)));
        }

        disposition
    }

    fn accumulator(&self) -> &StreamAccumulator {
        &self.acc
    }

    fn to_provider_response(&self) -> Value {
        let text = self.acc.text();
        let mut message = json!({"role": "assistant", "content": text});

        if self.acc.has_tool_calls() {
            if text.is_empty() {
                message["content"] = Value::Null;
            }
            let calls: Vec<Value> = self
                .acc
                .drafts()
                .map(|draft| {
                    json!({
                        "id": draft.id,
                        "type": "function",
                        "function": {"name": draft.name, "arguments": draft.arguments},
                    })
                })
                .collect();
            message["tool_calls"] = json!(calls);
        }

        let usage = self.acc.usage().unwrap_or_default();
        json!({
            "id": self.response_id(),
            "object": "chat.completion",
            "created": unix_now(),
            "model": self.acc.model().unwrap_or_default(),
            "choices": [{
                "index": 0,
                "message": message,
                "finish_reason": self.acc.stop_reason().unwrap_or("stop"),
            }],
            "usage": {
                "prompt_tokens": usage.input_tokens,
                "completion_tokens": usage.output_tokens,
                "total_tokens": usage.total_tokens(),
            },
        })
    }

    fn text_delta_frame(&self, text: &str) -> String {
        let chunk = self.chunk(
            json!([{"index": 0, "delta": {"content": text}, "finish_reason": null}]),
            None,
        );
        sse::data_frame(&chunk)
    }

    fn complete_text_frames(&self, text: &str) -> Vec<String> {
        let open = self.chunk(
            json!([{"index": 0, "delta": {"role": "assistant", "content": ""}, "finish_reason": null}]),
            None,
        );
        vec![sse::data_frame(&open), self.text_delta_frame(text)]
    }

    fn end_frames(&self) -> Vec<String> {
        let finish = self.chunk(
            json!([{"index": 0, "delta": {}, "finish_reason": self.acc.stop_reason().unwrap_or("stop")}]),
            None,
        );
        let mut frames = vec![sse::data_frame(&finish)];
        if let Some(usage) = self.acc.usage() {
            frames.push(sse::data_frame(&self.chunk(json!([]), Some(usage))));
        }
        frames.push(sse::DONE_FRAME.to_owned());
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::FrameKind;

    fn request_body() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "model": "gpt-5",
            "stream": false,
            "temperature": 0.2,
            "messages": [
                {"role": "user", "content": "read the config"},
                {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "call_1", "type": "function",
                     "function": {"name": "read_file", "arguments": "{\"file_path\": \"/etc/app.toml\"}"}}
                ]},
                {"role": "tool", "tool_call_id": "call_1", "content": "{\"ok\": true}"}
            ],
            "tools": [
                {"type": "function", "function": {"name": "read_file", "parameters": {"type": "object"}}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn canonical_views_resolve_names_and_arguments() {
        let adapter = OpenAiRequestAdapter::parse(&request_body()).unwrap();

        assert_eq!(adapter.model(), "gpt-5");
        assert!(!adapter.is_streaming());
        assert!(adapter.has_tools());

        let results = adapter.tool_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "call_1");
        assert_eq!(results[0].name, "read_file");
        assert_eq!(results[0].content, "{\"ok\": true}");

        let messages = adapter.messages();
        let calls = messages[1].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].arguments["file_path"], "/etc/app.toml");
    }

    #[test]
    fn serialization_is_idempotent_and_preserves_unknown_fields() {
        let adapter = OpenAiRequestAdapter::parse(&request_body()).unwrap();
        let first = adapter.to_provider_request();
        let second = adapter.to_provider_request();

        assert_eq!(first, second);
        assert_eq!(serde_json::to_string(&first).unwrap(), serde_json::to_string(&second).unwrap());
        // Fields the gateway does not model still round-trip.
        assert_eq!(first["temperature"], 0.2);
    }

    #[test]
    fn buffered_mutations_apply_only_on_serialization() {
        let mut adapter = OpenAiRequestAdapter::parse(&request_body()).unwrap();
        adapter.set_model("gpt-5-mini");
        adapter.update_tool_result("call_1", "compressed".to_owned());

        // The canonical view reflects the pending model override while the
        // raw body stays untouched until serialization.
        assert_eq!(adapter.model(), "gpt-5-mini");

        let out = adapter.to_provider_request();
        assert_eq!(out["model"], "gpt-5-mini");
        assert_eq!(out["messages"][2]["content"], "compressed");
        assert_eq!(out["messages"][0]["content"], "read the config");
    }

    #[test]
    fn response_accessors_default_when_absent() {
        let adapter = OpenAiResponseAdapter::parse(json!({
            "id": "chatcmpl-9", "model": "gpt-5",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": null, "tool_calls": [
                {"id": "c1", "type": "function", "function": {"name": "run", "arguments": "not json"}}
            ]}, "finish_reason": "tool_calls"}]
        }))
        .unwrap();

        assert_eq!(adapter.text(), "");
        assert_eq!(adapter.usage(), Usage::default());
        assert_eq!(adapter.finish_reasons(), vec!["tool_calls"]);

        let calls = adapter.tool_calls();
        assert_eq!(calls[0].arguments, json!({}));
    }

    #[test]
    fn refusal_response_is_a_plain_stop_reply() {
        let adapter = OpenAiResponseAdapter::parse(json!({
            "id": "chatcmpl-9", "model": "gpt-5", "created": 1700000000,
            "choices": [{"index": 0, "message": {"role": "assistant", "tool_calls": [
                {"id": "c1", "type": "function", "function": {"name": "read_file", "arguments": "{}"}}
            ]}, "finish_reason": "tool_calls"}]
        }))
        .unwrap();

        let refusal = adapter.to_refusal_response("[[tool-blocked:read_file]]", "{\"denied\":true}");
        assert_eq!(refusal["choices"][0]["finish_reason"], "stop");
        assert_eq!(refusal["choices"][0]["message"]["content"], "{\"denied\":true}");
        assert_eq!(refusal["choices"][0]["message"]["refusal"], "[[tool-blocked:read_file]]");
        assert!(refusal["choices"][0]["message"].get("tool_calls").is_none());
        assert_eq!(refusal["created"], 1700000000);
    }

    #[test]
    fn three_chunk_stream_accumulates_text_and_reason() {
        let mut adapter = OpenAiStreamAdapter::new();

        let first = adapter.ingest(
            r#"{"id":"chatcmpl-1","model":"gpt-5","choices":[{"index":0,"delta":{"role":"assistant","content":""}}]}"#,
        );
        assert_eq!(first.frames.len(), 1);
        assert_eq!(first.frames[0].kind, FrameKind::Text);

        let second =
            adapter.ingest(r#"{"id":"chatcmpl-1","choices":[{"index":0,"delta":{"content":"Hello"}}]}"#);
        assert_eq!(second.frames[0].kind, FrameKind::Text);

        let third = adapter.ingest(r#"{"id":"chatcmpl-1","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#);
        assert!(third.finished);
        assert!(third.frames.is_empty());

        assert_eq!(adapter.accumulator().text(), "Hello");
        assert_eq!(adapter.accumulator().stop_reason(), Some("stop"));
    }

    #[test]
    fn split_tool_arguments_concatenate_and_parse() {
        let mut adapter = OpenAiStreamAdapter::new();
        let chunks = [
            r#"{"id":"c","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"read_file","arguments":""}}]}}]}"#,
            r#"{"id":"c","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"file_path\":"}}]}}]}"#,
            r#"{"id":"c","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"/tmp/a\"}"}}]}}]}"#,
            r#"{"id":"c","choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#,
        ];
        for chunk in chunks {
            adapter.ingest(chunk);
        }

        let calls = adapter.accumulator().completed_tool_calls();
        assert_eq!(calls[0].arguments["file_path"], "/tmp/a");
        assert_eq!(adapter.raw_tool_call_events().len(), 3);

        let response = adapter.to_provider_response();
        assert_eq!(response["choices"][0]["finish_reason"], "tool_calls");
        assert_eq!(
            response["choices"][0]["message"]["tool_calls"][0]["function"]["name"],
            "read_file"
        );
        assert_eq!(response["choices"][0]["message"]["content"], Value::Null);
    }

    #[test]
    fn usage_only_chunk_finalizes_with_default_stop() {
        let mut adapter = OpenAiStreamAdapter::new();
        adapter.ingest(r#"{"id":"chatcmpl-1","model":"gpt-5","choices":[{"index":0,"delta":{"content":"hi"}}]}"#);
        let terminal = adapter.ingest(r#"{"id":"chatcmpl-1","choices":[],"usage":{"prompt_tokens":3,"completion_tokens":1,"total_tokens":4}}"#);
        assert!(terminal.finished);

        let response = adapter.to_provider_response();
        assert_eq!(response["choices"][0]["finish_reason"], "stop");
        assert_eq!(response["usage"]["prompt_tokens"], 3);
    }

    #[test]
    fn empty_chunk_is_a_no_op() {
        let mut adapter = OpenAiStreamAdapter::new();
        let disposition = adapter.ingest(r#"{"id":"chatcmpl-1","choices":[]}"#);
        assert!(!disposition.finished);
        assert!(disposition.frames.is_empty());
    }

    #[test]
    fn malformed_chunk_is_skipped() {
        let mut adapter = OpenAiStreamAdapter::new();
        let disposition = adapter.ingest("{not json");
        assert!(!disposition.finished);
        assert!(disposition.frames.is_empty());
        assert_eq!(adapter.accumulator().phase(), crate::accumulator::StreamPhase::Idle);
    }

    #[test]
    fn end_frames_close_with_done_sentinel() {
        let mut adapter = OpenAiStreamAdapter::new();
        adapter.ingest(r#"{"id":"chatcmpl-1","model":"gpt-5","choices":[{"index":0,"delta":{"content":"hi"},"finish_reason":"stop"}]}"#);

        let frames = adapter.end_frames();
        assert_eq!(frames.last().unwrap(), sse::DONE_FRAME);
        assert!(frames[0].contains("\"finish_reason\":\"stop\""));
    }
}
