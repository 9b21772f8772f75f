//! Gemini `generateContent` API adapters
//!
//! Gemini differs from the other dialects in three ways that shape this
//! module: streaming is selected by the endpoint path rather than a body
//! flag, function calls carry no identifier (the function name stands in
//! for one), and streamed chunks reuse the full response shape with no
//! terminating sentinel.

use std::collections::HashMap;

use manifold_core::{Content, ContentPart, Message, Role, ToolCall, ToolDefinition, ToolResult, Usage, sse};
use serde_json::{Value, json};

use super::{ChunkDisposition, EmittedFrame, RequestAdapter, ResponseAdapter, StreamAdapter, correlate_tool_names, parse_role};
use crate::accumulator::StreamAccumulator;
use crate::error::GatewayError;
use crate::protocol::gemini::{GeminiContent, GeminiRequest, GeminiResponse};

// -- Request adapter --

/// Wraps one Gemini-native `generateContent` request
pub struct GeminiRequestAdapter {
    raw: Value,
    parsed: GeminiRequest,
    model_override: Option<String>,
    tool_result_updates: HashMap<String, String>,
}

impl GeminiRequestAdapter {
    /// Parse a raw request body
    ///
    /// The native API carries the model and the streaming choice in the
    /// endpoint path. Inbound bodies carry them as gateway-level `model`
    /// and `stream` hints instead, which are stripped before forwarding.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidRequest` when the body is not valid
    /// JSON or does not match the `generateContent` schema.
    pub fn parse(body: &[u8]) -> Result<Self, GatewayError> {
        let raw: Value = serde_json::from_slice(body)
            .map_err(|e| GatewayError::InvalidRequest(format!("request body is not valid JSON: {e}")))?;
        let parsed: GeminiRequest = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::InvalidRequest(format!("failed to parse generateContent request: {e}")))?;

        Ok(Self {
            raw,
            parsed,
            model_override: None,
            tool_result_updates: HashMap::new(),
        })
    }
}

impl RequestAdapter for GeminiRequestAdapter {
    fn model(&self) -> String {
        self.model_override
            .clone()
            .or_else(|| self.parsed.model.clone())
            .unwrap_or_default()
    }

    fn is_streaming(&self) -> bool {
        self.parsed.stream.unwrap_or(false)
    }

    fn messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.parsed.contents.len() + 1);

        if let Some(instruction) = &self.parsed.system_instruction {
            messages.push(Message::new(Role::System, joined_text(instruction)));
        }
        for content in &self.parsed.contents {
            messages.push(convert_content(content));
        }

        correlate_tool_names(&mut messages);
        messages
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        self.parsed
            .tools
            .iter()
            .flatten()
            .flat_map(|tool| &tool.function_declarations)
            .map(|decl| ToolDefinition {
                name: decl.name.clone(),
                description: decl.description.clone(),
                input_schema: decl.parameters.clone(),
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

        // Model and streaming are gateway-level hints, not Gemini body
        // fields; both travel in the endpoint path instead.
        if let Some(obj) = out.as_object_mut() {
            obj.remove("model");
            obj.remove("stream");
        }

        if !self.tool_result_updates.is_empty()
            && let Some(contents) = out.get_mut("contents").and_then(Value::as_array_mut)
        {
            for content in contents {
                let Some(parts) = content.get_mut("parts").and_then(Value::as_array_mut) else {
                    continue;
                };
                for part in parts {
                    let Some(response) = part.get_mut("functionResponse") else { continue };
                    let update = response
                        .get("name")
                        .and_then(Value::as_str)
                        .and_then(|name| self.tool_result_updates.get(name));
                    if let Some(new_content) = update {
                        response["response"] = wrap_function_response(new_content);
                    }
                }
            }
        }

        out
    }
}

/// Join the text parts of a Gemini content entry
fn joined_text(content: &GeminiContent) -> String {
    content
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect::<Vec<_>>()
        .join("")
}

/// Gemini function responses must be JSON objects; plain text is wrapped
/// under a `content` key.
fn wrap_function_response(content: &str) -> Value {
    serde_json::from_str::<Value>(content)
        .ok()
        .filter(Value::is_object)
        .unwrap_or_else(|| json!({"content": content}))
}

/// Convert one Gemini content entry to the canonical shape
fn convert_content(content: &GeminiContent) -> Message {
    // Gemini uses "model" where everyone else says "assistant".
    let role = match content.role.as_deref() {
        Some("model") => Role::Assistant,
        Some(other) => parse_role(other),
        None => Role::User,
    };

    let mut parts = Vec::new();
    let mut tool_calls = Vec::new();
    let mut tool_results = Vec::new();

    for part in &content.parts {
        if let Some(text) = &part.text {
            parts.push(ContentPart::Text { text: text.clone() });
        }
        if let Some(call) = &part.function_call {
            tool_calls.push(ToolCall {
                id: call.name.clone(),
                name: call.name.clone(),
                arguments: call.args.clone(),
            });
        }
        if let Some(response) = &part.function_response {
            tool_results.push(ToolResult {
                id: response.name.clone(),
                name: response.name.clone(),
                content: response.response.to_string(),
                is_error: false,
            });
        }
    }

    Message {
        role,
        content: if parts.is_empty() {
            Content::default()
        } else {
            Content::Parts(parts)
        },
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
        tool_results: if tool_results.is_empty() { None } else { Some(tool_results) },
    }
}

// -- Response adapter --

/// Wraps one completed Gemini `generateContent` response
pub struct GeminiResponseAdapter {
    raw: Value,
    parsed: GeminiResponse,
}

impl GeminiResponseAdapter {
    /// Wrap a raw provider response
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Upstream` when the body does not match the
    /// `generateContent` response schema.
    pub fn parse(raw: Value) -> Result<Self, GatewayError> {
        let parsed: GeminiResponse = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::Upstream(format!("failed to parse provider response: {e}")))?;
        Ok(Self { raw, parsed })
    }
}

impl ResponseAdapter for GeminiResponseAdapter {
    fn id(&self) -> String {
        self.parsed.response_id.clone().unwrap_or_default()
    }

    fn model(&self) -> String {
        self.parsed.model_version.clone().unwrap_or_default()
    }

    fn text(&self) -> String {
        self.parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(joined_text)
            .unwrap_or_default()
    }

    fn tool_calls(&self) -> Vec<ToolCall> {
        self.parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.function_call.as_ref())
                    .map(|call| ToolCall {
                        id: call.name.clone(),
                        name: call.name.clone(),
                        arguments: call.args.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn usage(&self) -> Usage {
        self.parsed.usage_metadata.as_ref().map_or_else(Usage::default, |meta| Usage {
            input_tokens: meta.prompt_token_count,
            output_tokens: meta.candidates_token_count,
        })
    }

    fn finish_reasons(&self) -> Vec<String> {
        self.parsed
            .candidates
            .iter()
            .filter_map(|c| c.finish_reason.clone())
            .collect()
    }

    fn to_provider_response(&self) -> Value {
        self.raw.clone()
    }

    fn to_refusal_response(&self, refusal_message: &str, content_message: &str) -> Value {
        json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": refusal_message},
                        {"text": content_message},
                    ],
                },
                "finishReason": "STOP",
                "index": 0,
            }],
            "usageMetadata": self.raw.get("usageMetadata").cloned().unwrap_or_else(|| {
                json!({"promptTokenCount": 0, "candidatesTokenCount": 0, "totalTokenCount": 0})
            }),
            "modelVersion": self.parsed.model_version.clone().unwrap_or_default(),
        })
    }
}

// -- Stream adapter --

/// Reconstructs one Gemini streamed response
///
/// Chunks reuse the response shape. Function calls arrive complete in a
/// single chunk, so each one lands as a fully-formed draft at the next
/// free index.
#[derive(Default)]
pub struct GeminiStreamAdapter {
    acc: StreamAccumulator,
    next_tool_index: u32,
}

impl GeminiStreamAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamAdapter for GeminiStreamAdapter {
    fn ingest(&mut self, data: &str) -> ChunkDisposition {
        let mut disposition = ChunkDisposition::default();
        let data = data.trim();
        if data.is_empty() {
            return disposition;
        }

        let chunk: GeminiResponse = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(error = %e, data = %data, "skipping unparseable SSE chunk");
                return disposition;
            }
        };

        self.acc.mark_chunk();
        self.acc
            .record_identity(chunk.response_id.as_deref(), chunk.model_version.as_deref());

        if let Some(meta) = &chunk.usage_metadata {
            self.acc.record_usage(Usage {
                input_tokens: meta.prompt_token_count,
                output_tokens: meta.candidates_token_count,
            });
        }

        let mut has_text = false;
        let mut has_tool_call = false;
        for candidate in &chunk.candidates {
            if let Some(content) = &candidate.content {
                for part in &content.parts {
                    if let Some(text) = &part.text {
                        self.acc.append_text(text);
                        has_text = true;
                    }
                    if let Some(call) = &part.function_call {
                        let index = self.next_tool_index;
                        self.next_tool_index += 1;
                        self.acc
                            .merge_tool_fragment(index, Some(&call.name), Some(&call.name), Some(&call.args.to_string()));
                        has_tool_call = true;
                    }
                }
            }
            if let Some(reason) = &candidate.finish_reason {
                self.acc.record_stop_reason(reason);
                disposition.finished = true;
            }
        }

        let frame = sse::raw_data_frame(data);
        if has_tool_call {
            self.acc.push_raw_tool_event(frame.clone());
            disposition.frames.push(EmittedFrame::tool_call(frame));
        } else if has_text {
            disposition.frames.push(EmittedFrame::text(frame));
        }

        disposition
    }

    fn accumulator(&self) -> &StreamAccumulator {
        &self.acc
    }

    fn to_provider_response(&self) -> Value {
        let mut parts = Vec::new();
        if !self.acc.text().is_empty() {
            parts.push(json!({"text": self.acc.text()}));
        }
        for draft in self.acc.drafts() {
            parts.push(json!({
                "functionCall": {
                    "name": draft.name,
                    "args": ToolCall::parse_arguments(&draft.arguments),
                },
            }));
        }

        let usage = self.acc.usage().unwrap_or_default();
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": parts},
                "finishReason": self.acc.stop_reason().unwrap_or("STOP"),
                "index": 0,
            }],
            "usageMetadata": {
                "promptTokenCount": usage.input_tokens,
                "candidatesTokenCount": usage.output_tokens,
                "totalTokenCount": usage.total_tokens(),
            },
            "modelVersion": self.acc.model().unwrap_or_default(),
        })
    }

    fn text_delta_frame(&self, text: &str) -> String {
        sse::data_frame(&json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "index": 0,
            }],
        }))
    }

    fn complete_text_frames(&self, text: &str) -> Vec<String> {
        vec![self.text_delta_frame(text)]
    }

    fn end_frames(&self) -> Vec<String> {
        let usage = self.acc.usage().unwrap_or_default();
        vec![sse::data_frame(&json!({
            "candidates": [{
                "content": {"role": "model", "parts": []},
                "finishReason": self.acc.stop_reason().unwrap_or("STOP"),
                "index": 0,
            }],
            "usageMetadata": {
                "promptTokenCount": usage.input_tokens,
                "candidatesTokenCount": usage.output_tokens,
                "totalTokenCount": usage.total_tokens(),
            },
        }))]
    }
}
