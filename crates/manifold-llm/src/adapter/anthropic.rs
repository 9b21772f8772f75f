//! Anthropic Messages API adapters
//!
//! Anthropic carries tool results as blocks inside user turns and names its
//! stream events, so frames are re-emitted with their `event:` line and
//! tool-call traffic is tracked per content-block index.

use std::collections::HashMap;

use manifold_core::{Content, ContentPart, Message, Role, ToolCall, ToolDefinition, ToolResult, Usage, sse};
use serde_json::{Value, json};

use super::openai::unix_now;
use super::{ChunkDisposition, EmittedFrame, RequestAdapter, ResponseAdapter, StreamAdapter, correlate_tool_names, parse_role};
use crate::accumulator::StreamAccumulator;
use crate::error::GatewayError;
use crate::protocol::anthropic::{
    AnthropicContent, AnthropicContentBlock, AnthropicRequest, AnthropicResponse, AnthropicStreamContentBlock,
    AnthropicStreamDelta, AnthropicStreamEvent, AnthropicUsage,
};

// -- Request adapter --

/// Wraps one Anthropic-native messages request
pub struct AnthropicRequestAdapter {
    raw: Value,
    parsed: AnthropicRequest,
    model_override: Option<String>,
    tool_result_updates: HashMap<String, String>,
}

impl AnthropicRequestAdapter {
    /// Parse a raw request body
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidRequest` when the body is not valid
    /// JSON or does not match the messages schema.
    pub fn parse(body: &[u8]) -> Result<Self, GatewayError> {
        let raw: Value = serde_json::from_slice(body)
            .map_err(|e| GatewayError::InvalidRequest(format!("request body is not valid JSON: {e}")))?;
        let parsed: AnthropicRequest = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::InvalidRequest(format!("failed to parse messages request: {e}")))?;

        Ok(Self {
            raw,
            parsed,
            model_override: None,
            tool_result_updates: HashMap::new(),
        })
    }
}

impl RequestAdapter for AnthropicRequestAdapter {
    fn model(&self) -> String {
        self.model_override.clone().unwrap_or_else(|| self.parsed.model.clone())
    }

    fn is_streaming(&self) -> bool {
        self.parsed.stream.unwrap_or(false)
    }

    fn messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.parsed.messages.len() + 1);

        if let Some(system) = &self.parsed.system {
            messages.push(Message::new(Role::System, system.as_text()));
        }
        for msg in &self.parsed.messages {
            messages.push(convert_message(&msg.role, &msg.content));
        }

        correlate_tool_names(&mut messages);
        messages
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        self.parsed
            .tools
            .iter()
            .flatten()
            .map(|tool| ToolDefinition {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema: tool.input_schema.clone(),
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
                let Some(blocks) = message.get_mut("content").and_then(Value::as_array_mut) else {
                    continue;
                };
                for block in blocks {
                    let Some(obj) = block.as_object_mut() else { continue };
                    if obj.get("type").and_then(Value::as_str) != Some("tool_result") {
                        continue;
                    }
                    let update = obj
                        .get("tool_use_id")
                        .and_then(Value::as_str)
                        .and_then(|id| self.tool_result_updates.get(id));
                    if let Some(new_content) = update {
                        obj.insert("content".to_owned(), Value::String(new_content.clone()));
                    }
                }
            }
        }

        out
    }
}

/// Convert one Anthropic message to the canonical shape
fn convert_message(role: &str, content: &AnthropicContent) -> Message {
    let role = parse_role(role);

    let blocks = match content {
        AnthropicContent::Text(text) => {
            return Message::new(role, text.clone());
        }
        AnthropicContent::Blocks(blocks) => blocks,
    };

    let mut parts = Vec::new();
    let mut tool_calls = Vec::new();
    let mut tool_results = Vec::new();

    for block in blocks {
        match block {
            AnthropicContentBlock::Text { text } => parts.push(ContentPart::Text { text: text.clone() }),
            AnthropicContentBlock::Image { source } => parts.push(ContentPart::Image {
                url: image_url(source),
                detail: None,
            }),
            AnthropicContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id: id.clone(),
                name: name.clone(),
                arguments: if input.is_null() { json!({}) } else { input.clone() },
            }),
            AnthropicContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => tool_results.push(ToolResult {
                id: tool_use_id.clone(),
                name: "unknown".to_owned(),
                content: content.as_ref().map(|c| c.as_text()).unwrap_or_default(),
                is_error: is_error.unwrap_or(false),
            }),
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

/// Render an Anthropic image source as a URL, inlining base64 data
fn image_url(source: &Value) -> String {
    if let Some(url) = source.get("url").and_then(Value::as_str) {
        return url.to_owned();
    }
    let media_type = source
        .get("media_type")
        .and_then(Value::as_str)
        .unwrap_or("image/png");
    let data = source.get("data").and_then(Value::as_str).unwrap_or_default();
    format!("data:{media_type};base64,{data}")
}

// -- Response adapter --

/// Wraps one completed Anthropic messages response
pub struct AnthropicResponseAdapter {
    raw: Value,
    parsed: AnthropicResponse,
}

impl AnthropicResponseAdapter {
    /// Wrap a raw provider response
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Upstream` when the body does not match the
    /// messages response schema.
    pub fn parse(raw: Value) -> Result<Self, GatewayError> {
        let parsed: AnthropicResponse = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::Upstream(format!("failed to parse provider response: {e}")))?;
        Ok(Self { raw, parsed })
    }
}

impl ResponseAdapter for AnthropicResponseAdapter {
    fn id(&self) -> String {
        self.parsed.id.clone()
    }

    fn model(&self) -> String {
        self.parsed.model.clone()
    }

    fn text(&self) -> String {
        self.parsed
            .content
            .iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    fn tool_calls(&self) -> Vec<ToolCall> {
        self.parsed
            .content
            .iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: if input.is_null() { json!({}) } else { input.clone() },
                }),
                _ => None,
            })
            .collect()
    }

    fn usage(&self) -> Usage {
        self.parsed.usage.map_or_else(Usage::default, |usage| Usage {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        })
    }

    fn finish_reasons(&self) -> Vec<String> {
        self.parsed.stop_reason.clone().into_iter().collect()
    }

    fn to_provider_response(&self) -> Value {
        self.raw.clone()
    }

    fn to_refusal_response(&self, refusal_message: &str, content_message: &str) -> Value {
        json!({
            "id": self.parsed.id,
            "type": "message",
            "role": "assistant",
            "model": self.parsed.model,
            "content": [
                {"type": "text", "text": refusal_message},
                {"type": "text", "text": content_message},
            ],
            "stop_reason": "end_turn",
            "stop_sequence": null,
            "usage": self.raw.get("usage").cloned().unwrap_or_else(|| {
                json!({"input_tokens": 0, "output_tokens": 0})
            }),
        })
    }
}

// -- Stream adapter --

/// Reconstructs one Anthropic streamed response
#[derive(Default)]
pub struct AnthropicStreamAdapter {
    acc: StreamAccumulator,
}

impl AnthropicStreamAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn response_id(&self) -> String {
        self.acc
            .response_id()
            .map_or_else(|| format!("msg_{}", unix_now()), str::to_owned)
    }

    /// Overlay event usage onto the accumulated value
    ///
    /// `message_start` carries input tokens, `message_delta` only output
    /// tokens, so zero fields must not clobber earlier values.
    fn merge_usage(&mut self, event_usage: AnthropicUsage) {
        let mut usage = self.acc.usage().unwrap_or_default();
        if event_usage.input_tokens > 0 {
            usage.input_tokens = event_usage.input_tokens;
        }
        if event_usage.output_tokens > 0 {
            usage.output_tokens = event_usage.output_tokens;
        }
        self.acc.record_usage(usage);
    }
}

impl StreamAdapter for AnthropicStreamAdapter {
    fn ingest(&mut self, data: &str) -> ChunkDisposition {
        let mut disposition = ChunkDisposition::default();
        let data = data.trim();
        if data.is_empty() {
            return disposition;
        }

        let event: AnthropicStreamEvent = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(error = %e, data = %data, "skipping unparseable SSE chunk");
                return disposition;
            }
        };

        self.acc.mark_chunk();
        let frame = sse::raw_event_frame(event.event_name(), data);

        match event {
            AnthropicStreamEvent::MessageStart { message } => {
                self.acc.record_identity(Some(&message.id), Some(&message.model));
                if let Some(usage) = message.usage {
                    self.merge_usage(usage);
                }
                disposition.frames.push(EmittedFrame::control(frame));
            }
            AnthropicStreamEvent::ContentBlockStart { index, content_block } => match content_block {
                AnthropicStreamContentBlock::Text { text } => {
                    if !text.is_empty() {
                        self.acc.append_text(&text);
                    }
                    disposition.frames.push(EmittedFrame::control(frame));
                }
                AnthropicStreamContentBlock::ToolUse { id, name, .. } => {
                    self.acc.merge_tool_fragment(index, Some(&id), Some(&name), None);
                    self.acc.push_raw_tool_event(frame.clone());
                    disposition.frames.push(EmittedFrame::tool_call(frame));
                }
            },
            AnthropicStreamEvent::ContentBlockDelta { index, delta } => match delta {
                AnthropicStreamDelta::TextDelta { text } => {
                    self.acc.append_text(&text);
                    disposition.frames.push(EmittedFrame::text(frame));
                }
                AnthropicStreamDelta::InputJsonDelta { partial_json } => {
                    self.acc.merge_tool_fragment(index, None, None, Some(&partial_json));
                    self.acc.push_raw_tool_event(frame.clone());
                    disposition.frames.push(EmittedFrame::tool_call(frame));
                }
            },
            AnthropicStreamEvent::ContentBlockStop { index } => {
                if self.acc.is_tool_index(index) {
                    self.acc.push_raw_tool_event(frame.clone());
                    disposition.frames.push(EmittedFrame::tool_call(frame));
                } else {
                    disposition.frames.push(EmittedFrame::control(frame));
                }
            }
            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                if let Some(reason) = &delta.stop_reason {
                    self.acc.record_stop_reason(reason);
                }
                if let Some(usage) = usage {
                    self.merge_usage(usage);
                }
            }
            AnthropicStreamEvent::MessageStop => {
                self.acc.mark_final();
                disposition.finished = true;
            }
            AnthropicStreamEvent::Ping => {}
        }

        disposition
    }

    fn accumulator(&self) -> &StreamAccumulator {
        &self.acc
    }

    fn to_provider_response(&self) -> Value {
        let mut content = Vec::new();
        if !self.acc.text().is_empty() {
            content.push(json!({"type": "text", "text": self.acc.text()}));
        }
        for draft in self.acc.drafts() {
            content.push(json!({
                "type": "tool_use",
                "id": draft.id,
                "name": draft.name,
                "input": ToolCall::parse_arguments(&draft.arguments),
            }));
        }

        let usage = self.acc.usage().unwrap_or_default();
        json!({
            "id": self.response_id(),
            "type": "message",
            "role": "assistant",
            "model": self.acc.model().unwrap_or_default(),
            "content": content,
            "stop_reason": self.acc.stop_reason().unwrap_or("end_turn"),
            "stop_sequence": null,
            "usage": {"input_tokens": usage.input_tokens, "output_tokens": usage.output_tokens},
        })
    }

    fn text_delta_frame(&self, text: &str) -> String {
        sse::event_frame(
            "content_block_delta",
            &json!({
                "type": "content_block_delta",
                "index": 0,
                "delta": {"type": "text_delta", "text": text},
            }),
        )
    }

    fn complete_text_frames(&self, text: &str) -> Vec<String> {
        vec![
            sse::event_frame(
                "message_start",
                &json!({
                    "type": "message_start",
                    "message": {
                        "id": self.response_id(),
                        "type": "message",
                        "role": "assistant",
                        "model": self.acc.model().unwrap_or_default(),
                        "content": [],
                        "stop_reason": null,
                        "usage": {"input_tokens": 0, "output_tokens": 0},
                    },
                }),
            ),
            sse::event_frame(
                "content_block_start",
                &json!({
                    "type": "content_block_start",
                    "index": 0,
                    "content_block": {"type": "text", "text": ""},
                }),
            ),
            self.text_delta_frame(text),
            sse::event_frame("content_block_stop", &json!({"type": "content_block_stop", "index": 0})),
        ]
    }

    fn end_frames(&self) -> Vec<String> {
        let usage = self.acc.usage().unwrap_or_default();
        vec![
            sse::event_frame(
                "message_delta",
                &json!({
                    "type": "message_delta",
                    "delta": {
                        "stop_reason": self.acc.stop_reason().unwrap_or("end_turn"),
                        "stop_sequence": null,
                    },
                    "usage": {"output_tokens": usage.output_tokens},
                }),
            ),
            sse::event_frame("message_stop", &json!({"type": "message_stop"})),
        ]
    }
}
