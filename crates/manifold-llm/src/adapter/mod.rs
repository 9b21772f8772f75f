//! Provider adapter contracts
//!
//! Each provider implements three adapters: a request adapter wrapping one
//! provider-native request body, a response adapter wrapping one completed
//! response, and a stream adapter reconstructing a response from SSE chunks.
//! The traits are object-safe; the registry hands them out as boxed trait
//! objects so providers stay structurally interchangeable. DeepSeek and
//! Ollama reuse the `OpenAI` adapters through their dialects.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use std::collections::HashMap;

use manifold_core::{Message, Role, ToolCall, ToolDefinition, ToolResult, Usage};
use serde_json::Value;

/// Read and mutate one provider-native request
///
/// Accessors are side-effect free. Mutations are buffered (a pending model
/// override plus a map of tool-call id to replacement content) and only
/// materialized by
/// [`to_provider_request`](RequestAdapter::to_provider_request), so calling
/// it twice without an intervening mutation yields identical output.
pub trait RequestAdapter: Send {
    /// Requested model identifier
    fn model(&self) -> String;

    /// Whether the client asked for a streamed response
    fn is_streaming(&self) -> bool;

    /// Canonical view of the conversation
    fn messages(&self) -> Vec<Message>;

    /// All tool results present in the conversation
    ///
    /// Names are resolved by scanning backward for the assistant message
    /// whose tool-call list contains the matching id; unresolvable ids
    /// report `"unknown"`.
    fn tool_results(&self) -> Vec<ToolResult> {
        self.messages()
            .into_iter()
            .filter_map(|m| m.tool_results)
            .flatten()
            .collect()
    }

    /// Declared tool definitions
    fn tools(&self) -> Vec<ToolDefinition>;

    /// Whether any tools are declared
    fn has_tools(&self) -> bool {
        !self.tools().is_empty()
    }

    /// Queue a model override
    fn set_model(&mut self, model: &str);

    /// Queue a replacement for one tool result's content
    fn update_tool_result(&mut self, tool_call_id: &str, new_content: String);

    /// Queue replacements for several tool results at once
    fn apply_tool_result_updates(&mut self, updates: &HashMap<String, String>) {
        for (id, content) in updates {
            self.update_tool_result(id, content.clone());
        }
    }

    /// Re-serialize the provider-native request with all queued mutations
    /// applied
    fn to_provider_request(&self) -> Value;
}

/// Read one completed provider response
pub trait ResponseAdapter: Send {
    /// Response identifier
    fn id(&self) -> String;

    /// Model that produced the response
    fn model(&self) -> String;

    /// First choice's text content, or an empty string when absent
    fn text(&self) -> String;

    /// Tool calls requested by the model, arguments parsed with an
    /// empty-object fallback
    fn tool_calls(&self) -> Vec<ToolCall>;

    /// Whether the model requested any tool call
    fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }

    /// Token usage, zeros when the provider omitted it
    fn usage(&self) -> Usage;

    /// Finish reasons exactly as the provider reported them
    fn finish_reasons(&self) -> Vec<String>;

    /// The unmodified provider-native response
    fn to_provider_response(&self) -> Value;

    /// Build a provider-shaped response that replaces the assistant turn
    /// with a refusal
    ///
    /// The assistant content becomes `content_message`, the finish reason is
    /// forced to the provider's normal-stop value, and tool calls are
    /// discarded, so a blocked invocation reads as an ordinary reply.
    fn to_refusal_response(&self, refusal_message: &str, content_message: &str) -> Value;
}

/// Kind of an emitted stream frame, used for policy-driven withholding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Carries visible text
    Text,
    /// Carries tool-call data
    ToolCall,
    /// Structural marker (role open, block boundaries)
    Control,
}

/// One SSE frame ready to forward downstream
#[derive(Debug, Clone)]
pub struct EmittedFrame {
    /// Fully-formed SSE wire text
    pub sse: String,
    /// What the frame carries
    pub kind: FrameKind,
}

impl EmittedFrame {
    pub fn text(sse: String) -> Self {
        Self {
            sse,
            kind: FrameKind::Text,
        }
    }

    pub fn tool_call(sse: String) -> Self {
        Self {
            sse,
            kind: FrameKind::ToolCall,
        }
    }

    pub fn control(sse: String) -> Self {
        Self {
            sse,
            kind: FrameKind::Control,
        }
    }
}

/// Result of ingesting one SSE data payload
#[derive(Debug, Default)]
pub struct ChunkDisposition {
    /// Frames to forward, in order
    pub frames: Vec<EmittedFrame>,
    /// Whether the stream reached its end
    pub finished: bool,
}

/// Consume one provider's SSE stream and reconstruct the response
///
/// One adapter instance serves exactly one connection and owns its
/// accumulator.
pub trait StreamAdapter: Send {
    /// Process one decoded SSE data payload
    ///
    /// Malformed payloads are logged at debug level and skipped; a chunk
    /// with no choices and no usage is a no-op.
    fn ingest(&mut self, data: &str) -> ChunkDisposition;

    /// The accumulated stream state
    fn accumulator(&self) -> &crate::accumulator::StreamAccumulator;

    /// Synthesize a complete provider-shaped response from the accumulator
    ///
    /// Tool calls appear only if at least one was accumulated; a missing
    /// finish reason defaults to the provider's normal-stop value; missing
    /// usage defaults to zeros.
    fn to_provider_response(&self) -> Value;

    /// One frame carrying a text delta
    fn text_delta_frame(&self, text: &str) -> String;

    /// Frames opening an assistant turn and delivering `text` in full
    fn complete_text_frames(&self, text: &str) -> Vec<String>;

    /// Terminal frames: finish/usage plus the provider's end sentinel
    /// where it uses one
    fn end_frames(&self) -> Vec<String>;

    /// Buffered raw tool-call frames for replay after a policy decision
    fn raw_tool_call_events(&self) -> Vec<String> {
        self.accumulator().raw_tool_call_events().to_vec()
    }
}

/// Map a wire role string to the canonical role
///
/// Unknown roles degrade to `User` rather than failing the request.
pub(crate) fn parse_role(raw: &str) -> Role {
    match raw {
        "system" => Role::System,
        "developer" => Role::Developer,
        "assistant" => Role::Assistant,
        "tool" => Role::Tool,
        "function" => Role::Function,
        "user" => Role::User,
        other => {
            tracing::debug!(role = %other, "unrecognized message role, treating as user");
            Role::User
        }
    }
}

/// Fill in tool-result names by backward correlation
///
/// For each result, scan backward from its message for the most recent
/// assistant message whose tool-call list contains the matching id. Results
/// whose id never matches keep the name `"unknown"`.
pub(crate) fn correlate_tool_names(messages: &mut [Message]) {
    for i in 0..messages.len() {
        let Some(results) = messages[i].tool_results.take() else {
            continue;
        };

        let named = results
            .into_iter()
            .map(|mut result| {
                if result.name == "unknown"
                    && let Some(name) = find_call_name(&messages[..i], &result.id)
                {
                    result.name = name;
                }
                result
            })
            .collect();

        messages[i].tool_results = Some(named);
    }
}

fn find_call_name(earlier: &[Message], call_id: &str) -> Option<String> {
    earlier.iter().rev().find_map(|message| {
        if message.role != Role::Assistant {
            return None;
        }
        message
            .tool_calls
            .as_ref()?
            .iter()
            .find(|call| call.id == call_id)
            .map(|call| call.name.clone())
    })
}

#[cfg(test)]
mod tests {
    use manifold_core::Content;

    use super::*;

    fn assistant_with_call(id: &str, name: &str) -> Message {
        Message {
            role: Role::Assistant,
            content: Content::Text(String::new()),
            tool_calls: Some(vec![ToolCall {
                id: id.to_owned(),
                name: name.to_owned(),
                arguments: serde_json::json!({}),
            }]),
            tool_results: None,
        }
    }

    fn tool_result_message(id: &str) -> Message {
        Message {
            role: Role::Tool,
            content: Content::Text("output".to_owned()),
            tool_calls: None,
            tool_results: Some(vec![ToolResult {
                id: id.to_owned(),
                name: "unknown".to_owned(),
                content: "output".to_owned(),
                is_error: false,
            }]),
        }
    }

    #[test]
    fn correlation_finds_most_recent_matching_call() {
        let mut messages = vec![
            assistant_with_call("call_1", "stale_name"),
            assistant_with_call("call_1", "read_file"),
            tool_result_message("call_1"),
        ];
        correlate_tool_names(&mut messages);

        let results = messages[2].tool_results.as_ref().unwrap();
        assert_eq!(results[0].name, "read_file");
    }

    #[test]
    fn unmatched_result_stays_unknown() {
        let mut messages = vec![assistant_with_call("call_1", "read_file"), tool_result_message("call_9")];
        correlate_tool_names(&mut messages);

        let results = messages[1].tool_results.as_ref().unwrap();
        assert_eq!(results[0].name, "unknown");
    }

    #[test]
    fn unknown_roles_degrade_to_user() {
        assert_eq!(parse_role("marketing"), Role::User);
        assert_eq!(parse_role("developer"), Role::Developer);
    }
}
