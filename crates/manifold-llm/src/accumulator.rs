//! Stream accumulation state machine
//!
//! Reconstructs one complete logical response from an in-order sequence of
//! partial chunks. Each stream adapter owns exactly one accumulator for the
//! lifetime of its connection; concurrent streams share nothing.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use manifold_core::{ToolCall, Usage};

/// Phase of one streamed response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamPhase {
    /// No chunk received yet
    #[default]
    Idle,
    /// At least one chunk received
    Streaming,
    /// Finish reason or terminal chunk observed
    Final,
}

/// Partially accumulated tool call, keyed by the provider's stream index
///
/// The provider assigns each tool call a stable index and delivers `id` and
/// `name` on the first fragment with `arguments` split across later
/// fragments. Fragments can interleave across calls, so slots are resolved
/// by index rather than arrival position.
#[derive(Debug, Clone)]
pub struct ToolCallDraft {
    /// Provider-assigned stream index
    pub index: u32,
    /// Tool call identifier, empty until delivered
    pub id: String,
    /// Tool name, empty until delivered
    pub name: String,
    /// Argument fragments concatenated in arrival order
    pub arguments: String,
}

/// Accumulated state of one streamed response
#[derive(Debug)]
pub struct StreamAccumulator {
    response_id: Option<String>,
    model: Option<String>,
    text: String,
    drafts: BTreeMap<u32, ToolCallDraft>,
    raw_tool_call_events: Vec<String>,
    usage: Option<Usage>,
    stop_reason: Option<String>,
    phase: StreamPhase,
    started_at: Instant,
    first_chunk_at: Option<Instant>,
}

impl Default for StreamAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAccumulator {
    /// Fresh accumulator; `started_at` is captured here
    pub fn new() -> Self {
        Self {
            response_id: None,
            model: None,
            text: String::new(),
            drafts: BTreeMap::new(),
            raw_tool_call_events: Vec::new(),
            usage: None,
            stop_reason: None,
            phase: StreamPhase::Idle,
            started_at: Instant::now(),
            first_chunk_at: None,
        }
    }

    /// Record that a chunk arrived, entering `Streaming` on the first one
    ///
    /// `first_chunk_at` is captured exactly once.
    pub fn mark_chunk(&mut self) {
        if self.phase == StreamPhase::Idle {
            self.phase = StreamPhase::Streaming;
        }
        if self.first_chunk_at.is_none() {
            self.first_chunk_at = Some(Instant::now());
        }
    }

    /// Refresh response metadata from a chunk that carries it
    pub fn record_identity(&mut self, id: Option<&str>, model: Option<&str>) {
        if let Some(id) = id {
            self.response_id = Some(id.to_owned());
        }
        if let Some(model) = model {
            self.model = Some(model.to_owned());
        }
    }

    /// Append a text delta
    pub fn append_text(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    /// Merge one tool-call fragment into its index slot
    ///
    /// The first fragment for an index allocates a slot seeded with empty
    /// id/name/arguments. `id` and `name` overwrite when present;
    /// `arguments` always appends, never replaces.
    pub fn merge_tool_fragment(&mut self, index: u32, id: Option<&str>, name: Option<&str>, arguments: Option<&str>) {
        let draft = self.drafts.entry(index).or_insert_with(|| ToolCallDraft {
            index,
            id: String::new(),
            name: String::new(),
            arguments: String::new(),
        });
        if let Some(id) = id {
            draft.id = id.to_owned();
        }
        if let Some(name) = name {
            draft.name = name.to_owned();
        }
        if let Some(fragment) = arguments {
            draft.arguments.push_str(fragment);
        }
    }

    /// Buffer a fully-formed SSE frame carrying tool-call data for replay
    pub fn push_raw_tool_event(&mut self, frame: String) {
        self.raw_tool_call_events.push(frame);
    }

    /// Record usage, replacing any earlier (running) value
    pub fn record_usage(&mut self, usage: Usage) {
        self.usage = Some(usage);
    }

    /// Record a finish reason and enter the `Final` phase
    ///
    /// The first recorded reason is sticky; later chunks cannot clear or
    /// replace it.
    pub fn record_stop_reason(&mut self, reason: &str) {
        if self.stop_reason.is_none() {
            self.stop_reason = Some(reason.to_owned());
        }
        self.phase = StreamPhase::Final;
    }

    /// Enter the `Final` phase without a reason (terminal usage chunk or
    /// end sentinel)
    pub fn mark_final(&mut self) {
        self.phase = StreamPhase::Final;
    }

    pub const fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn response_id(&self) -> Option<&str> {
        self.response_id.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Full accumulated text
    pub fn text(&self) -> &str {
        &self.text
    }

    pub const fn usage(&self) -> Option<Usage> {
        self.usage
    }

    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }

    /// Whether any tool-call fragment arrived
    pub fn has_tool_calls(&self) -> bool {
        !self.drafts.is_empty()
    }

    /// Whether the given stream index belongs to a tool call
    pub fn is_tool_index(&self, index: u32) -> bool {
        self.drafts.contains_key(&index)
    }

    /// Draft slots in stream-index order
    pub fn drafts(&self) -> impl Iterator<Item = &ToolCallDraft> {
        self.drafts.values()
    }

    /// Buffered raw tool-call frames in arrival order
    pub fn raw_tool_call_events(&self) -> &[String] {
        &self.raw_tool_call_events
    }

    /// Completed tool calls in stream-index order
    ///
    /// Accumulated argument strings are parsed as JSON with an empty-object
    /// fallback for fragments that never completed.
    pub fn completed_tool_calls(&self) -> Vec<ToolCall> {
        self.drafts
            .values()
            .map(|draft| ToolCall {
                id: draft.id.clone(),
                name: draft.name.clone(),
                arguments: ToolCall::parse_arguments(&draft.arguments),
            })
            .collect()
    }

    /// Time from accumulator creation to the first chunk
    pub fn first_chunk_latency(&self) -> Option<Duration> {
        self.first_chunk_at.map(|at| at.duration_since(self.started_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_chunk_recorded_once() {
        let mut acc = StreamAccumulator::new();
        assert_eq!(acc.phase(), StreamPhase::Idle);

        acc.mark_chunk();
        let first = acc.first_chunk_latency();
        assert!(first.is_some());
        assert_eq!(acc.phase(), StreamPhase::Streaming);

        std::thread::sleep(Duration::from_millis(2));
        acc.mark_chunk();
        assert_eq!(acc.first_chunk_latency(), first);
    }

    #[test]
    fn tool_fragments_merge_by_stream_index() {
        let mut acc = StreamAccumulator::new();

        // Fragments interleave across two calls; index 1 starts first.
        acc.merge_tool_fragment(1, Some("call_b"), Some("write_file"), None);
        acc.merge_tool_fragment(0, Some("call_a"), Some("read_file"), Some("{\"path\":"));
        acc.merge_tool_fragment(1, None, None, Some("{\"data\":"));
        acc.merge_tool_fragment(0, None, None, Some("\"/tmp/x\"}"));
        acc.merge_tool_fragment(1, None, None, Some("\"hi\"}"));

        let calls = acc.completed_tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "call_a");
        assert_eq!(calls[0].name, "read_file");
        assert_eq!(calls[0].arguments["path"], "/tmp/x");
        assert_eq!(calls[1].id, "call_b");
        assert_eq!(calls[1].arguments["data"], "hi");
    }

    #[test]
    fn arguments_append_in_arrival_order() {
        let mut acc = StreamAccumulator::new();
        acc.merge_tool_fragment(0, Some("c1"), Some("run"), None);
        for fragment in ["{\"cmd\"", ":", "\"ls\"", "}"] {
            acc.merge_tool_fragment(0, None, None, Some(fragment));
        }

        let draft = acc.drafts().next().unwrap();
        assert_eq!(draft.arguments, "{\"cmd\":\"ls\"}");
        assert_eq!(acc.completed_tool_calls()[0].arguments["cmd"], "ls");
    }

    #[test]
    fn stop_reason_is_sticky() {
        let mut acc = StreamAccumulator::new();
        acc.record_stop_reason("tool_calls");
        acc.record_stop_reason("stop");
        assert_eq!(acc.stop_reason(), Some("tool_calls"));
        assert_eq!(acc.phase(), StreamPhase::Final);
    }

    #[test]
    fn identity_refreshes_from_later_chunks() {
        let mut acc = StreamAccumulator::new();
        acc.record_identity(Some("chatcmpl-1"), None);
        acc.record_identity(None, Some("gpt-5"));
        assert_eq!(acc.response_id(), Some("chatcmpl-1"));
        assert_eq!(acc.model(), Some("gpt-5"));
    }

    #[test]
    fn unfinished_arguments_fall_back_to_empty_object() {
        let mut acc = StreamAccumulator::new();
        acc.merge_tool_fragment(0, Some("c1"), Some("run"), Some("{\"cmd\": \"l"));
        assert_eq!(acc.completed_tool_calls()[0].arguments, serde_json::json!({}));
    }
}
