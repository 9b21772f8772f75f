//! Server-sent-event wire fragments
//!
//! The gateway forwards upstream frames verbatim where it can, but refusal
//! substitution and stream finalization require synthesizing frames in the
//! exact form providers emit: `data: <json>\n\n`, with `data: [DONE]\n\n`
//! as the end sentinel and an optional `event:` line for providers that
//! name their events.

/// Terminal sentinel frame for `OpenAI`-family streams
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// One `data:` frame carrying a JSON payload
pub fn data_frame(payload: &serde_json::Value) -> String {
    raw_data_frame(&payload.to_string())
}

/// One `data:` frame carrying an already-serialized payload, used when
/// forwarding an upstream chunk without re-encoding it
pub fn raw_data_frame(payload: &str) -> String {
    format!("data: {payload}\n\n")
}

/// One named-event frame (`event:` line followed by `data:`), the form
/// Anthropic streams use
pub fn event_frame(event: &str, payload: &serde_json::Value) -> String {
    raw_event_frame(event, &payload.to_string())
}

/// Named-event frame with an already-serialized payload
pub fn raw_event_frame(event: &str, payload: &str) -> String {
    format!("event: {event}\ndata: {payload}\n\n")
}
