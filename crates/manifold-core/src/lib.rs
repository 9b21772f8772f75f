//! Canonical message model shared across the Manifold gateway
//!
//! Provider-agnostic types for messages, tool definitions, tool calls, tool
//! results and usage. Every wire format converts to and from these types at
//! the adapter boundary; nothing in here knows about any provider's JSON.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod message;
pub mod sse;
pub mod stats;
pub mod tool;
pub mod usage;

pub use message::{Content, ContentPart, Message, Role};
pub use stats::CompressionStats;
pub use tool::{ToolCall, ToolDefinition, ToolResult};
pub use usage::Usage;
