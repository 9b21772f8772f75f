use serde::{Deserialize, Serialize};

/// A tool invocation requested by the model
///
/// `arguments` is always structured data: wire formats that deliver
/// arguments as a raw JSON string are parsed at the adapter boundary,
/// falling back to an empty object when the string is unparseable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-issued identifier, opaque and unique within one response
    pub id: String,
    /// Name of the tool to invoke
    pub name: String,
    /// Structured invocation arguments
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Parse a wire-format argument string, defaulting to `{}` when the
    /// fragment is not valid JSON.
    pub fn parse_arguments(raw: &str) -> serde_json::Value {
        if raw.trim().is_empty() {
            return serde_json::Value::Object(serde_json::Map::new());
        }
        serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()))
    }
}

/// Outcome of a tool invocation, attached to the message that reports it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result responds to
    pub id: String,
    /// Name of the tool that produced the result, `"unknown"` when the
    /// originating call cannot be correlated
    pub name: String,
    /// Output content from the tool
    pub content: String,
    /// Whether the tool reported failure
    #[serde(default)]
    pub is_error: bool,
}

/// Definition of a tool offered to the provider, never mutated after
/// construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's parameters
    pub input_schema: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_arguments_falls_back_to_empty_object() {
        assert_eq!(ToolCall::parse_arguments("{\"a\":1}"), serde_json::json!({"a": 1}));
        assert_eq!(ToolCall::parse_arguments("not json"), serde_json::json!({}));
        assert_eq!(ToolCall::parse_arguments(""), serde_json::json!({}));
        assert_eq!(ToolCall::parse_arguments("  "), serde_json::json!({}));
    }
}
