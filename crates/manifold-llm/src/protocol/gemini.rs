//! Gemini `generateContent` API wire format types

use serde::{Deserialize, Serialize};

// -- Request types --

/// Gemini request view
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    /// Conversation turns
    #[serde(default)]
    pub contents: Vec<GeminiContent>,
    /// System instruction, outside the turn list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    /// Tool declarations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<GeminiTool>>,
    /// Gateway-level model hint. The native API carries the model in the
    /// endpoint path, so this field is stripped before forwarding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Gateway-level streaming hint. The native API selects streaming via
    /// the endpoint path, so this field is stripped before forwarding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// One conversation turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    /// Turn role ("user" or "model"), absent on system instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// Part within a turn; exactly one field is populated per part
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    /// Text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Function call requested by the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<GeminiFunctionCall>,
    /// Function result supplied by the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<GeminiFunctionResponse>,
    /// Inline binary data, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<serde_json::Value>,
}

/// Function call with structured arguments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiFunctionCall {
    /// Function name; Gemini has no separate call identifier
    pub name: String,
    /// Structured arguments
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Function result correlated by name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiFunctionResponse {
    /// Name of the function this result answers
    pub name: String,
    /// Result payload, always a JSON object on the wire
    #[serde(default)]
    pub response: serde_json::Value,
}

/// Tool declaration group
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiTool {
    /// Declared functions
    #[serde(default)]
    pub function_declarations: Vec<GeminiFunctionDeclaration>,
}

/// One declared function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiFunctionDeclaration {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for parameters
    #[serde(default)]
    pub parameters: serde_json::Value,
}

// -- Response types --
//
// Streamed chunks reuse the response shape: each `data:` frame is a partial
// `GeminiResponse` and the stream ends without a sentinel.

/// Gemini response view, also one streamed chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    /// Completion candidates
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    /// Token usage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<GeminiUsageMetadata>,
    /// Response identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    /// Concrete model version that served the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

/// One completion candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    /// Generated content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<GeminiContent>,
    /// Reason generation stopped (e.g. "STOP", "MAX_TOKENS")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    /// Candidate index
    #[serde(default)]
    pub index: u32,
}

/// Gemini token usage block
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiUsageMetadata {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_token_count: u64,
    /// Tokens across candidates
    #[serde(default)]
    pub candidates_token_count: u64,
    /// Total tokens
    #[serde(default)]
    pub total_token_count: u64,
}

// -- Error response --

/// Gemini error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiErrorResponse {
    /// Error details
    pub error: GeminiErrorDetail,
}

/// Gemini error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiErrorDetail {
    /// Numeric status code
    #[serde(default)]
    pub code: Option<i64>,
    /// Human-readable message
    pub message: String,
    /// Status name (e.g. "INVALID_ARGUMENT")
    #[serde(default)]
    pub status: Option<String>,
}
