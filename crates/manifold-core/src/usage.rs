use serde::{Deserialize, Serialize};

/// Token usage view normalized across providers
///
/// Absent upstream usage maps to zeros, never null, so downstream
/// arithmetic stays total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub input_tokens: u64,
    /// Tokens generated in the completion
    pub output_tokens: u64,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Total tokens across prompt and completion
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}
