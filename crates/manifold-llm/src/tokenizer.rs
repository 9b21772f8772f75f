//! Token counting over tiktoken vocabularies

use std::sync::LazyLock;

use tiktoken_rs::CoreBPE;
use tiktoken_rs::tokenizer::{Tokenizer, get_tokenizer};

static O200K: LazyLock<Option<CoreBPE>> = LazyLock::new(|| tiktoken_rs::o200k_base().ok());
static CL100K: LazyLock<Option<CoreBPE>> = LazyLock::new(|| tiktoken_rs::cl100k_base().ok());

/// Count the tokens `text` occupies in the vocabulary `model` uses
///
/// Non-OpenAI and unknown models count with the o200k vocabulary, which
/// tracks modern tokenizers closely enough for budget decisions. When no
/// encoder can be built the estimate falls back to four bytes per token.
pub fn count_tokens(model: &str, text: &str) -> usize {
    let encoder = match get_tokenizer(model) {
        Some(Tokenizer::Cl100kBase) => &*CL100K,
        _ => &*O200K,
    };
    encoder
        .as_ref()
        .map_or_else(|| text.len() / 4, |bpe| bpe.encode_with_special_tokens(text).len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_are_stable_and_positive() {
        let first = count_tokens("gpt-4o", "the quick brown fox jumps over the lazy dog");
        let second = count_tokens("gpt-4o", "the quick brown fox jumps over the lazy dog");
        assert!(first > 0);
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_models_still_count() {
        assert!(count_tokens("claude-sonnet-4-20250514", "hello world") > 0);
        assert!(count_tokens("some-local-llama", "hello world") > 0);
    }

    #[test]
    fn empty_text_is_zero() {
        assert_eq!(count_tokens("gpt-4o", ""), 0);
    }

    #[test]
    fn longer_text_costs_more() {
        let short = count_tokens("gpt-4o-mini", "one sentence.");
        let long = count_tokens("gpt-4o-mini", &"one sentence. ".repeat(50));
        assert!(long > short);
    }
}
