//! Token estimation, chunking and context budgeting
//!
//! Everything in here is pure: no I/O, no errors. Sizes are measured in
//! chars (Unicode scalar values), never bytes, so every cut lands on a
//! valid `str` boundary.

pub mod chunker;
pub mod pair;

pub use chunker::{split, split_with, Chunk, Split, DEFAULT_CHUNK_TOKENS};
pub use pair::{
    budget_chat, budget_chat_with, budget_rules, budget_rules_with, BudgetedPair, Retention,
    DEFAULT_CONTEXT_TOKENS,
};

// ═══════════════════════════════════════════════════════════════════════════
//  TOKEN ESTIMATION
// ═══════════════════════════════════════════════════════════════════════════

/// Rough approximation: 1 token ≈ 4 characters
pub const CHARS_PER_TOKEN: usize = 4;

/// Converts between model tokens and text size.
///
/// The chunker and the budgeter only ever ask for a char budget, so an exact
/// tokenizer can be dropped in here without touching either algorithm.
pub trait TokenEstimator {
    /// Estimated number of tokens `text` will cost.
    fn estimate_tokens(&self, text: &str) -> usize;

    /// Number of chars that fit in `tokens`.
    fn char_budget(&self, tokens: usize) -> usize;
}

/// Fixed chars-per-token ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharRatio {
    chars_per_token: usize,
}

impl CharRatio {
    /// A ratio of 0 is treated as 1.
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for CharRatio {
    fn default() -> Self {
        Self::new(CHARS_PER_TOKEN)
    }
}

impl TokenEstimator for CharRatio {
    fn estimate_tokens(&self, text: &str) -> usize {
        char_len(text).div_ceil(self.chars_per_token)
    }

    fn char_budget(&self, tokens: usize) -> usize {
        tokens.saturating_mul(self.chars_per_token)
    }
}

/// Length in chars.
pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// First `max_chars` chars of `s` (Unicode-safe prefix cut, no ellipsis).
pub fn prefix_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_ratio_estimates_round_up() {
        let est = CharRatio::default();
        assert_eq!(est.estimate_tokens(""), 0);
        assert_eq!(est.estimate_tokens("hi"), 1);
        assert_eq!(est.estimate_tokens("hello world"), 3);
    }

    #[test]
    fn test_char_budget_uses_ratio() {
        assert_eq!(CharRatio::default().char_budget(2000), 8000);
        assert_eq!(CharRatio::new(3).char_budget(10), 30);
        assert_eq!(CharRatio::new(0).char_budget(10), 10);
    }

    #[test]
    fn test_char_budget_saturates() {
        assert_eq!(CharRatio::default().char_budget(usize::MAX), usize::MAX);
    }

    #[test]
    fn test_prefix_chars_unicode_safe() {
        assert_eq!(prefix_chars("ééééé", 2), "éé");
        assert_eq!(prefix_chars("こんにちは", 0), "");
        assert_eq!(prefix_chars("abc", 10), "abc");
    }

    #[test]
    fn test_char_len_counts_scalars() {
        assert_eq!(char_len("héllo"), 5);
        assert_eq!("héllo".len(), 6);
    }
}
