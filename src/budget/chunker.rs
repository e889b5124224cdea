//! Line-boundary chunking for oversized inputs

use super::{char_len, CharRatio, TokenEstimator};

/// Default chunk size for full-code analysis, in tokens.
pub const DEFAULT_CHUNK_TOKENS: usize = 2000;

/// One line-aligned slice of a larger text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// 1-based position
    pub index: usize,
    pub total: usize,
    pub text: &'a str,
}

impl Chunk<'_> {
    /// Header prefixed to this chunk's model response.
    pub fn label(&self) -> String {
        format!("[Analysis Part {}/{}]", self.index, self.total)
    }
}

/// Result of [`split`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Split<'a> {
    /// Fits the budget as-is.
    Whole(&'a str),
    /// Needed chunking. Never empty.
    Chunks(Vec<Chunk<'a>>),
}

impl<'a> Split<'a> {
    pub fn is_chunked(&self) -> bool {
        matches!(self, Split::Chunks(_))
    }

    /// Texts in order, one element for `Whole`.
    pub fn texts(&self) -> Vec<&'a str> {
        match self {
            Split::Whole(text) => vec![*text],
            Split::Chunks(chunks) => chunks.iter().map(|c| c.text).collect(),
        }
    }
}

/// Split `text` into chunks of at most `budget_tokens` (4 chars per token).
pub fn split(text: &str, budget_tokens: usize) -> Split<'_> {
    split_with(text, budget_tokens, &CharRatio::default())
}

/// Split `text` at line boundaries so every chunk fits `budget_tokens`.
///
/// A line is never cut: a single line longer than the budget becomes its own
/// oversized chunk. Each line costs its length plus one for the newline.
/// Chunks borrow from `text`, and joining them with `\n` gives `text` back.
pub fn split_with<'a, E: TokenEstimator + ?Sized>(
    text: &'a str,
    budget_tokens: usize,
    estimator: &E,
) -> Split<'a> {
    let char_limit = estimator.char_budget(budget_tokens);

    if char_len(text) <= char_limit {
        return Split::Whole(text);
    }

    // Byte ranges of sealed chunks
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    let mut current: Option<(usize, usize)> = None;
    let mut current_size = 0usize;
    let mut offset = 0usize;

    for line in text.split('\n') {
        let line_start = offset;
        let line_end = offset + line.len();
        offset = line_end + 1;

        let line_size = char_len(line) + 1;

        current = match current {
            Some(range) if current_size + line_size > char_limit => {
                ranges.push(range);
                current_size = line_size;
                Some((line_start, line_end))
            }
            Some((start, _)) => {
                current_size += line_size;
                Some((start, line_end))
            }
            None => {
                current_size = line_size;
                Some((line_start, line_end))
            }
        };
    }

    if let Some(range) = current {
        ranges.push(range);
    }

    let total = ranges.len();
    let chunks = ranges
        .into_iter()
        .enumerate()
        .map(|(i, (start, end))| Chunk {
            index: i + 1,
            total,
            text: &text[start..end],
        })
        .collect();

    tracing::debug!(chunks = total, char_limit, "split oversized text");
    Split::Chunks(chunks)
}
