//! Fitting a (code, analysis) pair into a single request

use super::{char_len, prefix_chars, CharRatio, TokenEstimator};

/// Default budget for chat and rule-generation context, in tokens.
pub const DEFAULT_CONTEXT_TOKENS: usize = 1500;

/// Separator between code and analysis when both are sent together.
const PAIR_SEPARATOR_CHARS: usize = 2;

/// Chars reserved for prompt scaffolding around the chat context.
const PROMPT_MARGIN_CHARS: isize = 100;

/// Below this many chars of code, chat truncates the analysis too.
const MIN_CODE_CHARS: isize = 100;

/// Which side of a [`BudgetedPair`] survived untruncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    Both,
    AnalysisOnly,
    CodeOnly,
    Neither,
}

impl Retention {
    fn of(code_kept: bool, analysis_kept: bool) -> Self {
        match (code_kept, analysis_kept) {
            (true, true) => Retention::Both,
            (false, true) => Retention::AnalysisOnly,
            (true, false) => Retention::CodeOnly,
            (false, false) => Retention::Neither,
        }
    }
}

/// Code and analysis trimmed to fit one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetedPair<'a> {
    pub code: &'a str,
    pub analysis: &'a str,
    pub retention: Retention,
}

impl<'a> BudgetedPair<'a> {
    fn new(code: &'a str, analysis: &'a str, original: (&str, &str)) -> Self {
        Self {
            code,
            analysis,
            retention: Retention::of(
                code.len() == original.0.len(),
                analysis.len() == original.1.len(),
            ),
        }
    }

    fn untouched(code: &'a str, analysis: &'a str) -> Self {
        Self {
            code,
            analysis,
            retention: Retention::Both,
        }
    }
}

fn fits(code: &str, analysis: &str, char_limit: usize) -> bool {
    char_len(code) + char_len(analysis) + PAIR_SEPARATOR_CHARS <= char_limit
}

/// Chat policy with the default 4 chars/token estimator.
pub fn budget_chat<'a>(code: &'a str, analysis: &'a str, budget_tokens: usize) -> BudgetedPair<'a> {
    budget_chat_with(code, analysis, budget_tokens, &CharRatio::default())
}

/// Chat policy: the analysis keeps priority over the code.
///
/// Code gets whatever is left after the whole analysis and a scaffolding
/// margin. If that leaves less than a minimal excerpt, both are cut: code to
/// the (possibly empty) remainder and analysis to half the char budget.
pub fn budget_chat_with<'a, E: TokenEstimator + ?Sized>(
    code: &'a str,
    analysis: &'a str,
    budget_tokens: usize,
    estimator: &E,
) -> BudgetedPair<'a> {
    let char_limit = estimator.char_budget(budget_tokens);
    if fits(code, analysis, char_limit) {
        return BudgetedPair::untouched(code, analysis);
    }

    let max_code = to_signed(char_limit)
        .saturating_sub(to_signed(char_len(analysis)))
        .saturating_sub(PROMPT_MARGIN_CHARS);
    let code_cut = prefix_chars(code, max_code.max(0) as usize);

    let pair = if max_code < MIN_CODE_CHARS {
        BudgetedPair::new(code_cut, prefix_chars(analysis, char_limit / 2), (code, analysis))
    } else {
        BudgetedPair::new(code_cut, analysis, (code, analysis))
    };

    tracing::debug!(
        budget_tokens,
        max_code,
        code_chars = char_len(pair.code),
        analysis_chars = char_len(pair.analysis),
        retention = ?pair.retention,
        "budgeted chat context"
    );
    pair
}

/// Rule-generation policy with the default 4 chars/token estimator.
pub fn budget_rules<'a>(code: &'a str, analysis: &'a str, budget_tokens: usize) -> BudgetedPair<'a> {
    budget_rules_with(code, analysis, budget_tokens, &CharRatio::default())
}

/// Rule-generation policy: code and analysis are cut independently.
///
/// Each side gets the char equivalent of twice the token budget, so the
/// pair may exceed the nominal budget. Rules need both the code and the
/// vulnerability description.
pub fn budget_rules_with<'a, E: TokenEstimator + ?Sized>(
    code: &'a str,
    analysis: &'a str,
    budget_tokens: usize,
    estimator: &E,
) -> BudgetedPair<'a> {
    let char_limit = estimator.char_budget(budget_tokens);
    if fits(code, analysis, char_limit) {
        return BudgetedPair::untouched(code, analysis);
    }

    let per_side = estimator.char_budget(budget_tokens.saturating_mul(2));
    let pair = BudgetedPair::new(
        prefix_chars(code, per_side),
        prefix_chars(analysis, per_side),
        (code, analysis),
    );

    tracing::debug!(
        budget_tokens,
        per_side,
        retention = ?pair.retention,
        "budgeted rule context"
    );
    pair
}

fn to_signed(n: usize) -> isize {
    isize::try_from(n).unwrap_or(isize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_under_budget_is_untouched() {
        let pair = budget_chat("let x = 1;", "No issues found.", DEFAULT_CONTEXT_TOKENS);
        assert_eq!(pair.code, "let x = 1;");
        assert_eq!(pair.analysis, "No issues found.");
        assert_eq!(pair.retention, Retention::Both);
    }

    #[test]
    fn test_chat_separator_counts_against_budget() {
        // 4 + 2 + 2 = 8 chars fits a 2-token budget, 5 + 2 + 2 does not.
        let pair = budget_chat("abcd", "ef", 2);
        assert_eq!(pair.retention, Retention::Both);

        let pair = budget_chat("abcde", "ef", 2);
        assert_ne!(pair.retention, Retention::Both);
    }

    #[test]
    fn test_chat_truncates_only_code_when_room_remains() {
        let code = "c".repeat(10_000);
        let analysis = "a".repeat(500);
        // limit 6000, max_code = 6000 - 500 - 100 = 5400
        let pair = budget_chat(&code, &analysis, 1500);
        assert_eq!(pair.code.len(), 5400);
        assert_eq!(pair.analysis, analysis);
        assert_eq!(pair.retention, Retention::AnalysisOnly);
    }

    #[test]
    fn test_chat_tiny_budget_truncates_both() {
        let code = "c".repeat(10_000);
        let analysis = "a".repeat(50);
        // limit 40, max_code = 40 - 50 - 100 = -110
        let pair = budget_chat(&code, &analysis, 10);
        assert_eq!(pair.code, "");
        assert_eq!(pair.analysis, "a".repeat(20));
        assert_eq!(pair.retention, Retention::Neither);
    }

    #[test]
    fn test_chat_short_analysis_survives_dual_truncation() {
        let code = "c".repeat(1000);
        // limit 400, max_code = 400 - 250 - 100 = 50 < 100
        let analysis = "a".repeat(250);
        let pair = budget_chat(&code, &analysis, 100);
        assert_eq!(pair.code.len(), 50);
        assert_eq!(pair.analysis.len(), 200);

        let analysis = "a".repeat(150);
        // limit 200, max_code = 200 - 150 - 100 = -50; analysis cap 100
        let pair = budget_chat(&code, &analysis, 50);
        assert_eq!(pair.code, "");
        assert_eq!(pair.analysis.len(), 100);
    }

    #[test]
    fn test_chat_minimum_code_threshold() {
        let code = "c".repeat(1000);

        // limit 400, max_code = 400 - 200 - 100 = 100: analysis kept whole
        let analysis = "a".repeat(200);
        let pair = budget_chat(&code, &analysis, 100);
        assert_eq!(pair.code.len(), 100);
        assert_eq!(pair.analysis, analysis);
        assert_eq!(pair.retention, Retention::AnalysisOnly);

        // max_code = 99: analysis capped at 200 too
        let analysis = "a".repeat(201);
        let pair = budget_chat(&code, &analysis, 100);
        assert_eq!(pair.code.len(), 99);
        assert_eq!(pair.analysis.len(), 200);
        assert_eq!(pair.retention, Retention::Neither);
    }

    #[test]
    fn test_chat_zero_budget_empties_both() {
        let pair = budget_chat("code", "analysis", 0);
        assert_eq!(pair.code, "");
        assert_eq!(pair.analysis, "");
    }

    #[test]
    fn test_rules_under_budget_is_untouched() {
        let pair = budget_rules("x", "y", DEFAULT_CONTEXT_TOKENS);
        assert_eq!(pair.retention, Retention::Both);
    }

    #[test]
    fn test_rules_equal_split_with_doubled_allowance() {
        let code = "c".repeat(20_000);
        let analysis = "a".repeat(20_000);
        let pair = budget_rules(&code, &analysis, 1500);
        assert_eq!(pair.code.len(), 12_000);
        assert_eq!(pair.analysis.len(), 12_000);
        assert_eq!(pair.retention, Retention::Neither);
    }

    #[test]
    fn test_rules_keeps_side_that_fits_its_share() {
        let code = "c".repeat(100);
        let analysis = "a".repeat(20_000);
        let pair = budget_rules(&code, &analysis, 10);
        assert_eq!(pair.code.len(), 80);
        assert_eq!(pair.analysis.len(), 80);

        let pair = budget_rules(&code, &analysis, 20);
        assert_eq!(pair.code, code);
        assert_eq!(pair.analysis.len(), 160);
        assert_eq!(pair.retention, Retention::CodeOnly);
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let code = "é".repeat(300);
        let pair = budget_rules(&code, "", 10);
        assert_eq!(pair.code.chars().count(), 80);
    }

    #[test]
    fn test_custom_estimator_scales_budgets() {
        let est = CharRatio::new(2);
        let code = "c".repeat(1000);
        let pair = budget_rules_with(&code, "", 100, &est);
        assert_eq!(pair.code.len(), 400);
    }
}
