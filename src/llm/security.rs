//! Security analysis, chat and rule suggestion requests
//!
//! Each entry point fits its inputs to the model's context (chunking for full
//! analysis, pair budgeting for chat and rules) and then calls the completion
//! backend. A backend rejection for size is turned into a readable message
//! instead of an error; every other failure is returned as-is.

use super::client::{Completion, CompletionRequest};
use super::prompts::{
    rule_suggestion_user, security_analysis_user, security_chat_user, RULE_SUGGESTION_SYSTEM,
    SECURITY_ANALYSIS_SYSTEM, SECURITY_CHAT_SYSTEM,
};
use crate::budget::{
    budget_chat, budget_rules, split, Split, DEFAULT_CHUNK_TOKENS, DEFAULT_CONTEXT_TOKENS,
};
use crate::config::Config;
use crate::scanner::ScanReport;
use crate::session::{ChatMessage, Session};
use futures::stream::{self, StreamExt, TryStreamExt};

pub const ANALYSIS_TOO_LARGE: &str = "❌ Error: Code size exceeds model's capacity even after chunking. Please try analyzing a smaller code sample.";
pub const RULES_TOO_LARGE: &str = "❌ Error: Input size exceeds model's capacity even after chunking. Please try with a smaller code sample.";
pub const CHAT_TOO_LARGE: &str = "❌ Error: The conversation context exceeds the model's capacity. Try a shorter question or a smaller code sample.";

/// Separator between labelled chunk analyses
const PART_SEPARATOR: &str = "\n\n";

/// Budgets and limits for one run
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub chunk_tokens: usize,
    pub chat_budget_tokens: usize,
    pub rules_budget_tokens: usize,
    pub history_window: usize,
    /// Chunk requests in flight at once
    pub concurrency: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            chunk_tokens: DEFAULT_CHUNK_TOKENS,
            chat_budget_tokens: DEFAULT_CONTEXT_TOKENS,
            rules_budget_tokens: DEFAULT_CONTEXT_TOKENS,
            history_window: 5,
            concurrency: 1,
        }
    }
}

impl AnalysisOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_tokens: config.analysis_chunk_tokens,
            chat_budget_tokens: config.chat_budget_tokens,
            rules_budget_tokens: config.rules_budget_tokens,
            history_window: config.chat_history_window,
            concurrency: config.analysis_concurrency.max(1),
        }
    }
}

/// Whether a backend error means the request was too big for the model.
pub fn is_size_exceeded(err: &anyhow::Error) -> bool {
    let message = format!("{:#}", err).to_lowercase();
    message.contains("413") || message.contains("too large")
}

fn or_size_message(result: anyhow::Result<String>, message: &str) -> anyhow::Result<String> {
    match result {
        Err(err) if is_size_exceeded(&err) => {
            tracing::warn!("request rejected as too large: {:#}", err);
            Ok(message.to_string())
        }
        other => other,
    }
}

/// Analyze `code` together with the Semgrep findings.
///
/// Oversized code is split at line boundaries. Every chunk is sent with the
/// full findings, and the answers come back labelled `[Analysis Part i/N]`
/// and joined in chunk order.
pub async fn analyze_security<C: Completion>(
    scan: &ScanReport,
    code: &str,
    llm: &C,
    options: &AnalysisOptions,
) -> anyhow::Result<String> {
    let result = analyze_chunks(scan, code, llm, options).await;
    or_size_message(result, ANALYSIS_TOO_LARGE)
}

async fn analyze_chunks<C: Completion>(
    scan: &ScanReport,
    code: &str,
    llm: &C,
    options: &AnalysisOptions,
) -> anyhow::Result<String> {
    let scan_json = scan.to_prompt_json();

    match split(code, options.chunk_tokens) {
        Split::Whole(text) => {
            let request =
                CompletionRequest::new(SECURITY_ANALYSIS_SYSTEM, security_analysis_user(&scan_json, text));
            llm.complete(&request).await
        }
        Split::Chunks(chunks) => {
            tracing::info!(
                parts = chunks.len(),
                concurrency = options.concurrency,
                "analyzing code in chunks"
            );

            // `buffered` yields in input order regardless of completion order.
            let parts: Vec<String> = stream::iter(chunks.iter().map(|chunk| {
                let request = CompletionRequest::new(
                    SECURITY_ANALYSIS_SYSTEM,
                    security_analysis_user(&scan_json, chunk.text),
                );
                async move {
                    tracing::debug!(part = chunk.index, total = chunk.total, "sending chunk");
                    let response = llm.complete(&request).await?;
                    Ok::<_, anyhow::Error>(format!("{}\n\n{}", chunk.label(), response))
                }
            }))
            .buffered(options.concurrency.max(1))
            .try_collect()
            .await?;

            Ok(parts.join(PART_SEPARATOR))
        }
    }
}

/// Answer a follow-up question about the session's code and analysis.
///
/// The query and the reply are appended to the session history. The model
/// sees at most `history_window` earlier messages.
pub async fn security_chat<C: Completion>(
    session: &mut Session,
    query: &str,
    llm: &C,
    options: &AnalysisOptions,
) -> anyhow::Result<String> {
    let request = {
        let pair = budget_chat(&session.code, &session.analysis, options.chat_budget_tokens);
        CompletionRequest::new(
            SECURITY_CHAT_SYSTEM,
            security_chat_user(pair.code, pair.analysis, query),
        )
        .with_history(session.recent_history(options.history_window))
    };

    tracing::debug!(session = %session.id, history = request.history.len(), "chat turn");
    session.record(ChatMessage::human(query));

    let response = or_size_message(llm.complete(&request).await, CHAT_TOO_LARGE)?;
    session.record(ChatMessage::assistant(response.clone()));
    Ok(response)
}

/// Ask the model for Semgrep rules matching the identified vulnerabilities.
pub async fn suggest_rules<C: Completion>(
    code: &str,
    analysis: &str,
    llm: &C,
    options: &AnalysisOptions,
) -> anyhow::Result<String> {
    let pair = budget_rules(code, analysis, options.rules_budget_tokens);
    let request = CompletionRequest::new(
        RULE_SUGGESTION_SYSTEM,
        rule_suggestion_user(pair.code, pair.analysis),
    );
    or_size_message(llm.complete(&request).await, RULES_TOO_LARGE)
}
