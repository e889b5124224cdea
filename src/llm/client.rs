use super::models::{is_known_model, Usage};
use crate::config::{Config, API_KEY_ENV};
use crate::session::ChatMessage;
use crate::util::truncate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Groq OpenAI-compatible chat completions endpoint
const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Rate limit retry configuration
const INITIAL_BACKOFF_MS: u64 = 2000; // 2 seconds
const BACKOFF_MULTIPLIER: u64 = 2; // Exponential backoff
const MAX_BACKOFF_SECS: u64 = 60;

/// One prompt for the model: system instructions, prior turns, then the user
/// message.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub system: String,
    pub history: Vec<ChatMessage>,
    pub user: String,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            history: Vec::new(),
            user: user.into(),
        }
    }

    pub fn with_history(mut self, history: &[ChatMessage]) -> Self {
        self.history = history.to_vec();
        self
    }

    fn messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(Message {
            role: "system".to_string(),
            content: self.system.clone(),
        });
        messages.extend(self.history.iter().map(|m| Message {
            role: m.role.api_name().to_string(),
            content: m.content.clone(),
        }));
        messages.push(Message {
            role: "user".to_string(),
            content: self.user.clone(),
        });
        messages
    }
}

/// Text completion capability.
///
/// Failures are plain `anyhow` errors. A request the backend rejects for size
/// renders with "413" or "too large" in its message.
#[allow(async_fn_in_trait)]
pub trait Completion {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String>;
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

/// Client for Groq-hosted models
#[derive(Debug, Clone)]
pub struct GroqClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    max_retries: u32,
}

impl GroqClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
        max_retries: u32,
    ) -> anyhow::Result<Self> {
        let model = model.into();
        if !is_known_model(&model) {
            tracing::warn!(model = %model, "model id is not in the known list; sending as-is");
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model,
            temperature,
            max_retries,
        })
    }

    /// Build a client from config, failing if no API key is available.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let api_key = config.get_api_key().ok_or_else(|| {
            anyhow::anyhow!(
                "No API key configured. Set {} or run 'securecode setup'.",
                API_KEY_ENV
            )
        })?;
        Self::new(
            api_key,
            config.model.clone(),
            config.temperature,
            config.llm_timeout(),
            config.llm_max_retries,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Call the API with automatic retry and exponential backoff on rate limits.
    pub async fn complete_with_usage(
        &self,
        request: &CompletionRequest,
    ) -> anyhow::Result<(String, Option<Usage>)> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: request.messages(),
            temperature: self.temperature,
            stream: false,
        };

        let mut retry_count = 0;

        loop {
            let response = self
                .http
                .post(GROQ_URL)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            let header_retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = response.text().await?;

            if status.is_success() {
                let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
                    anyhow::anyhow!("Failed to parse Groq response: {}\n{}", e, truncate(&text, 200))
                })?;

                let content = parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .unwrap_or_default();

                if let Some(usage) = &parsed.usage {
                    tracing::debug!(
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        total_tokens = usage.total_tokens,
                        "completion usage"
                    );
                }

                return Ok((content, parsed.usage));
            }

            if status.as_u16() == 429 && retry_count < self.max_retries {
                retry_count += 1;

                let retry_after = header_retry_after
                    .or_else(|| parse_retry_after(&text))
                    .unwrap_or_else(|| backoff_secs(retry_count));

                tracing::warn!(
                    "rate limited; retrying in {}s (attempt {}/{})",
                    retry_after,
                    retry_count,
                    self.max_retries
                );
                tokio::time::sleep(Duration::from_secs(retry_after)).await;
                continue;
            }

            return Err(anyhow::anyhow!(
                "{}",
                error_message(status.as_u16(), &text, retry_count)
            ));
        }
    }
}

impl Completion for GroqClient {
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String> {
        let (content, _usage) = self.complete_with_usage(request).await?;
        Ok(content)
    }
}

fn backoff_secs(retry_count: u32) -> u64 {
    let factor = BACKOFF_MULTIPLIER.saturating_pow(retry_count.saturating_sub(1));
    (INITIAL_BACKOFF_MS.saturating_mul(factor) / 1000).min(MAX_BACKOFF_SECS)
}

/// Extract a retry-after hint from an error body (if present)
fn parse_retry_after(text: &str) -> Option<u64> {
    // Look for patterns like "try again in 7s" or "retry after 12 seconds"
    let text_lower = text.to_lowercase();
    let pos = text_lower
        .find("try again in")
        .or_else(|| text_lower.find("retry"))?;
    let after = &text_lower[pos..];
    for word in after.split_whitespace().skip(1).take(5) {
        let digits: String = word
            .trim_start_matches(|c: char| !c.is_ascii_digit())
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Ok(secs) = digits.parse::<u64>() {
            if secs > 0 && secs < 300 {
                return Some(secs);
            }
        }
    }
    None
}

/// User-facing message for a failed request. Always carries the status code
/// so callers can recognise size rejections.
fn error_message(status: u16, body: &str, retry_count: u32) -> String {
    match status {
        401 => format!(
            "Invalid API key (401). Set {} or run 'securecode setup' to update it.",
            API_KEY_ENV
        ),
        429 => format!(
            "Rate limited (429) after {} retries. Try again in a few minutes.",
            retry_count
        ),
        500..=599 => format!(
            "Groq server error ({}). The service may be temporarily unavailable.",
            status
        ),
        _ => format!("API error {}: {}", status, truncate(body, 200)),
    }
}
