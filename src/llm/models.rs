use serde::Deserialize;

/// Default model id
pub const DEFAULT_MODEL: &str = "deepseek-r1-distill-llama-70b";

/// Model ids known to work with the Groq endpoint
pub const KNOWN_MODELS: &[&str] = &[
    "deepseek-r1-distill-llama-70b",
    "llama3-70b-8192",
    "llama-3.1-8b-instant",
    "llama-3.2-11b-vision-preview",
    "llama-3.2-1b-preview",
    "llama-3.2-3b-preview",
    "llama-3.3-70b-specdec",
    "llama-3.3-70b-versatile",
    "qwen-2.5-32b",
    "qwen-2.5-coder-32b",
    "mistral-saba-24b",
];

pub fn is_known_model(id: &str) -> bool {
    KNOWN_MODELS.contains(&id)
}

/// API usage information reported with each completion
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}
