pub mod client;
pub mod models;
pub mod prompts;
pub mod security;

pub use client::{Completion, CompletionRequest, GroqClient};
pub use models::{Usage, DEFAULT_MODEL, KNOWN_MODELS};
pub use security::{analyze_security, security_chat, suggest_rules, AnalysisOptions};
