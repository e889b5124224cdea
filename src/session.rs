//! In-memory state carried between requests of one run
//!
//! Nothing here is written to disk. The session is passed explicitly to every
//! call that needs prior code, analysis or chat turns.

use crate::scanner::ScanReport;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Assistant,
}

impl Role {
    /// Role name on the chat-completions wire
    pub fn api_name(&self) -> &'static str {
        match self {
            Role::Human => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    /// Code under discussion
    pub code: String,
    /// Latest model analysis, or vulnerabilities entered by hand
    pub analysis: String,
    pub scan: Option<ScanReport>,
    pub history: Vec<ChatMessage>,
    pub current_file: Option<PathBuf>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            code: String::new(),
            analysis: String::new(),
            scan: None,
            history: Vec::new(),
            current_file: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_analysis(mut self, analysis: impl Into<String>) -> Self {
        self.analysis = analysis.into();
        self
    }

    pub fn record(&mut self, message: ChatMessage) {
        self.history.push(message);
    }

    /// The last `n` messages, oldest first.
    pub fn recent_history(&self, n: usize) -> &[ChatMessage] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }

    /// Forget the conversation but keep the code, analysis and findings it
    /// was about. Returns how many messages were dropped.
    pub fn clear_history(&mut self) -> usize {
        let dropped = self.history.len();
        self.history.clear();
        dropped
    }

    /// Name shown for the code under discussion
    pub fn subject(&self) -> String {
        match &self.current_file {
            Some(path) => path.display().to_string(),
            None => "<stdin>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_history_window() {
        let mut session = Session::new();
        for i in 0..8 {
            session.record(ChatMessage::human(format!("q{}", i)));
        }
        let recent = session.recent_history(5);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].content, "q3");
        assert_eq!(recent[4].content, "q7");
    }

    #[test]
    fn test_recent_history_shorter_than_window() {
        let mut session = Session::new();
        session.record(ChatMessage::human("only"));
        assert_eq!(session.recent_history(5).len(), 1);
        assert!(session.recent_history(0).is_empty());
    }

    #[test]
    fn test_clear_history_keeps_context() {
        let mut session = Session::new().with_code("x").with_analysis("y");
        session.scan = Some(ScanReport::default());
        session.record(ChatMessage::human("hi"));
        session.record(ChatMessage::assistant("hello"));
        let id = session.id;

        assert_eq!(session.clear_history(), 2);
        assert!(session.history.is_empty());
        assert_eq!(session.id, id);
        assert_eq!(session.code, "x");
        assert_eq!(session.analysis, "y");
        assert!(session.scan.is_some());
        assert_eq!(session.clear_history(), 0);
    }

    #[test]
    fn test_subject_names_file_or_stdin() {
        let mut session = Session::new();
        assert_eq!(session.subject(), "<stdin>");
        session.current_file = Some(PathBuf::from("src/app.py"));
        assert_eq!(session.subject(), "src/app.py");
    }

    #[test]
    fn test_role_api_names() {
        assert_eq!(Role::Human.api_name(), "user");
        assert_eq!(Role::Assistant.api_name(), "assistant");
    }
}
