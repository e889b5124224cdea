//! Configuration management for securecode
//!
//! Stores settings in ~/.config/securecode/config.json. The Groq API key lives
//! in the system keychain, with `GROQ_API_KEY` taking precedence.

use crate::budget::{DEFAULT_CHUNK_TOKENS, DEFAULT_CONTEXT_TOKENS};
use crate::llm::models::DEFAULT_MODEL;
use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_KEY_ENV: &str = "GROQ_API_KEY";

const KEYRING_SERVICE: &str = "securecode";
const KEYRING_USERNAME: &str = "groq_api_key";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model id sent to the completion endpoint
    pub model: String,
    pub temperature: f32,
    /// Chunk size for full-code analysis, in tokens
    pub analysis_chunk_tokens: usize,
    /// Combined code + analysis budget for chat turns, in tokens
    pub chat_budget_tokens: usize,
    /// Combined code + analysis budget for rule generation, in tokens
    pub rules_budget_tokens: usize,
    /// Prior chat messages replayed to the model
    pub chat_history_window: usize,
    /// Chunk requests in flight at once (1 = strictly sequential)
    pub analysis_concurrency: usize,
    pub llm_timeout_secs: u64,
    pub llm_max_retries: u32,
    pub semgrep_program: String,
    pub semgrep_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            analysis_chunk_tokens: DEFAULT_CHUNK_TOKENS,
            chat_budget_tokens: DEFAULT_CONTEXT_TOKENS,
            rules_budget_tokens: DEFAULT_CONTEXT_TOKENS,
            chat_history_window: 5,
            analysis_concurrency: 1,
            llm_timeout_secs: 120,
            llm_max_retries: 2,
            semgrep_program: "semgrep".to_string(),
            semgrep_timeout_secs: 600,
        }
    }
}

fn keyring_entry() -> Result<Entry, keyring::Error> {
    Entry::new(KEYRING_SERVICE, KEYRING_USERNAME)
}

fn read_keyring_key() -> Result<Option<String>, keyring::Error> {
    let entry = keyring_entry()?;
    match entry.get_password() {
        Ok(key) => Ok(Some(key)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(err) => Err(err),
    }
}

fn write_keyring_key(key: &str) -> Result<(), keyring::Error> {
    let entry = keyring_entry()?;
    entry.set_password(key)
}

impl Config {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("securecode"))
    }

    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return default
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load from an explicit path. A corrupt file is moved aside and
    /// defaults are returned.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                preserve_corrupt_config(path, &content);
                tracing::warn!(
                    path = %path.display(),
                    "config file was corrupted ({}); a backup was saved and defaults were loaded",
                    err
                );
                Self::default()
            }
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<(), String> {
        let dir = Self::config_dir()
            .ok_or_else(|| "Could not determine config directory".to_string())?;
        self.save_to(&dir.join("config.json"))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(0o700)) {
                    tracing::warn!("failed to set config directory permissions: {}", e);
                }
            }
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        #[cfg(unix)]
        {
            write_config_atomic(path, &content)
                .map_err(|e| format!("Failed to write config: {}", e))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))?;
        }

        Ok(())
    }

    /// Get the Groq API key (from environment or keychain)
    pub fn get_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Some(key);
            }
        }

        match read_keyring_key() {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!("failed to read API key from system keychain: {}", err);
                eprintln!("  Tip: Set the {} environment variable as a workaround.", API_KEY_ENV);
                None
            }
        }
    }

    /// Store the API key in the keychain and verify it reads back.
    pub fn set_api_key(&self, key: &str) -> Result<(), String> {
        if let Err(write_err) = write_keyring_key(key) {
            return Err(format!(
                "Failed to store API key in system keychain: {}. \
                 You can set the {} environment variable instead.",
                write_err, API_KEY_ENV
            ));
        }

        match read_keyring_key() {
            Ok(Some(stored_key)) if stored_key == key => Ok(()),
            Ok(_) => Err(format!(
                "API key verification failed: key was not persisted to keychain. \
                 You can set the {} environment variable instead.",
                API_KEY_ENV
            )),
            Err(read_err) => Err(format!(
                "API key verification failed: couldn't read back from keychain ({}). \
                 You can set the {} environment variable instead.",
                read_err, API_KEY_ENV
            )),
        }
    }

    /// Validate API key format (Groq keys start with gsk_)
    pub fn validate_api_key_format(key: &str) -> bool {
        key.starts_with("gsk_")
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn semgrep_timeout(&self) -> Duration {
        Duration::from_secs(self.semgrep_timeout_secs)
    }

    /// Get the config file location for display
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/securecode/config.json".to_string())
    }
}

/// Interactive prompt to set up API key
pub fn setup_api_key_interactive() -> Result<String, String> {
    use std::io;

    println!();
    println!("  ┌─────────────────────────────────────────────────────────┐");
    println!("  │  GROQ SETUP                                             │");
    println!("  └─────────────────────────────────────────────────────────┘");
    println!();
    println!("  securecode uses Groq-hosted models for security analysis.");
    println!();
    println!("  1. Create an API key at: https://console.groq.com/keys");
    println!("  2. Paste it below (saved in your system keychain)");
    println!();
    print!("  API Key: ");
    io::stdout().flush().map_err(|e| e.to_string())?;

    let mut key = String::new();
    io::stdin().read_line(&mut key).map_err(|e| e.to_string())?;
    let key = key.trim().to_string();

    if key.is_empty() {
        return Err("No API key provided".to_string());
    }

    if !Config::validate_api_key_format(&key) {
        println!();
        println!("  Warning: Key doesn't look like a Groq key (should start with gsk_)");
        println!("     Saving anyway...");
    }

    Config::load().set_api_key(&key)?;

    println!();
    println!("  + API key saved to the system keychain");
    println!();

    Ok(key)
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

#[cfg(unix)]
fn write_config_atomic(path: &Path, content: &str) -> Result<(), String> {
    use std::fs::OpenOptions;
    use std::os::unix::fs::PermissionsExt;

    let tmp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)
        .map_err(|e| e.to_string())?;

    if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
        tracing::warn!("failed to set temp config file permissions: {}", e);
    }

    file.write_all(content.as_bytes())
        .map_err(|e| e.to_string())?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.analysis_chunk_tokens, 2000);
        assert_eq!(config.chat_budget_tokens, 1500);
        assert_eq!(config.rules_budget_tokens, 1500);
        assert_eq!(config.chat_history_window, 5);
        assert_eq!(config.analysis_concurrency, 1);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"temperature": 0.4}"#).unwrap();
        assert_eq!(config.temperature, 0.4);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.semgrep_program, "semgrep");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            model: "llama-3.3-70b-versatile".to_string(),
            analysis_concurrency: 3,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded.model, "llama-3.3-70b-versatile");
        assert_eq!(loaded.analysis_concurrency, 3);
    }

    #[test]
    fn test_corrupt_config_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded.model, DEFAULT_MODEL);
        assert!(!path.exists());
        assert!(dir.path().join("config.json.corrupt").exists());
    }

    #[test]
    fn test_missing_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.json"));
        assert_eq!(loaded.chat_history_window, 5);
    }

    #[test]
    fn test_validate_api_key_format() {
        assert!(Config::validate_api_key_format("gsk_abc123"));
        assert!(!Config::validate_api_key_format("sk-abc123"));
    }
}
