//! Configuration management for Parley.
//!
//! Configuration lives in a single JSON file at `~/.parley/config.json`.
//! A missing file means defaults.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `PARLEY_API_KEY` / `GROQ_API_KEY` → secrets.api_key
//! - `PARLEY_BASE_URL` → completion.base_url
//! - `PARLEY_MODEL` → completion.model
//! - `PARLEY_STREAM` → completion.stream
//! - `PARLEY_LOG_LEVEL` → observability.log_level
//! - `PARLEY_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default OpenAI-compatible endpoint (Groq).
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai";

/// Default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "llama3-70b-8192";

/// Default transcription model.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-large-v3";

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".parley"),
        |dirs| dirs.home_dir().join(".parley"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Completion
// ============================================================================

/// Completion service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Base URL of the OpenAI-compatible API (without `/v1`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Chat model id
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Stream reply fragments as they are generated
    #[serde(default = "default_true")]
    pub stream: bool,

    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_chat_model(),
            stream: true,
            timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

// ============================================================================
// Transcription
// ============================================================================

/// Transcription service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Provider name: groq, openai, compatible, local
    #[serde(default = "default_stt_provider")]
    pub provider: String,

    /// Base URL override; required for `compatible` and `local`
    #[serde(default)]
    pub base_url: Option<String>,

    /// Transcription model id
    #[serde(default = "default_transcription_model")]
    pub model: String,

    /// Optional prompt that guides the transcription style or vocabulary
    #[serde(default)]
    pub prompt_hint: Option<String>,

    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            provider: default_stt_provider(),
            base_url: None,
            model: default_transcription_model(),
            prompt_hint: None,
            timeout_secs: default_request_timeout(),
        }
    }
}

// ============================================================================
// Secrets
// ============================================================================

/// Credentials. The API key is an opaque bearer token shared by both services.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct SecretsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ============================================================================
// Observability
// ============================================================================

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Base log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format: "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub transcription: TranscriptionConfig,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("PARLEY_API_KEY").or_else(|| lookup("GROQ_API_KEY")) {
            if !key.is_empty() {
                self.secrets.api_key = Some(key);
            }
        }

        if let Some(url) = lookup("PARLEY_BASE_URL") {
            self.completion.base_url = url;
        }
        if let Some(model) = lookup("PARLEY_MODEL") {
            self.completion.model = model;
        }
        if let Some(stream) = lookup("PARLEY_STREAM") {
            match stream.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.completion.stream = true,
                "0" | "false" | "no" | "off" => self.completion.stream = false,
                other => tracing::warn!(value = %other, "Ignoring invalid PARLEY_STREAM"),
            }
        }

        if let Some(level) = lookup("PARLEY_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("PARLEY_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    /// Save configuration to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).with_context(|| {
                    format!("Failed to create config directory {}", dir.display())
                })?;
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// The configured API key, if any non-empty one is set.
    pub fn api_key(&self) -> Option<&str> {
        self.secrets.api_key.as_deref().filter(|k| !k.is_empty())
    }

    /// A copy safe to print: the API key is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(key) = copy.secrets.api_key.as_mut() {
            *key = mask_secret(key);
        }
        copy
    }
}

/// Mask all but the last four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.into()
}

fn default_transcription_model() -> String {
    DEFAULT_TRANSCRIPTION_MODEL.into()
}

fn default_stt_provider() -> String {
    "groq".into()
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    120
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "warn".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_original_app() {
        let config = Config::default();
        assert_eq!(config.completion.base_url, "https://api.groq.com/openai");
        assert_eq!(config.completion.model, "llama3-70b-8192");
        assert!(config.completion.stream);
        assert_eq!(config.completion.timeout_secs, 120);
        assert_eq!(config.transcription.model, "whisper-large-v3");
        assert_eq!(config.transcription.provider, "groq");
        assert!(config.api_key().is_none());
    }

    #[test]
    fn empty_json_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.completion.model, DEFAULT_CHAT_MODEL);
        assert_eq!(config.observability.log_format, "pretty");
    }

    #[test]
    fn partial_sections_fill_defaults() {
        let json = r#"{"completion": {"model": "mixtral-8x7b-32768", "stream": false}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.completion.model, "mixtral-8x7b-32768");
        assert!(!config.completion.stream);
        assert_eq!(config.completion.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("GROQ_API_KEY", "gsk_test"),
            ("PARLEY_MODEL", "gemma-7b-it"),
            ("PARLEY_STREAM", "off"),
            ("PARLEY_LOG_LEVEL", "debug"),
        ]));
        assert_eq!(config.api_key(), Some("gsk_test"));
        assert_eq!(config.completion.model, "gemma-7b-it");
        assert!(!config.completion.stream);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn parley_key_wins_over_groq_key() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("GROQ_API_KEY", "gsk_groq"),
            ("PARLEY_API_KEY", "gsk_parley"),
        ]));
        assert_eq!(config.api_key(), Some("gsk_parley"));
    }

    #[test]
    fn invalid_stream_value_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("PARLEY_STREAM", "maybe")]));
        assert!(config.completion.stream);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.completion.model = "llama3-8b-8192".into();
        config.transcription.prompt_hint = Some("Rust, Cargo".into());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.completion.model, "llama3-8b-8192");
        assert_eq!(loaded.transcription.prompt_hint.as_deref(), Some("Rust, Cargo"));
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn debug_output_hides_api_key() {
        let mut config = Config::default();
        config.secrets.api_key = Some("gsk_supersecretvalue".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("supersecret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn redacted_masks_key() {
        let mut config = Config::default();
        config.secrets.api_key = Some("gsk_1234567890abcd".into());
        let redacted = config.redacted();
        assert_eq!(redacted.secrets.api_key.as_deref(), Some("****abcd"));
        assert_eq!(mask_secret("short"), "****");
    }
}
