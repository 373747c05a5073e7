//! Configuration loading, validation, and management for PersonaBot.
//!
//! Loads configuration from `~/.personabot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

pub mod persona;

pub use persona::{DEFAULT_PERSONA_TOML, load_persona, parse_persona};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.personabot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Completion provider ("openai", "openrouter", "ollama", or a custom name)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL override for the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Completion model
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per reply (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Persona file; the built-in persona is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_path: Option<PathBuf>,

    /// Retry policy around the completion call
    #[serde(default)]
    pub retry: RetryConfig,

    /// HTTP gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Session store configuration
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Request handling behaviour
    #[serde(default)]
    pub chat: ChatConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("persona_path", &self.persona_path)
            .field("retry", &self.retry)
            .field("gateway", &self.gateway)
            .field("sessions", &self.sessions)
            .field("chat", &self.chat)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failed attempt
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Growth factor between consecutive delays
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound for any single delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    2000
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_max_backoff_ms() -> u64 {
    8000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            multiplier: default_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Path the chat handler is mounted at
    #[serde(default = "default_route")]
    pub route: String,
}

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_route() -> String {
    "/chatbot".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            route: default_route(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// "memory", "file", or "sqlite"
    #[serde(default = "default_session_backend")]
    pub backend: String,

    /// Backend location (file path or SQLite URL); a default under the config dir when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Oldest history entries beyond this count are dropped on save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_stored_turns: Option<usize>,
}

fn default_session_backend() -> String {
    "memory".into()
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            backend: default_session_backend(),
            path: None,
            max_stored_turns: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStrategyKind {
    /// Pick one topic sub-prompt before calling the model
    #[default]
    Preselected,
    /// Hand the whole persona profile to the model and let it choose
    FullContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Reject requests without a `sessionId`
    #[serde(default = "default_true")]
    pub require_session: bool,

    /// Number of earlier user turns fed back to the model
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    #[serde(default)]
    pub strategy: PromptStrategyKind,
}

fn default_history_window() -> usize {
    3
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            require_session: true,
            history_window: default_history_window(),
            strategy: PromptStrategyKind::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.personabot/config.toml).
    ///
    /// Also checks environment variables:
    /// - `PERSONABOT_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `PERSONABOT_MODEL`
    /// - `PERSONABOT_PERSONA`
    /// - `PERSONABOT_SESSION_BACKEND`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("PERSONABOT_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(model) = lookup("PERSONABOT_MODEL") {
            self.model = model;
        }
        if let Some(persona) = lookup("PERSONABOT_PERSONA") {
            self.persona_path = Some(PathBuf::from(persona));
        }
        if let Some(backend) = lookup("PERSONABOT_SESSION_BACKEND") {
            self.sessions.backend = backend;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".personabot")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        if !(self.retry.multiplier >= 1.0 && self.retry.multiplier.is_finite()) {
            return Err(ConfigError::ValidationError(
                "retry.multiplier must be a finite number >= 1.0".into(),
            ));
        }

        if !matches!(self.sessions.backend.as_str(), "memory" | "file" | "sqlite") {
            return Err(ConfigError::ValidationError(format!(
                "unknown session backend '{}' (expected memory, file, or sqlite)",
                self.sessions.backend
            )));
        }

        if let Some(cap) = self.sessions.max_stored_turns {
            if cap < self.chat.history_window {
                return Err(ConfigError::ValidationError(format!(
                    "sessions.max_stored_turns ({cap}) must be at least chat.history_window ({})",
                    self.chat.history_window
                )));
            }
        }

        if !self.gateway.route.starts_with('/') {
            return Err(ConfigError::ValidationError(
                "gateway.route must start with '/'".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            api_url: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            persona_path: None,
            retry: RetryConfig::default(),
            gateway: GatewayConfig::default(),
            sessions: SessionsConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
