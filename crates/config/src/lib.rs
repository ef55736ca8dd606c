//! Configuration loading, validation, and management for Banterbot.
//!
//! Loads configuration from `~/.banterbot/config.toml` with environment
//! variable overrides (a `.env` file in the working directory is honoured).
//! Validates all settings at startup; missing credentials are fatal.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the Slack bot token (`xoxb-...`).
pub const ENV_SLACK_BOT_TOKEN: &str = "SLACK_BOT_TOKEN";
/// Environment variable holding the Slack app-level token (`xapp-...`).
pub const ENV_SLACK_APP_TOKEN: &str = "SLACK_APP_TOKEN";
/// Environment variable holding the Gemini API key.
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
/// Environment variable overriding the Gemini model.
pub const ENV_MODEL: &str = "BANTERBOT_MODEL";

/// Upper bound for `window_secs` and `cooldown_secs` (one day).
pub const MAX_DURATION_SECS: u64 = 86_400;

/// The root configuration structure.
///
/// Maps directly to `~/.banterbot/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Slack connection settings
    #[serde(default)]
    pub slack: SlackConfig,

    /// Gemini generation backend settings
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Rate gating and prompt settings
    #[serde(default)]
    pub responder: ResponderConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token (xoxb-...), used for the Web API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// App-level token (xapp-...), used to open Socket Mode connections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_token: Option<String>,

    /// Override for the Web API base URL (tests, proxies).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("app_token", &redact(&self.app_token))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// Override for the API base URL (tests, proxies).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_temperature() -> f32 {
    0.9
}
fn default_max_output_tokens() -> u32 {
    256
}
fn default_timeout_secs() -> u64 {
    60
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            api_url: None,
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Rate gating constants and prompt template.
///
/// Immutable once loaded; handed to every responder component at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponderConfig {
    /// Trailing window over which message arrivals are counted
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Messages within the window required to trigger a reply
    #[serde(default = "default_threshold_messages")]
    pub threshold_messages: usize,

    /// Minimum time between two replies in the same channel
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// History messages fetched as reply context
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: usize,

    /// Per-channel worker queue depth
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Persona/instruction block placed at the top of every prompt
    #[serde(default = "default_persona")]
    pub persona: String,

    /// Line introducing the conversation context
    #[serde(default = "default_context_header")]
    pub context_header: String,

    /// Final instruction after the context
    #[serde(default = "default_directive")]
    pub directive: String,
}

fn default_window_secs() -> u64 {
    120
}
fn default_threshold_messages() -> usize {
    3
}
fn default_cooldown_secs() -> u64 {
    120
}
fn default_max_context_messages() -> usize {
    10
}
fn default_queue_capacity() -> usize {
    64
}
fn default_persona() -> String {
    concat!(
        "You are an extremely roasty and chaotic bot in a private channel between friends. ",
        "You may be aggressively joking, sarcastic and over the top, but you MUST follow these rules:\n",
        "- No racist, sexist, homophobic or otherwise hateful expressions.\n",
        "- No politics, religion or real trauma.\n",
        "- No threats or calls to violence.\n",
        "- At most 50 words in the reply.\n",
        "Write in Swedish and make it obvious that this is humour between friends."
    )
    .into()
}
fn default_context_header() -> String {
    "Here are the latest messages in the channel:".into()
}
fn default_directive() -> String {
    "Reply with ONE short, roasty and chaotic line. No explanation, just the message itself."
        .into()
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            threshold_messages: default_threshold_messages(),
            cooldown_secs: default_cooldown_secs(),
            max_context_messages: default_max_context_messages(),
            queue_capacity: default_queue_capacity(),
            persona: default_persona(),
            context_header: default_context_header(),
            directive: default_directive(),
        }
    }
}

/// The three secrets required before the bot may start.
#[derive(Clone)]
pub struct Credentials {
    pub slack_bot_token: String,
    pub slack_app_token: String,
    pub gemini_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("slack_bot_token", &"[REDACTED]")
            .field("slack_app_token", &"[REDACTED]")
            .field("gemini_api_key", &"[REDACTED]")
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.banterbot/config.toml).
    ///
    /// A `.env` file in the working directory is loaded first, then these
    /// environment variables override the file:
    /// - `SLACK_BOT_TOKEN`, `SLACK_APP_TOKEN`, `GEMINI_API_KEY`
    /// - `BANTERBOT_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }

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

    /// Apply environment overrides. Non-empty values win over the file.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get(ENV_SLACK_BOT_TOKEN) {
            self.slack.bot_token = Some(token);
        }
        if let Some(token) = get(ENV_SLACK_APP_TOKEN) {
            self.slack.app_token = Some(token);
        }
        if let Some(key) = get(ENV_GEMINI_API_KEY) {
            self.gemini.api_key = Some(key);
        }
        if let Some(model) = get(ENV_MODEL) {
            self.gemini.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".banterbot")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.responder;
        if r.window_secs == 0 {
            return Err(ConfigError::ValidationError(
                "responder.window_secs must be > 0".into(),
            ));
        }
        if r.cooldown_secs == 0 {
            return Err(ConfigError::ValidationError(
                "responder.cooldown_secs must be > 0".into(),
            ));
        }
        if r.window_secs > MAX_DURATION_SECS || r.cooldown_secs > MAX_DURATION_SECS {
            return Err(ConfigError::ValidationError(format!(
                "responder.window_secs and responder.cooldown_secs must be <= {MAX_DURATION_SECS}"
            )));
        }
        if r.threshold_messages == 0 {
            return Err(ConfigError::ValidationError(
                "responder.threshold_messages must be > 0".into(),
            ));
        }
        if r.max_context_messages == 0 {
            return Err(ConfigError::ValidationError(
                "responder.max_context_messages must be > 0".into(),
            ));
        }
        if r.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "responder.queue_capacity must be > 0".into(),
            ));
        }
        if self.gemini.temperature < 0.0 || self.gemini.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "gemini.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        Ok(())
    }

    /// Collect the required secrets, naming every one that is missing.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        fn present(v: &Option<String>) -> Option<String> {
            v.as_ref().filter(|s| !s.trim().is_empty()).cloned()
        }

        let bot = present(&self.slack.bot_token);
        let app = present(&self.slack.app_token);
        let key = present(&self.gemini.api_key);

        match (bot, app, key) {
            (Some(slack_bot_token), Some(slack_app_token), Some(gemini_api_key)) => {
                Ok(Credentials {
                    slack_bot_token,
                    slack_app_token,
                    gemini_api_key,
                })
            }
            (bot, app, key) => {
                let mut missing = Vec::new();
                if bot.is_none() {
                    missing.push(ENV_SLACK_BOT_TOKEN.to_string());
                }
                if app.is_none() {
                    missing.push(ENV_SLACK_APP_TOKEN.to_string());
                }
                if key.is_none() {
                    missing.push(ENV_GEMINI_API_KEY.to_string());
                }
                Err(ConfigError::MissingCredentials(missing))
            }
        }
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
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

    #[error("Missing required credentials: {}", .0.join(", "))]
    MissingCredentials(Vec<String>),
}
