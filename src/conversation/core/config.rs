//! Configuration for the scout agent.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::conversation::core::errors::{ConversationError, ConversationResult};
use crate::conversation::prompts::AgentMode;

/// Default port for the HTTP server.
pub const DEFAULT_PORT: u16 = 3000;

/// Model used for every purpose when running against a local Ollama server.
pub const DEFAULT_OLLAMA_MODEL: &str = "mistral:7b-instruct-q8_0";

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScoutConfig {
    /// Interview persona settings.
    pub agent: AgentConfig,
    /// Language model settings.
    pub model: ModelConfig,
    /// Conversation store settings.
    pub storage: StorageConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Live session limits.
    pub sessions: SessionConfig,
}

impl ScoutConfig {
    /// Build a configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if a variable holds an unparsable value.
    pub fn from_env() -> ConversationResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Unset variables keep their defaults; the result is not validated.
    ///
    /// # Errors
    /// Returns an error if a variable holds an unparsable value.
    pub fn from_lookup<F>(lookup: F) -> ConversationResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(flag) = var("TEST_MODE") {
            config.agent.mode = if flag.eq_ignore_ascii_case("true") {
                AgentMode::Abbreviated
            } else {
                AgentMode::Standard
            };
        }

        if let Some(provider) = var("SCOUT_LLM_PROVIDER") {
            config.model.provider = provider.parse()?;
        }
        config.model.api_key = var("OPENAI_API_KEY");
        config.model.base_url = match config.model.provider {
            LlmProvider::OpenAi => var("OPENAI_BASE_URL"),
            LlmProvider::Ollama => {
                let model =
                    var("SCOUT_OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string());
                config.model.chat.model.clone_from(&model);
                config.model.summary.model.clone_from(&model);
                config.model.evaluation.model = model;
                var("SCOUT_OLLAMA_URL")
            }
        };

        config.storage.supabase_url = var("SUPABASE_URL");
        config.storage.supabase_key = var("SUPABASE_KEY");
        if let Some(path) = var("SCOUT_SQLITE_PATH") {
            config.storage.sqlite_path = PathBuf::from(path);
        }

        if let Some(port) = var("SCOUT_PORT") {
            config.server.port = port.parse().map_err(|_| {
                ConversationError::InvalidConfig(format!("SCOUT_PORT is not a port: {port}"))
            })?;
        }
        if let Some(dir) = var("SCOUT_STATIC_DIR") {
            config.server.static_dir = PathBuf::from(dir);
        }

        if let Some(max) = var("SCOUT_MAX_SESSIONS") {
            config.sessions.max_sessions = parse_number("SCOUT_MAX_SESSIONS", &max)?;
        }
        if let Some(secs) = var("SCOUT_SESSION_IDLE_SECS") {
            config.sessions.idle_timeout_secs = parse_number("SCOUT_SESSION_IDLE_SECS", &secs)?;
        }

        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ConversationResult<()> {
        if matches!(self.model.provider, LlmProvider::OpenAi) && self.model.api_key.is_none() {
            return Err(ConversationError::InvalidConfig(
                "OPENAI_API_KEY is required for the openai provider".to_string(),
            ));
        }

        if self.sessions.max_sessions == 0 {
            return Err(ConversationError::InvalidConfig(
                "sessions.max_sessions must be > 0".to_string(),
            ));
        }
        if self.sessions.idle_timeout_secs == 0 || self.sessions.cleanup_interval_secs == 0 {
            return Err(ConversationError::InvalidConfig(
                "sessions.idle_timeout_secs and sessions.cleanup_interval_secs must be > 0"
                    .to_string(),
            ));
        }

        for (name, params) in [
            ("chat", &self.model.chat),
            ("summary", &self.model.summary),
            ("evaluation", &self.model.evaluation),
        ] {
            params.validate(name)?;
        }

        if let Some(base_url) = &self.model.base_url {
            Url::parse(base_url)?;
        }

        if let Some(supabase_url) = &self.storage.supabase_url {
            Url::parse(supabase_url)?;
        }

        if self.storage.table.is_empty()
            || !self
                .storage
                .table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConversationError::InvalidConfig(format!(
                "storage.table must be a plain identifier, got {:?}",
                self.storage.table
            )));
        }

        Ok(())
    }
}

/// Interview persona settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Standard or abbreviated interview.
    pub mode: AgentMode,
    /// Display title.
    pub title: String,
    /// Display tagline.
    pub description: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            mode: AgentMode::Standard,
            title: "The Unfair Advantage Scout".to_string(),
            description: "Expert mentor and interviewer for aspiring startup founders".to_string(),
        }
    }
}

/// Which model backend to talk to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Hosted OpenAI-compatible chat completions API.
    #[default]
    OpenAi,
    /// Local Ollama server.
    Ollama,
}

impl std::str::FromStr for LlmProvider {
    type Err = ConversationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConversationError::InvalidConfig(format!(
                "unknown llm provider: {other}"
            ))),
        }
    }
}

/// Sampling parameters for one kind of generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Model name.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Output token budget.
    pub max_tokens: u64,
    /// Nucleus sampling.
    pub top_p: f64,
    /// Presence penalty.
    pub presence_penalty: f64,
    /// Frequency penalty.
    pub frequency_penalty: f64,
}

impl GenerationParams {
    fn validate(&self, name: &str) -> ConversationResult<()> {
        if self.model.trim().is_empty() {
            return Err(ConversationError::InvalidConfig(format!(
                "model.{name}.model must not be empty"
            )));
        }
        if self.max_tokens == 0 {
            return Err(ConversationError::InvalidConfig(format!(
                "model.{name}.max_tokens must be > 0"
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConversationError::InvalidConfig(format!(
                "model.{name}.temperature must be within 0..=2"
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ConversationError::InvalidConfig(format!(
                "model.{name}.top_p must be within 0..=1"
            )));
        }
        Ok(())
    }
}

/// Language model settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Backend to use.
    pub provider: LlmProvider,
    /// API key for the hosted provider.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Optional custom base URL.
    pub base_url: Option<String>,
    /// Conversational replies.
    pub chat: GenerationParams,
    /// End-of-conversation summary.
    pub summary: GenerationParams,
    /// End-of-conversation evaluation.
    pub evaluation: GenerationParams,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            api_key: None,
            base_url: None,
            chat: GenerationParams {
                model: "gpt-4o-mini".to_string(),
                temperature: 0.6,
                max_tokens: 700,
                top_p: 1.0,
                presence_penalty: 0.0,
                frequency_penalty: 0.2,
            },
            summary: GenerationParams {
                model: "gpt-4o-mini".to_string(),
                temperature: 0.25,
                max_tokens: 1000,
                top_p: 1.0,
                presence_penalty: 0.0,
                frequency_penalty: 0.2,
            },
            evaluation: GenerationParams {
                model: "gpt-4o".to_string(),
                temperature: 0.4,
                max_tokens: 1400,
                top_p: 1.0,
                presence_penalty: 0.0,
                frequency_penalty: 0.3,
            },
        }
    }
}

/// Conversation store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Supabase project URL.
    pub supabase_url: Option<String>,
    /// Supabase service key.
    #[serde(skip_serializing)]
    pub supabase_key: Option<String>,
    /// Table holding conversation records.
    pub table: String,
    /// Local `SQLite` fallback path.
    pub sqlite_path: PathBuf,
}

impl StorageConfig {
    /// Supabase credentials, when both halves are configured.
    #[must_use]
    pub fn supabase_credentials(&self) -> Option<(&str, &str)> {
        match (&self.supabase_url, &self.supabase_key) {
            (Some(url), Some(key)) => Some((url.as_str(), key.as_str())),
            _ => None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_key: None,
            table: "conversations".to_string(),
            sqlite_path: PathBuf::from("conversations.sqlite"),
        }
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
    /// Directory with the chat UI.
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            static_dir: PathBuf::from("static"),
        }
    }
}

/// Limits on sessions held in memory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Live sessions allowed at once.
    pub max_sessions: usize,
    /// Idle time after which any session is dropped.
    pub idle_timeout_secs: u64,
    /// Idle time after which a saved session is dropped.
    pub saved_grace_secs: u64,
    /// Period of the expiry sweep.
    pub cleanup_interval_secs: u64,
}

impl SessionConfig {
    /// Idle timeout as a duration.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Saved-session grace period as a duration.
    #[must_use]
    pub const fn saved_grace(&self) -> Duration {
        Duration::from_secs(self.saved_grace_secs)
    }

    /// Sweep period as a duration.
    #[must_use]
    pub const fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: 1000,
            idle_timeout_secs: 3600,
            saved_grace_secs: 600,
            cleanup_interval_secs: 300,
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> ConversationResult<T> {
    value.trim().parse().map_err(|_| {
        ConversationError::InvalidConfig(format!("{key} is not a number: {value}"))
    })
}
