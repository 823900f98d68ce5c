// ABOUTME: Configuration parsing from TOML file with environment variable overrides.
// ABOUTME: Validates required fields and provides sensible defaults for optional ones.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::session::ReconnectPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub transcript: TranscriptConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Required. The only secret this process needs.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
    /// Local models in fallback preference order
    #[serde(default = "default_ollama_models")]
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_addr")]
    pub addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_auth_dir")]
    pub auth_dir: String,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    /// 1 = fixed delay (stock behavior); >1 enables exponential growth
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,
    #[serde(default = "default_max_reconnect_delay_secs")]
    pub max_reconnect_delay_secs: u64,
    /// 0 = retry forever
    #[serde(default)]
    pub max_reconnect_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default = "default_trigger_word")]
    pub word: String,
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_ollama_base_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_ollama_models() -> Vec<String> {
    vec!["mistral:latest".to_string(), "llama3.2:3b".to_string()]
}

fn default_gateway_addr() -> String {
    "127.0.0.1:3020".to_string()
}

fn default_auth_dir() -> String {
    "./auth".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    3
}

fn default_backoff_multiplier() -> u32 {
    1
}

fn default_max_reconnect_delay_secs() -> u64 {
    60
}

fn default_db_path() -> String {
    "./yatta.db".to_string()
}

fn default_trigger_word() -> String {
    "halo".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            models: default_ollama_models(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            addr: default_gateway_addr(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auth_dir: default_auth_dir(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            backoff_multiplier: default_backoff_multiplier(),
            max_reconnect_delay_secs: default_max_reconnect_delay_secs(),
            max_reconnect_attempts: 0,
        }
    }
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            word: default_trigger_word(),
        }
    }
}

impl Config {
    /// Load configuration from `config.toml` in the working directory,
    /// with environment variable overrides.
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            Config::default()
        };

        // Override with environment variables if present
        if let Ok(val) = std::env::var("GEMINI_API_KEY") {
            config.gemini.api_key = val;
        }
        if let Ok(val) = std::env::var("GEMINI_MODEL") {
            config.gemini.model = val;
        }
        if let Ok(val) = std::env::var("OLLAMA_BASE_URL") {
            config.ollama.base_url = val;
        }
        if let Ok(val) = std::env::var("OLLAMA_MODELS") {
            config.ollama.models = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(val) = std::env::var("GATEWAY_ADDR") {
            config.gateway.addr = val;
        }
        if let Ok(val) = std::env::var("AUTH_DIR") {
            config.session.auth_dir = val;
        }
        if let Ok(val) = std::env::var("RECONNECT_DELAY_SECS") {
            config.session.reconnect_delay_secs = val.parse().with_context(|| {
                format!("RECONNECT_DELAY_SECS must be a number of seconds, got: {val}")
            })?;
        }
        if let Ok(val) = std::env::var("TRANSCRIPT_DB_PATH") {
            config.transcript.db_path = val;
        }
        if let Ok(val) = std::env::var("TRIGGER_WORD") {
            config.trigger.word = val;
        }

        // Validate required fields
        if config.gemini.model.is_empty() {
            config.gemini.model = default_gemini_model();
        }
        if config.gemini.api_key.trim().is_empty() {
            anyhow::bail!(
                "gemini.api_key is required (set in config.toml or GEMINI_API_KEY env var)"
            );
        }
        config.ollama.models.retain(|m| !m.trim().is_empty());
        if config.trigger.word.trim().is_empty() {
            anyhow::bail!("trigger.word must not be empty (set in config.toml or TRIGGER_WORD env var)");
        }

        Ok(config)
    }

    /// Reconnect policy derived from the session section.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        let initial = Duration::from_secs(self.session.reconnect_delay_secs.max(1));
        ReconnectPolicy {
            initial_delay: initial,
            max_delay: Duration::from_secs(self.session.max_reconnect_delay_secs).max(initial),
            multiplier: self.session.backoff_multiplier.max(1),
            max_attempts: self.session.max_reconnect_attempts,
        }
    }
}
