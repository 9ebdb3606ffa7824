//! campaignd configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main campaignd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Generation readiness poller settings
    pub poller: PollerConfig,

    /// Assistant memory settings
    pub assistant: AssistantConfig,

    /// HTTP server settings
    pub server: ServerConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that required environment variables are set and that the
    /// numeric limits make sense. Call this early in startup to fail fast.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        if self.assistant.token_budget == 0 {
            return Err(eyre::eyre!("assistant.token-budget must be greater than zero"));
        }
        if self.poller.max_attempts == 0 {
            return Err(eyre::eyre!("poller.max-attempts must be greater than zero"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .campaignd.yml
        let local_config = PathBuf::from(".campaignd.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/campaignd/campaignd.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("campaignd").join("campaignd.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "anthropic" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 1024,
            timeout_ms: 120_000,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        let key = std::env::var(&self.api_key_env)
            .map_err(|_| eyre::eyre!("Environment variable {} is not set", self.api_key_env))?;
        if key.trim().is_empty() {
            return Err(eyre::eyre!("Environment variable {} is empty", self.api_key_env));
        }
        Ok(key)
    }
}

/// Generation readiness poller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Base URL of the generation backend (job-status endpoint lives under it)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Interval between status checks in milliseconds
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// Interval between simulated progress steps in milliseconds
    #[serde(rename = "progress-interval-ms")]
    pub progress_interval_ms: u64,

    /// Maximum number of status checks before giving up
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Delay between both signals agreeing and navigation
    #[serde(rename = "settle-delay-ms")]
    pub settle_delay_ms: u64,

    /// Per-request timeout for a single status check
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    /// Rotation interval for the advisory message
    #[serde(rename = "advisory-interval-ms")]
    pub advisory_interval_ms: u64,

    /// Rotation interval for the tip text
    #[serde(rename = "tip-interval-ms")]
    pub tip_interval_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            poll_interval_ms: 1000,
            progress_interval_ms: 200,
            max_attempts: 100,
            settle_delay_ms: 500,
            request_timeout_ms: 10_000,
            advisory_interval_ms: 3000,
            tip_interval_ms: 5000,
        }
    }
}

impl PollerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn advisory_interval(&self) -> Duration {
        Duration::from_millis(self.advisory_interval_ms)
    }

    pub fn tip_interval(&self) -> Duration {
        Duration::from_millis(self.tip_interval_ms)
    }
}

/// Assistant memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Estimated-token ceiling enforced before each model call
    #[serde(rename = "token-budget")]
    pub token_budget: usize,

    /// Maximum tokens requested for each reply
    #[serde(rename = "reply-max-tokens")]
    pub reply_max_tokens: u32,

    /// Caller-visible bound on a single model call
    #[serde(rename = "reply-timeout-ms")]
    pub reply_timeout_ms: u64,

    /// Sessions idle longer than this are evicted (0 disables eviction)
    #[serde(rename = "session-idle-ttl-secs")]
    pub session_idle_ttl_secs: u64,

    /// System prompt sent with every request
    #[serde(rename = "system-prompt")]
    pub system_prompt: String,

    /// First seeded message of every session
    pub preamble: String,

    /// Second seeded message, acknowledging the preamble
    pub acknowledgement: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            token_budget: 3000,
            reply_max_tokens: 1024,
            reply_timeout_ms: 60_000,
            session_idle_ttl_secs: 3600,
            system_prompt: "You are the campaign assistant of a marketplace that connects brands \
                            with content creators. Answer concisely and stay on the topic of \
                            influencer campaigns, creator collaborations and brand marketing."
                .to_string(),
            preamble: "Context: you are helping a user of a brand and creator marketplace. \
                       Brands publish campaigns, creators apply to them, and both sides negotiate \
                       deliverables, budgets and timelines. Keep answers practical and short."
                .to_string(),
            acknowledgement: "Understood. I will help with campaigns, creator matching and \
                              collaboration questions on the marketplace."
                .to_string(),
        }
    }
}

impl AssistantConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn session_idle_ttl(&self) -> Option<Duration> {
        (self.session_idle_ttl_secs > 0).then(|| Duration::from_secs(self.session_idle_ttl_secs))
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}
