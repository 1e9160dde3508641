//! Centralized server configuration.
//!
//! Loaded via the `config` crate from environment variables, with `__`
//! separating nested keys (`SENTRY__API_TOKEN` sets `sentry.api_token`).

use feedback_relay_ai::LlmBackendConfig;
use feedback_relay_conversation::SessionStoreConfig;
use config::ConfigError;
use feedback_relay_integration::SentryConfig;
use serde::Deserialize;
use std::time::Duration;

/// Server configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ListenConfig,

    #[serde(default)]
    pub http: HttpConfig,

    /// Issue tracker access. Token and slugs are required.
    pub sentry: SentryConfig,

    /// Chat model. All three fields are needed for model-backed replies.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Classification model.
    #[serde(default)]
    pub tagger: TaggerConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub sessions: SessionsConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Listener settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Default: "0.0.0.0:8000"
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Outbound HTTP settings shared by every client.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout for external calls.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout_seconds() -> u64 {
    20
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

impl HttpConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Chat model settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl LlmConfig {
    /// Returns a backend config if every field is set and non-empty.
    #[must_use]
    pub fn backend_config(&self) -> Option<LlmBackendConfig> {
        let api_key = non_empty(self.api_key.as_deref())?;
        let base_url = non_empty(self.base_url.as_deref())?;
        let model = non_empty(self.model.as_deref())?;
        Some(LlmBackendConfig::openai_compatible(base_url, model, api_key))
    }
}

/// Classification model settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TaggerConfig {
    /// Without a key every event gets the fallback classification.
    pub api_key: Option<String>,

    /// Default: "https://api.openai.com/v1"
    #[serde(default = "default_tagger_base_url")]
    pub base_url: String,

    /// Default: "gpt-3.5-turbo"
    #[serde(default = "default_tagger_model")]
    pub model: String,
}

fn default_tagger_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_tagger_model() -> String {
    "gpt-3.5-turbo".to_string()
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_tagger_base_url(),
            model: default_tagger_model(),
        }
    }
}

impl TaggerConfig {
    /// Returns a backend config if an API key is set.
    #[must_use]
    pub fn backend_config(&self) -> Option<LlmBackendConfig> {
        let api_key = non_empty(self.api_key.as_deref())?;
        Some(LlmBackendConfig::openai_compatible(
            self.base_url.clone(),
            self.model.clone(),
            api_key,
        ))
    }
}

/// Triage schedule settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Whether to run triage on a timer.
    #[serde(default = "default_pipeline_enabled")]
    pub enabled: bool,

    #[serde(default = "default_pipeline_interval_seconds")]
    pub interval_seconds: u64,

    /// Recency window for events.
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,
}

fn default_pipeline_enabled() -> bool {
    true
}

fn default_pipeline_interval_seconds() -> u64 {
    300
}

fn default_window_minutes() -> i64 {
    5
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: default_pipeline_enabled(),
            interval_seconds: default_pipeline_interval_seconds(),
            window_minutes: default_window_minutes(),
        }
    }
}

impl PipelineConfig {
    /// Returns the recency window.
    ///
    /// # Errors
    ///
    /// Returns an error if the window is negative or too large to represent.
    pub fn window(&self) -> Result<chrono::Duration, ConfigError> {
        minutes("pipeline.window_minutes", self.window_minutes)
    }
}

/// Conversation session limits.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Idle expiry.
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,

    /// Interval between expired-session sweeps, in seconds.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

fn default_max_sessions() -> usize {
    10_000
}

fn default_ttl_minutes() -> i64 {
    60
}

fn default_sweep_interval_seconds() -> u64 {
    300
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            ttl_minutes: default_ttl_minutes(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

impl SessionsConfig {
    /// Returns the session store limits.
    ///
    /// # Errors
    ///
    /// Returns an error if the TTL is not positive or too large to represent.
    pub fn store_config(&self) -> Result<SessionStoreConfig, ConfigError> {
        if self.ttl_minutes <= 0 {
            return Err(ConfigError::Message(format!(
                "sessions.ttl_minutes must be positive, got {}",
                self.ttl_minutes
            )));
        }
        Ok(SessionStoreConfig {
            max_sessions: self.max_sessions,
            ttl: minutes("sessions.ttl_minutes", self.ttl_minutes)?,
        })
    }
}

fn minutes(key: &str, value: i64) -> Result<chrono::Duration, ConfigError> {
    if value < 0 {
        return Err(ConfigError::Message(format!(
            "{key} must not be negative, got {value}"
        )));
    }
    chrono::Duration::try_minutes(value)
        .ok_or_else(|| ConfigError::Message(format!("{key} is out of range: {value}")))
}

/// Alert channel settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    /// Slack incoming webhook; alerts go to the log when unset.
    pub slack_webhook_url: Option<String>,
}

impl NotifyConfig {
    #[must_use]
    pub fn slack_webhook_url(&self) -> Option<&str> {
        non_empty(self.slack_webhook_url.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(
            config::Environment::default()
                .separator("__")
                .try_parsing(true),
        )
    }

    /// Loads configuration from any `config` source.
    ///
    /// Durations are checked here so bad values fail at startup.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_source<S>(source: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config: Self = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        config.pipeline.window()?;
        config.sessions.store_config()?;
        Ok(config)
    }
}
