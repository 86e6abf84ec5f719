//! Server configuration loading from file and environment variables.

use nexcall_agent::{AgentInstructions, LlmConfig};
use nexcall_telephony::{MarkupOptions, TwilioConfig};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Chat-completions backend used by the agent.
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub twilio: TwilioConfig,

    /// Spoken-output and webhook settings.
    #[serde(default)]
    pub voice: VoiceConfig,

    #[serde(default)]
    pub conversations: ConversationsConfig,

    /// Agent persona and company knowledge.
    #[serde(default)]
    pub agent: AgentInstructions,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally reachable base URL. Outbound calls point the provider at
    /// `{public_url}{voice.webhook_path}`.
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,

    /// Upper bound on a single webhook-path write, including pool checkout.
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "nexcall_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default = "default_language")]
    pub language: String,

    /// Where calls are bridged when the agent hands off to a human.
    #[serde(default = "default_transfer_number")]
    pub transfer_number: String,

    /// Path the provider posts call events to. Also used as the gather action.
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,

    #[serde(default = "default_gather_timeout_secs")]
    pub gather_timeout_secs: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationsConfig {
    /// Conversations untouched for this long are evicted. 0 disables eviction.
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_db_path() -> String {
    "nexcall.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    2_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_op_timeout_ms() -> u64 {
    2_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_idle_ttl_secs() -> u64 {
    2 * 60 * 60
}

fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

fn default_webhook_path() -> String {
    "/api/twiml".to_string()
}

fn default_voice() -> String {
    MarkupOptions::default().voice
}

fn default_language() -> String {
    MarkupOptions::default().language
}

fn default_transfer_number() -> String {
    MarkupOptions::default().transfer_number
}

fn default_gather_timeout_secs() -> u32 {
    MarkupOptions::default().gather_timeout_secs
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
            op_timeout_ms: default_op_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice: default_voice(),
            language: default_language(),
            transfer_number: default_transfer_number(),
            webhook_path: default_webhook_path(),
            gather_timeout_secs: default_gather_timeout_secs(),
        }
    }
}

impl Default for ConversationsConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: default_idle_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl DatabaseConfig {
    /// Connection tunables for the pool.
    pub fn runtime_settings(&self) -> nexcall_db::DbRuntimeSettings {
        nexcall_db::DbRuntimeSettings {
            busy_timeout_ms: self.busy_timeout_ms,
            pool_max_size: self.pool_max_size,
        }
    }
}

impl VoiceConfig {
    /// Markup settings for the webhook responses.
    pub fn markup_options(&self) -> MarkupOptions {
        MarkupOptions {
            voice: self.voice.clone(),
            language: self.language.clone(),
            gather_action: self.webhook_path.clone(),
            gather_timeout_secs: self.gather_timeout_secs,
            transfer_number: self.transfer_number.clone(),
            ..MarkupOptions::default()
        }
    }
}

impl Config {
    /// URL handed to the provider when placing outbound calls.
    pub fn webhook_url(&self) -> String {
        format!(
            "{}{}",
            self.server.public_url.trim_end_matches('/'),
            self.voice.webhook_path
        )
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `NEXCALL_HOST`, `NEXCALL_PORT`, `NEXCALL_PUBLIC_URL` override `[server]`
/// - `NEXCALL_DB_PATH` overrides `database.path`
/// - `NEXCALL_LOG_LEVEL`, `NEXCALL_LOG_JSON` override `[logging]`
/// - `OPENAI_API_KEY`, `OPENAI_BASE_URL` override `[llm]`
/// - `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`, `TWILIO_PHONE_NUMBER` override `[twilio]`
/// - `NEXCALL_TRANSFER_NUMBER` overrides `voice.transfer_number`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// if the resulting configuration is unusable.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

fn load_config_with(
    path: Option<&str>,
    var: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, var);
    validate(&config)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("NEXCALL_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("NEXCALL_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(url) = var("NEXCALL_PUBLIC_URL") {
        config.server.public_url = url;
    }
    if let Some(db_path) = var("NEXCALL_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = var("NEXCALL_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("NEXCALL_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(key) = var("OPENAI_API_KEY") {
        config.llm.api_key = key;
    }
    if let Some(url) = var("OPENAI_BASE_URL") {
        config.llm.base_url = url;
    }
    if let Some(sid) = var("TWILIO_ACCOUNT_SID") {
        config.twilio.account_sid = sid;
    }
    if let Some(token) = var("TWILIO_AUTH_TOKEN") {
        config.twilio.auth_token = token;
    }
    if let Some(number) = var("TWILIO_PHONE_NUMBER") {
        config.twilio.phone_number = number;
    }
    if let Some(number) = var("NEXCALL_TRANSFER_NUMBER") {
        config.voice.transfer_number = number;
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if !config.voice.webhook_path.starts_with('/') {
        return Err(ConfigError::Invalid(format!(
            "voice.webhook_path must start with '/': {}",
            config.voice.webhook_path
        )));
    }
    if config.voice.transfer_number.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "voice.transfer_number must not be empty".to_string(),
        ));
    }
    if config.database.op_timeout_ms == 0 {
        return Err(ConfigError::Invalid(
            "database.op_timeout_ms must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
