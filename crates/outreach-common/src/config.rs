//! Configuration for Outreach

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Send worker configuration
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Delivery channel configuration
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Contact handling
    #[serde(default)]
    pub contacts: ContactsConfig,

    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://outreach.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Send worker pacing and safety limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Sleep when no campaign is sending (milliseconds)
    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,

    /// Pause after a batch smaller than the campaign batch size (milliseconds)
    #[serde(default = "default_short_pause_ms")]
    pub short_pause_ms: u64,

    /// Ceiling for the delay after a continuation line (milliseconds)
    #[serde(default = "default_line_delay_cap_ms")]
    pub line_delay_cap_ms: u64,

    /// Upper bound for a single adapter call (seconds)
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_interval_ms: default_idle_interval_ms(),
            short_pause_ms: default_short_pause_ms(),
            line_delay_cap_ms: default_line_delay_cap_ms(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

fn default_idle_interval_ms() -> u64 {
    2000
}

fn default_short_pause_ms() -> u64 {
    2000
}

fn default_line_delay_cap_ms() -> u64 {
    2000
}

fn default_send_timeout_secs() -> u64 {
    45
}

/// Delivery backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryBackend {
    #[default]
    Simulated,
    Gateway,
    Twilio,
}

impl std::str::FromStr for DeliveryBackend {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simulated" => Ok(DeliveryBackend::Simulated),
            "gateway" => Ok(DeliveryBackend::Gateway),
            "twilio" => Ok(DeliveryBackend::Twilio),
            other => Err(crate::Error::Config(format!(
                "Unknown delivery backend: {}",
                other
            ))),
        }
    }
}

/// Delivery channel configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Which adapter the worker sends through
    #[serde(default)]
    pub backend: DeliveryBackend,

    /// Simulated adapter settings
    #[serde(default)]
    pub simulated: SimulatedConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Twilio settings
    #[serde(default)]
    pub twilio: TwilioConfig,
}

/// Simulated adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedConfig {
    /// Artificial latency per send (milliseconds)
    #[serde(default = "default_simulated_latency_ms")]
    pub latency_ms: u64,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_simulated_latency_ms(),
        }
    }
}

fn default_simulated_latency_ms() -> u64 {
    500
}

/// HTTP channel gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the gateway service
    #[serde(default = "default_gateway_url")]
    pub url: String,

    /// Timeout for text sends (seconds)
    #[serde(default = "default_text_timeout")]
    pub text_timeout_secs: u64,

    /// Timeout for media sends (seconds)
    #[serde(default = "default_media_timeout")]
    pub media_timeout_secs: u64,

    /// Timeout for health, QR and logout calls (seconds)
    #[serde(default = "default_status_timeout")]
    pub status_timeout_secs: u64,

    /// Directory relative attachment paths are resolved against
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            text_timeout_secs: default_text_timeout(),
            media_timeout_secs: default_media_timeout(),
            status_timeout_secs: default_status_timeout(),
            media_root: default_media_root(),
        }
    }
}

fn default_gateway_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_text_timeout() -> u64 {
    15
}

fn default_media_timeout() -> u64 {
    30
}

fn default_status_timeout() -> u64 {
    5
}

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

/// Twilio configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwilioConfig {
    /// Account SID
    pub account_sid: Option<String>,

    /// Auth token
    pub auth_token: Option<String>,

    /// Sender number, e.g. `+14155238886`
    pub from: Option<String>,

    /// API base URL
    #[serde(default = "default_twilio_api_base")]
    pub api_base: String,

    /// Request timeout (seconds)
    #[serde(default = "default_media_timeout")]
    pub timeout_secs: u64,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from: None,
            api_base: default_twilio_api_base(),
            timeout_secs: default_media_timeout(),
        }
    }
}

fn default_twilio_api_base() -> String {
    "https://api.twilio.com".to_string()
}

/// Contact handling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactsConfig {
    /// Country prefix applied to local numbers
    #[serde(default = "default_country_code")]
    pub default_country_code: String,
}

impl Default for ContactsConfig {
    fn default() -> Self {
        Self {
            default_country_code: default_country_code(),
        }
    }
}

fn default_country_code() -> String {
    crate::types::DEFAULT_COUNTRY_CODE.to_string()
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Serve the REST API alongside the worker
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,

    /// Bind address
    #[serde(default = "default_api_bind")]
    pub bind: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            bind: default_api_bind(),
        }
    }
}

fn default_api_enabled() -> bool {
    true
}

fn default_api_bind() -> String {
    "0.0.0.0:8080".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from the first existing file, then apply
    /// environment overrides. Falls back to defaults when no file exists.
    pub fn load() -> crate::Result<Self> {
        let mut paths = Vec::new();
        if let Ok(path) = std::env::var("OUTREACH_CONFIG") {
            paths.push(PathBuf::from(path));
        }
        paths.extend([
            PathBuf::from("./outreach.toml"),
            PathBuf::from("./config.toml"),
            PathBuf::from("/etc/outreach/config.toml"),
        ]);

        let mut config = match paths.iter().find(|p| p.exists()) {
            Some(path) => Self::from_file(path)?,
            None => {
                tracing::warn!("No configuration file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `OUTREACH_DELIVERY_BACKEND`, `OUTREACH_GATEWAY_URL` and `DATABASE_URL`
    pub fn apply_env_overrides(&mut self) -> crate::Result<()> {
        if let Ok(backend) = std::env::var("OUTREACH_DELIVERY_BACKEND") {
            self.delivery.backend = backend.parse()?;
        }
        if let Ok(url) = std::env::var("OUTREACH_GATEWAY_URL") {
            self.delivery.gateway.url = url;
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }
        Ok(())
    }
}
