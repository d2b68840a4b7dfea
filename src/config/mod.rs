//! Configuration management
//!
//! This module handles loading and parsing configuration for the Inkwell blog platform.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Token and session configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// AI content pipeline configuration
    #[serde(default)]
    pub ai: AiConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path or URL
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum pooled connections
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
    "data/inkwell.db".to_string()
}

fn default_max_connections() -> u32 {
    20
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    3600
}

fn default_max_capacity() -> u64 {
    10_000
}

/// Token and session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Token issuer claim
    #[serde(default = "default_issuer")]
    pub issuer: String,
    /// Access token lifetime in minutes
    #[serde(default = "default_access_token_minutes")]
    pub access_token_minutes: i64,
    /// Refresh token lifetime in days
    #[serde(default = "default_refresh_token_days")]
    pub refresh_token_days: i64,
    /// Session lifetime in hours
    #[serde(default = "default_session_hours")]
    pub session_hours: i64,
    /// Session lifetime in days when "remember me" is set
    #[serde(default = "default_remember_days")]
    pub remember_days: i64,
    /// Maximum concurrently active sessions per user
    #[serde(default = "default_max_sessions")]
    pub max_sessions_per_user: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            issuer: default_issuer(),
            access_token_minutes: default_access_token_minutes(),
            refresh_token_days: default_refresh_token_days(),
            session_hours: default_session_hours(),
            remember_days: default_remember_days(),
            max_sessions_per_user: default_max_sessions(),
        }
    }
}

fn default_jwt_secret() -> String {
    "change-me-in-production".to_string()
}

fn default_issuer() -> String {
    "inkwell".to_string()
}

fn default_access_token_minutes() -> i64 {
    60
}

fn default_refresh_token_days() -> i64 {
    30
}

fn default_session_hours() -> i64 {
    24
}

fn default_remember_days() -> i64 {
    30
}

fn default_max_sessions() -> i64 {
    5
}

/// AI content pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Run scheduled generation in the background
    #[serde(default)]
    pub enabled: bool,
    /// Hours between scheduled generation runs
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,
    /// Posts produced per scheduled run
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Generation attempts before giving up on a draft
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Publish approved content without manual moderation
    #[serde(default)]
    pub auto_publish: bool,
    /// Query the external encyclopedia when checking claims
    #[serde(default)]
    pub fact_check_lookup: bool,
    /// Summary endpoint used for claim lookups
    #[serde(default = "default_wikipedia_url")]
    pub wikipedia_url: String,
    /// Username that owns published AI posts
    #[serde(default = "default_ai_author")]
    pub author_username: String,
    /// Decision thresholds
    #[serde(default)]
    pub thresholds: SafetyThresholds,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_hours: default_interval_hours(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            auto_publish: false,
            fact_check_lookup: false,
            wikipedia_url: default_wikipedia_url(),
            author_username: default_ai_author(),
            thresholds: SafetyThresholds::default(),
        }
    }
}

impl AiConfig {
    /// Period between scheduled runs; `None` when `interval_hours` is zero or
    /// does not fit a timer
    pub fn interval(&self) -> Option<std::time::Duration> {
        let hours = u32::try_from(self.interval_hours).ok().filter(|h| *h > 0)?;
        std::time::Duration::from_secs(60 * 60).checked_mul(hours)
    }
}

fn default_interval_hours() -> u64 {
    8
}

/// Upper bound for `ai.interval_hours`, one year
pub const MAX_INTERVAL_HOURS: u64 = 24 * 365;

fn default_batch_size() -> usize {
    3
}

fn default_max_attempts() -> u32 {
    3
}

fn default_wikipedia_url() -> String {
    "https://en.wikipedia.org/api/rest_v1/page/summary".to_string()
}

fn default_ai_author() -> String {
    "admin".to_string()
}

/// Thresholds used when deciding the status of generated content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyThresholds {
    #[serde(default = "default_min_quality")]
    pub min_quality: f64,
    #[serde(default = "default_max_bias")]
    pub max_bias: f64,
    #[serde(default = "default_min_safety")]
    pub min_safety: f64,
    #[serde(default = "default_max_errors")]
    pub max_error_count: usize,
    #[serde(default = "default_review_threshold")]
    pub manual_review_threshold: f64,
    #[serde(default = "default_true")]
    pub auto_correction: bool,
}

impl Default for SafetyThresholds {
    fn default() -> Self {
        Self {
            min_quality: default_min_quality(),
            max_bias: default_max_bias(),
            min_safety: default_min_safety(),
            max_error_count: default_max_errors(),
            manual_review_threshold: default_review_threshold(),
            auto_correction: true,
        }
    }
}

fn default_min_quality() -> f64 {
    0.7
}

fn default_max_bias() -> f64 {
    0.3
}

fn default_min_safety() -> f64 {
    0.8
}

fn default_max_errors() -> usize {
    5
}

fn default_review_threshold() -> f64 {
    0.6
}

fn default_true() -> bool {
    true
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - INKWELL_SERVER_HOST
    /// - INKWELL_SERVER_PORT
    /// - INKWELL_SERVER_CORS_ORIGIN
    /// - INKWELL_DATABASE_URL
    /// - INKWELL_CACHE_TTL_SECONDS
    /// - INKWELL_AUTH_JWT_SECRET
    /// - INKWELL_AI_ENABLED
    /// - INKWELL_AI_AUTO_PUBLISH
    /// - INKWELL_AI_FACT_CHECK_LOOKUP
    /// - INKWELL_AI_INTERVAL_HOURS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.jwt_secret must not be empty".to_string(),
            ));
        }
        if self.ai.interval_hours == 0 {
            return Err(ConfigError::ValidationError(
                "ai.interval_hours must be at least 1".to_string(),
            ));
        }
        if self.ai.interval_hours > MAX_INTERVAL_HOURS {
            return Err(ConfigError::ValidationError(format!(
                "ai.interval_hours must be at most {MAX_INTERVAL_HOURS}"
            )));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("INKWELL_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("INKWELL_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("INKWELL_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        if let Ok(url) = std::env::var("INKWELL_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(ttl) = std::env::var("INKWELL_CACHE_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.cache.ttl_seconds = ttl;
            }
        }

        if let Ok(secret) = std::env::var("INKWELL_AUTH_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }

        if let Some(enabled) = env_bool("INKWELL_AI_ENABLED") {
            self.ai.enabled = enabled;
        }
        if let Some(auto_publish) = env_bool("INKWELL_AI_AUTO_PUBLISH") {
            self.ai.auto_publish = auto_publish;
        }
        if let Some(lookup) = env_bool("INKWELL_AI_FACT_CHECK_LOOKUP") {
            self.ai.fact_check_lookup = lookup;
        }
        if let Ok(hours) = std::env::var("INKWELL_AI_INTERVAL_HOURS") {
            if let Ok(hours) = hours.parse::<u64>() {
                self.ai.interval_hours = hours;
            }
        }
    }
}

fn env_bool(key: &str) -> Option<bool> {
    let value = std::env::var(key).ok()?;
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches INKWELL_* environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "INKWELL_SERVER_HOST",
    "INKWELL_SERVER_PORT",
    "INKWELL_SERVER_CORS_ORIGIN",
    "INKWELL_DATABASE_URL",
    "INKWELL_CACHE_TTL_SECONDS",
    "INKWELL_AUTH_JWT_SECRET",
    "INKWELL_AI_ENABLED",
    "INKWELL_AI_AUTO_PUBLISH",
    "INKWELL_AI_FACT_CHECK_LOOKUP",
    "INKWELL_AI_INTERVAL_HOURS",
];
