// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the contact relay.
//!
//! Every value can be set from the environment (a `.env` file is honoured by
//! the binary); anything unset falls back to the defaults below.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Configuration for the contact relay service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bind host (default: 0.0.0.0)
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port (default: 3000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; `*` allows any (default: *)
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Derive the client identifier from `X-Forwarded-For` (default: true)
    #[serde(default = "default_true")]
    pub trust_forwarded_for: bool,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Submission validation configuration
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Notification formatting
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Messaging provider configuration
    pub relay: RelayConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Per-client submission spacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Minimum spacing between accepted submissions per client, in seconds.
    /// Zero disables limiting. (default: 600)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Interval of the stale-entry sweep in seconds; zero disables it (default: 60)
    #[serde(default = "default_sweep_secs")]
    pub sweep_interval_secs: u64,
}

/// Submission constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Maximum number of attachments (default: 5)
    #[serde(default = "default_max_attachments")]
    pub max_attachments: usize,

    /// Maximum size of a single attachment in bytes (default: 8 MiB)
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: usize,

    /// Accepted attachment MIME types
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
}

/// Fixed text of the relayed notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_footer")]
    pub footer: String,

    /// Embed accent color as 0xRRGGBB (default: 0xEF4444)
    #[serde(default = "default_color")]
    pub color: u32,
}

/// Discord bot credentials and transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Bot token used in the `Authorization: Bot` header
    pub bot_token: String,

    /// User id of the fixed recipient
    pub recipient_id: String,

    /// REST API base (default: https://discord.com/api/v10)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Upper bound on a single delivery, in milliseconds (default: 10000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Delay between startup connection attempts, in seconds (default: 30)
    #[serde(default = "default_connect_retry_secs")]
    pub connect_retry_secs: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_window_secs() -> u64 {
    600 // 10 minutes between messages
}

fn default_sweep_secs() -> u64 {
    60
}

fn default_max_attachments() -> usize {
    5
}

fn default_max_attachment_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_allowed_mime_types() -> Vec<String> {
    [
        "application/pdf",
        "application/msword",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "text/plain",
        "image/jpeg",
        "image/png",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_title() -> String {
    "New message from the portfolio".to_string()
}

fn default_footer() -> String {
    "Portfolio Contact Form".to_string()
}

fn default_color() -> u32 {
    0xEF4444
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_connect_retry_secs() -> u64 {
    30
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            sweep_interval_secs: default_sweep_secs(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_attachments: default_max_attachments(),
            max_attachment_bytes: default_max_attachment_bytes(),
            allowed_mime_types: default_allowed_mime_types(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            footer: default_footer(),
            color: default_color(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl RelayConfig {
    /// Relay settings with default transport values.
    pub fn new(bot_token: impl Into<String>, recipient_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            recipient_id: recipient_id.into(),
            api_base: default_api_base(),
            timeout_ms: default_timeout_ms(),
            connect_retry_secs: default_connect_retry_secs(),
        }
    }

    /// Get the delivery timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get the startup connection retry interval
    pub fn connect_retry_interval(&self) -> Duration {
        Duration::from_secs(self.connect_retry_secs)
    }
}

impl RateLimitConfig {
    /// Get the rate window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Get the sweep interval, if sweeping is enabled
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

impl ValidationConfig {
    /// Most bytes the form reader accepts across all parts: a full set of
    /// attachments, one attachment of headroom and 1 MiB for the text fields.
    pub fn body_limit(&self) -> usize {
        (self.max_attachments + 1)
            .saturating_mul(self.max_attachment_bytes)
            .saturating_add(1024 * 1024)
    }
}

impl Config {
    /// Configuration with defaults everywhere except the provider credentials.
    pub fn new(relay: RelayConfig) -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
            trust_forwarded_for: default_true(),
            rate_limit: RateLimitConfig::default(),
            validation: ValidationConfig::default(),
            notification: NotificationConfig::default(),
            relay,
            metrics: MetricsConfig::default(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = required("DISCORD_BOT_TOKEN")?;
        let recipient_id = required("DISCORD_USER_ID")?;

        let mut relay = RelayConfig::new(bot_token, recipient_id);
        relay.api_base = optional("DISCORD_API_BASE")?.unwrap_or(relay.api_base);
        relay.timeout_ms = optional("RELAY_TIMEOUT_MS")?.unwrap_or(relay.timeout_ms);
        relay.connect_retry_secs =
            optional("RELAY_CONNECT_RETRY_SECS")?.unwrap_or(relay.connect_retry_secs);

        url::Url::parse(&relay.api_base).map_err(|e| ConfigError::Invalid {
            key: "DISCORD_API_BASE",
            reason: e.to_string(),
        })?;

        let mut config = Self::new(relay);
        config.host = optional("HOST")?.unwrap_or(config.host);
        config.port = optional("PORT")?.unwrap_or(config.port);
        config.trust_forwarded_for =
            optional("TRUST_FORWARDED_FOR")?.unwrap_or(config.trust_forwarded_for);
        config.rate_limit.window_secs =
            optional("RATE_LIMIT_WINDOW_SECS")?.unwrap_or(config.rate_limit.window_secs);
        config.rate_limit.sweep_interval_secs = optional("RATE_LIMIT_SWEEP_SECS")?
            .unwrap_or(config.rate_limit.sweep_interval_secs);
        config.metrics.enabled = optional("METRICS_ENABLED")?.unwrap_or(config.metrics.enabled);

        if let Some(origins) = optional::<String>("ALLOWED_ORIGINS")? {
            config.allowed_origins = parse_origins(&origins);
        }

        Ok(config)
    }

    /// Socket address string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Split a comma-separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn optional<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }),
        Err(_) => {
            info!(key, "not set, using default");
            Ok(None)
        }
    }
}
