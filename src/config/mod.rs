//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml`. Secrets
//! (chat tokens) can be supplied through environment variables, which
//! take precedence over the file. Intervals, capacities and endpoints
//! are all externalized here - nothing is hardcoded in the usecases.

pub mod loader;

use std::time::Duration;

use serde::Deserialize;

use crate::domain::alert::Direction;

/// Top-level service configuration.
///
/// Every section has defaults, so an empty file is a valid config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
  /// Service identity and logging.
  #[serde(default)]
  pub service: ServiceConfig,
  /// Upstream price feed endpoints and timings.
  #[serde(default)]
  pub feeds: FeedsConfig,
  /// Alert engine timings.
  #[serde(default)]
  pub engine: EngineConfig,
  /// Where alerts and baselines are stored.
  #[serde(default)]
  pub storage: StorageConfig,
  /// Health and metrics endpoints.
  #[serde(default)]
  pub http: HttpConfig,
  /// Notification sinks.
  #[serde(default)]
  pub notifiers: NotifiersConfig,
  /// Alerts inserted at startup if not already present.
  #[serde(default)]
  pub alerts: Vec<SeedAlert>,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  #[serde(default = "default_name")]
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Emit JSON log lines instead of the human-readable format.
  #[serde(default = "default_true")]
  pub log_json: bool,
}

/// Upstream price feed configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedsConfig {
  /// Base URL of the streaming (WebSocket) endpoint.
  #[serde(default = "default_ws_base_url")]
  pub ws_base_url: String,
  /// Base URL of the REST endpoint used for fallback polling.
  #[serde(default = "default_rest_base_url")]
  pub rest_base_url: String,
  /// Fallback polling interval.
  #[serde(default = "default_poll_interval")]
  pub poll_interval_secs: u64,
  /// How long to stay on fallback before retrying the stream.
  #[serde(default = "default_retry_cooldown")]
  pub retry_cooldown_secs: u64,
  /// REST request timeout.
  #[serde(default = "default_request_timeout")]
  pub request_timeout_secs: u64,
  /// Per-subscriber queue capacity.
  #[serde(default = "default_subscriber_capacity")]
  pub subscriber_capacity: usize,
  /// Buffer between a feed client and the fan-out task.
  #[serde(default = "default_sample_buffer")]
  pub sample_buffer: usize,
}

/// Alert engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
  /// How often enabled alerts are reconciled against subscriptions.
  #[serde(default = "default_reconcile_interval")]
  pub reconcile_interval_secs: u64,
  /// Upper bound on a single notifier delivery.
  #[serde(default = "default_notify_timeout")]
  pub notify_timeout_secs: u64,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
  /// Directory holding `alerts.json` and `last_prices.json`.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
}

/// HTTP endpoints configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
  /// Bind address for /live, /ready and /streams.
  #[serde(default = "default_health_bind")]
  pub health_bind: String,
  /// Bind address for the Prometheus /metrics endpoint.
  #[serde(default = "default_metrics_bind")]
  pub metrics_bind: String,
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub metrics_enabled: bool,
}

/// Notification sink configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifiersConfig {
  /// Log every alert through tracing.
  #[serde(default = "default_true")]
  pub log_enabled: bool,
  /// Deliver alerts to a Telegram chat (no-op without credentials).
  #[serde(default = "default_true")]
  pub telegram_enabled: bool,
  /// Telegram bot token. Overridden by `TELEGRAM_BOT_TOKEN`.
  #[serde(default)]
  pub telegram_bot_token: String,
  /// Telegram chat id. Overridden by `TELEGRAM_CHAT_ID`.
  #[serde(default)]
  pub telegram_chat_id: String,
  /// Deliver alerts by email (no-op without host, port, sender and recipient).
  #[serde(default = "default_true")]
  pub email_enabled: bool,
  /// SMTP host. Overridden by `SMTP_HOST`.
  #[serde(default)]
  pub email_smtp_host: String,
  /// SMTP port, 0 when unset. Overridden by `SMTP_PORT`.
  #[serde(default)]
  pub email_smtp_port: u16,
  /// SMTP user. Overridden by `SMTP_USER`.
  #[serde(default)]
  pub email_smtp_user: String,
  /// SMTP password. Overridden by `SMTP_PASS`.
  #[serde(default)]
  pub email_smtp_pass: String,
  /// Sender address. Overridden by `EMAIL_FROM`.
  #[serde(default)]
  pub email_from: String,
  /// Recipient address. Overridden by `EMAIL_TO`.
  #[serde(default)]
  pub email_to: String,
}

/// An alert declared in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedAlert {
  /// Watched symbol, uppercase.
  pub symbol: String,
  /// Price level.
  pub threshold: f64,
  /// Crossing direction.
  pub direction: Direction,
  /// Whether the alert starts enabled.
  #[serde(default = "default_true")]
  pub enabled: bool,
}

impl FeedsConfig {
  pub const fn poll_interval(&self) -> Duration {
    Duration::from_secs(self.poll_interval_secs)
  }

  pub const fn retry_cooldown(&self) -> Duration {
    Duration::from_secs(self.retry_cooldown_secs)
  }

  pub const fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }
}

impl EngineConfig {
  pub const fn reconcile_interval(&self) -> Duration {
    Duration::from_secs(self.reconcile_interval_secs)
  }

  pub const fn notify_timeout(&self) -> Duration {
    Duration::from_secs(self.notify_timeout_secs)
  }
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      name: default_name(),
      log_level: default_log_level(),
      log_json: true,
    }
  }
}

impl Default for FeedsConfig {
  fn default() -> Self {
    Self {
      ws_base_url: default_ws_base_url(),
      rest_base_url: default_rest_base_url(),
      poll_interval_secs: default_poll_interval(),
      retry_cooldown_secs: default_retry_cooldown(),
      request_timeout_secs: default_request_timeout(),
      subscriber_capacity: default_subscriber_capacity(),
      sample_buffer: default_sample_buffer(),
    }
  }
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      reconcile_interval_secs: default_reconcile_interval(),
      notify_timeout_secs: default_notify_timeout(),
    }
  }
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      data_dir: default_data_dir(),
    }
  }
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      health_bind: default_health_bind(),
      metrics_bind: default_metrics_bind(),
      metrics_enabled: true,
    }
  }
}

impl Default for NotifiersConfig {
  fn default() -> Self {
    Self {
      log_enabled: true,
      telegram_enabled: true,
      telegram_bot_token: String::new(),
      telegram_chat_id: String::new(),
      email_enabled: true,
      email_smtp_host: String::new(),
      email_smtp_port: 0,
      email_smtp_user: String::new(),
      email_smtp_pass: String::new(),
      email_from: String::new(),
      email_to: String::new(),
    }
  }
}

// Default value functions for serde

fn default_name() -> String {
  "crypto-alerts".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

const fn default_true() -> bool {
  true
}

fn default_ws_base_url() -> String {
  "wss://stream.binance.com:9443".to_string()
}

fn default_rest_base_url() -> String {
  "https://api.binance.com".to_string()
}

const fn default_poll_interval() -> u64 {
  10
}

const fn default_retry_cooldown() -> u64 {
  30
}

const fn default_request_timeout() -> u64 {
  10
}

const fn default_subscriber_capacity() -> usize {
  16
}

const fn default_sample_buffer() -> usize {
  8
}

const fn default_reconcile_interval() -> u64 {
  5
}

const fn default_notify_timeout() -> u64 {
  10
}

fn default_data_dir() -> String {
  "data".to_string()
}

fn default_health_bind() -> String {
  "0.0.0.0:8080".to_string()
}

fn default_metrics_bind() -> String {
  "0.0.0.0:9090".to_string()
}
