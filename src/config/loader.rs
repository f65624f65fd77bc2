//! Configuration Loader - File Loading, Env Overrides and Validation
//!
//! Handles loading `config.toml`, applying secret overrides from the
//! environment, and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Env var that overrides `notifiers.telegram_bot_token`.
pub const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
/// Env var that overrides `notifiers.telegram_chat_id`.
pub const ENV_TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const ENV_SMTP_HOST: &str = "SMTP_HOST";
pub const ENV_SMTP_PORT: &str = "SMTP_PORT";
pub const ENV_SMTP_USER: &str = "SMTP_USER";
pub const ENV_SMTP_PASS: &str = "SMTP_PASS";
pub const ENV_EMAIL_FROM: &str = "EMAIL_FROM";
pub const ENV_EMAIL_TO: &str = "EMAIL_TO";

/// Load, override and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let mut config = parse_config(&content)?;
  apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
  validate_config(&config)?;

  info!(
    path = %path.display(),
    seed_alerts = config.alerts.len(),
    poll_interval_secs = config.feeds.poll_interval_secs,
    retry_cooldown_secs = config.feeds.retry_cooldown_secs,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse a TOML document into an `AppConfig` without validating it.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  toml::from_str(content).context("Failed to parse config.toml")
}

/// Replace secrets and SMTP settings with values from the environment
/// when present. Empty values are ignored.
///
/// `lookup` is injected so tests don't have to mutate process env.
///
/// # Errors
/// Fails if `SMTP_PORT` is set but is not a port number.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
  F: Fn(&str) -> Option<String>,
{
  let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
  let notifiers = &mut config.notifiers;

  let strings = [
    (ENV_TELEGRAM_BOT_TOKEN, &mut notifiers.telegram_bot_token),
    (ENV_TELEGRAM_CHAT_ID, &mut notifiers.telegram_chat_id),
    (ENV_SMTP_HOST, &mut notifiers.email_smtp_host),
    (ENV_SMTP_USER, &mut notifiers.email_smtp_user),
    (ENV_SMTP_PASS, &mut notifiers.email_smtp_pass),
    (ENV_EMAIL_FROM, &mut notifiers.email_from),
    (ENV_EMAIL_TO, &mut notifiers.email_to),
  ];
  for (key, field) in strings {
    if let Some(value) = get(key) {
      *field = value;
    }
  }

  if let Some(port) = get(ENV_SMTP_PORT) {
    notifiers.email_smtp_port = port
      .trim()
      .parse()
      .with_context(|| format!("{ENV_SMTP_PORT} is not a valid port: {port:?}"))?;
  }

  Ok(())
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Non-empty endpoint URLs
/// - Positive intervals, timeouts and capacities
/// - Seed alerts that would pass alert validation
pub fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.feeds.ws_base_url.is_empty(),
    "feeds.ws_base_url must not be empty"
  );
  anyhow::ensure!(
    !config.feeds.rest_base_url.is_empty(),
    "feeds.rest_base_url must not be empty"
  );
  anyhow::ensure!(
    config.feeds.poll_interval_secs > 0,
    "feeds.poll_interval_secs must be positive"
  );
  anyhow::ensure!(
    config.feeds.retry_cooldown_secs > 0,
    "feeds.retry_cooldown_secs must be positive"
  );
  anyhow::ensure!(
    config.feeds.request_timeout_secs > 0,
    "feeds.request_timeout_secs must be positive"
  );
  anyhow::ensure!(
    config.feeds.subscriber_capacity > 0,
    "feeds.subscriber_capacity must be positive"
  );
  anyhow::ensure!(
    config.feeds.sample_buffer > 0,
    "feeds.sample_buffer must be positive"
  );

  anyhow::ensure!(
    config.engine.reconcile_interval_secs > 0,
    "engine.reconcile_interval_secs must be positive"
  );
  anyhow::ensure!(
    config.engine.notify_timeout_secs > 0,
    "engine.notify_timeout_secs must be positive"
  );

  anyhow::ensure!(
    !config.storage.data_dir.is_empty(),
    "storage.data_dir must not be empty"
  );

  for (i, alert) in config.alerts.iter().enumerate() {
    anyhow::ensure!(
      !alert.symbol.is_empty() && alert.symbol.to_uppercase() == alert.symbol,
      "Seed alert {} has invalid symbol {:?} (must be non-empty uppercase)",
      i,
      alert.symbol
    );
    anyhow::ensure!(
      alert.threshold.is_finite() && alert.threshold > 0.0,
      "Seed alert {} ({}) threshold must be positive, got {}",
      i,
      alert.symbol,
      alert.threshold
    );
  }

  Ok(())
}
