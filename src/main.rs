//! Crypto Alerts - Entry Point
//!
//! Wires configuration, storage, price feeds, notifiers and the alert
//! engine. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config (path from argv[1], `CRYPTO_ALERTS_CONFIG`, or config.toml)
//! 2. Init tracing (JSON or human-readable)
//! 3. Open JSON alert and baseline stores, insert seed alerts
//! 4. Create Binance WebSocket (primary) and REST (fallback) feeds
//! 5. Create the price router with metrics
//! 6. Create notifiers (log, Telegram, email)
//! 7. Spawn health server (/live, /ready, /streams) and metrics server
//! 8. Spawn the alert engine
//! 9. Wait for SIGINT, then shut down: not-ready, stop engine, stop feeds

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crypto_alerts::adapters::feeds::{BinanceRestFeed, BinanceStreamFeed};
use crypto_alerts::adapters::metrics::{HealthState, MetricsRegistry, health};
use crypto_alerts::adapters::notify::{EmailNotifier, EmailSettings, LogNotifier, TelegramNotifier};
use crypto_alerts::adapters::persistence::{JsonAlertStore, JsonBaselineStore};
use crypto_alerts::config::{self, AppConfig};
use crypto_alerts::ports::notifier::Notifier;
use crypto_alerts::usecases::{AlertEngine, EngineSettings, PriceRouter, StreamSettings};

/// Env var naming the config file when no argument is given.
const ENV_CONFIG_PATH: &str = "CRYPTO_ALERTS_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(ENV_CONFIG_PATH).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = config::loader::load_config(&config_path)
        .with_context(|| format!("Failed to load configuration from {config_path}"))?;

    // ── 2. Initialize structured logging ────────────────────
    init_tracing(&config);

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        seed_alerts = config.alerts.len(),
        "Starting crypto alerts"
    );

    // ── 3. Storage ──────────────────────────────────────────
    let alert_store = Arc::new(
        JsonAlertStore::open(&config.storage.data_dir)
            .await
            .context("Failed to open alert store")?,
    );
    let baseline_store = Arc::new(
        JsonBaselineStore::open(&config.storage.data_dir)
            .await
            .context("Failed to open baseline store")?,
    );
    let seeded = alert_store
        .seed(&config.alerts)
        .await
        .context("Failed to insert seed alerts")?;
    info!(seeded, "Seed alerts applied");

    // ── 4. Price feeds ──────────────────────────────────────
    let primary = Arc::new(
        BinanceStreamFeed::new(config.feeds.ws_base_url.clone())
            .with_connect_timeout(config.feeds.request_timeout()),
    );
    let fallback = Arc::new(
        BinanceRestFeed::new(
            config.feeds.rest_base_url.clone(),
            config.feeds.request_timeout(),
        )
        .context("Failed to create REST price feed")?,
    );

    // ── 5. Price router ─────────────────────────────────────
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);
    let router = Arc::new(
        PriceRouter::new(primary, fallback, StreamSettings::from(&config.feeds))
            .with_metrics(Arc::clone(&metrics)),
    );

    // ── 6. Notifiers ────────────────────────────────────────
    let notifiers = build_notifiers(&config)?;

    // ── 7. Health and metrics servers ───────────────────────
    let shutdown = CancellationToken::new();
    let health_state = Arc::new(
        HealthState::new(Arc::clone(&router)).with_storage(Arc::clone(&baseline_store)),
    );

    let health_handle = tokio::spawn(health::serve(
        Arc::clone(&health_state),
        config.http.health_bind.clone(),
        shutdown.child_token(),
    ));

    let metrics_handle = if config.http.metrics_enabled {
        let metrics_bind = config.http.metrics_bind.clone();
        let metrics_shutdown = shutdown.child_token();
        let metrics_ref = Arc::clone(&metrics);
        Some(tokio::spawn(async move {
            if let Err(e) = metrics_ref.serve(metrics_bind, metrics_shutdown).await {
                error!(error = %e, "Metrics server failed");
            }
        }))
    } else {
        None
    };

    // ── 8. Alert engine ─────────────────────────────────────
    let mut engine = AlertEngine::new(
        Arc::clone(&router),
        Arc::clone(&alert_store),
        Arc::clone(&baseline_store),
        notifiers,
        EngineSettings::from(&config.engine),
    )
    .with_metrics(Arc::clone(&metrics));

    let engine_shutdown = shutdown.child_token();
    let engine_handle = tokio::spawn(async move {
        if let Err(e) = engine.run(engine_shutdown).await {
            error!(error = %e, "Alert engine failed");
        }
    });

    info!("All tasks spawned, service is running");

    // ── 9. Wait for SIGINT ──────────────────────────────────
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for SIGINT, shutting down");
    }
    info!("SIGINT received, initiating graceful shutdown");

    // 1. /ready → 503
    health_state.set_not_ready();

    // 2. Stop the engine, then every feed session
    shutdown.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(10), engine_handle).await;
    router.stop_all();

    // 3. Let the HTTP servers drain
    match tokio::time::timeout(Duration::from_secs(5), health_handle).await {
        Ok(Ok(Err(e))) => warn!(error = %e, "Health server exited with error"),
        Ok(Err(e)) => warn!(error = %e, "Health server task panicked"),
        Err(_) => warn!("Health server did not stop in time"),
        Ok(Ok(Ok(()))) => {}
    }
    if let Some(handle) = metrics_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level));

    if config.service.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Build every configured sink. Disabled sinks are kept; the engine skips them.
fn build_notifiers(config: &AppConfig) -> Result<Vec<Arc<dyn Notifier>>> {
    let settings = &config.notifiers;
    let telegram = TelegramNotifier::new(
        &settings.telegram_bot_token,
        &settings.telegram_chat_id,
        settings.telegram_enabled,
        config.engine.notify_timeout(),
    )
    .context("Failed to create Telegram notifier")?;

    if settings.telegram_enabled && !telegram.is_configured() {
        warn!("Telegram notifier enabled without bot token or chat id, deliveries are skipped");
    }

    let smtp = EmailSettings {
        host: settings.email_smtp_host.clone(),
        port: settings.email_smtp_port,
        user: settings.email_smtp_user.clone(),
        pass: settings.email_smtp_pass.clone(),
        from: settings.email_from.clone(),
        to: settings.email_to.clone(),
    };
    let email = EmailNotifier::new(&smtp, settings.email_enabled, config.engine.notify_timeout())
        .context("Failed to create email notifier")?;

    if settings.email_enabled && !email.is_configured() {
        info!("Email notifier has no SMTP host, port, sender or recipient, deliveries are skipped");
    }

    let log: Arc<dyn Notifier> = Arc::new(LogNotifier::new(settings.log_enabled));
    let telegram: Arc<dyn Notifier> = Arc::new(telegram);
    let email: Arc<dyn Notifier> = Arc::new(email);
    Ok(vec![log, telegram, email])
}
