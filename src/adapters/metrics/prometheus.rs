//! Prometheus Metrics Registry - Feed and Alert Observability
//!
//! Registers and exposes Prometheus metrics for Grafana dashboards:
//! sample throughput and drops per symbol, feed mode and failovers,
//! fired alerts and notifier failures.

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use prometheus::{
    Encoder, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::domain::alert::Direction;
use crate::domain::price::FeedMode;

/// Centralized Prometheus metrics for the alert service.
///
/// All metrics follow the naming convention `crypto_alerts_*` and carry
/// a `symbol` label where it applies.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Samples received from any feed, per symbol.
    pub samples_received: IntCounterVec,
    /// Samples dropped because a subscriber queue was full.
    pub samples_dropped: IntCounterVec,
    /// Current feed mode per symbol (see `FeedMode::as_gauge`).
    pub feed_mode: GaugeVec,
    /// Primary feed sessions that ended in an error.
    pub primary_failures: IntCounterVec,
    /// Alerts that fired.
    pub alerts_fired: IntCounterVec,
    /// Failed or timed-out notifier deliveries.
    pub notify_failures: IntCounterVec,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let samples_received = IntCounterVec::new(
            Opts::new(
                "crypto_alerts_samples_received_total",
                "Price samples received from upstream feeds",
            ),
            &["symbol"],
        )?;

        let samples_dropped = IntCounterVec::new(
            Opts::new(
                "crypto_alerts_samples_dropped_total",
                "Samples dropped for a subscriber whose queue was full",
            ),
            &["symbol"],
        )?;

        let feed_mode = GaugeVec::new(
            Opts::new(
                "crypto_alerts_feed_mode",
                "Feed mode (0=primary, 1=fallback, 2=retrying, 3=stopped)",
            ),
            &["symbol"],
        )?;

        let primary_failures = IntCounterVec::new(
            Opts::new(
                "crypto_alerts_primary_failures_total",
                "Primary feed sessions terminated by an error",
            ),
            &["symbol"],
        )?;

        let alerts_fired = IntCounterVec::new(
            Opts::new("crypto_alerts_alerts_fired_total", "Threshold crossings detected"),
            &["symbol", "direction"],
        )?;

        let notify_failures = IntCounterVec::new(
            Opts::new(
                "crypto_alerts_notify_failures_total",
                "Notifier deliveries that failed or timed out",
            ),
            &["notifier"],
        )?;

        registry.register(Box::new(samples_received.clone()))?;
        registry.register(Box::new(samples_dropped.clone()))?;
        registry.register(Box::new(feed_mode.clone()))?;
        registry.register(Box::new(primary_failures.clone()))?;
        registry.register(Box::new(alerts_fired.clone()))?;
        registry.register(Box::new(notify_failures.clone()))?;

        Ok(Self {
            registry,
            samples_received,
            samples_dropped,
            feed_mode,
            primary_failures,
            alerts_fired,
            notify_failures,
        })
    }

    pub fn record_sample(&self, symbol: &str) {
        self.samples_received.with_label_values(&[symbol]).inc();
    }

    pub fn record_drop(&self, symbol: &str) {
        self.samples_dropped.with_label_values(&[symbol]).inc();
    }

    pub fn record_mode(&self, symbol: &str, mode: FeedMode) {
        self.feed_mode.with_label_values(&[symbol]).set(mode.as_gauge());
    }

    pub fn record_primary_failure(&self, symbol: &str) {
        self.primary_failures.with_label_values(&[symbol]).inc();
    }

    pub fn record_alert(&self, symbol: &str, direction: Direction) {
        let direction = direction.to_string();
        self.alerts_fired
            .with_label_values(&[symbol, direction.as_str()])
            .inc();
    }

    pub fn record_notify_failure(&self, notifier: &str) {
        self.notify_failures.with_label_values(&[notifier]).inc();
    }

    /// Encode all metrics in the Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()> {
        let metrics = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics);
                async move {
                    metrics
                        .render()
                        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_series() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.record_sample("BTCUSDT");
        metrics.record_drop("BTCUSDT");
        metrics.record_mode("BTCUSDT", FeedMode::Fallback);
        metrics.record_alert("BTCUSDT", Direction::Up);

        let text = metrics.render().unwrap();
        assert!(text.contains("crypto_alerts_samples_received_total{symbol=\"BTCUSDT\"} 1"));
        assert!(text.contains("crypto_alerts_feed_mode{symbol=\"BTCUSDT\"} 1"));
        assert!(text.contains("direction=\"UP\""));
    }
}
