//! Alert Engine - Subscription Reconciliation and Crossing Dispatch
//!
//! The orchestrating loop of the service:
//! 1. Every reconcile tick, subscribe to each symbol that has an enabled alert
//! 2. Drain every subscription without blocking
//! 3. Compare each update against the symbol's stored baseline
//! 4. Dispatch an `AlertEvent` to every enabled notifier for each crossing
//!
//! The first update of a symbol only establishes its baseline. Crossing
//! evaluation always uses the previous baseline, then the baseline moves
//! to the new price.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::config::EngineConfig;
use crate::domain::alert::AlertRule;
use crate::domain::crossing::alert_fires;
use crate::domain::price::Update;
use crate::ports::notifier::{AlertEvent, Notifier, NotifyError};
use crate::ports::repository::{AlertSource, BaselineStore};

use super::price_router::PriceRouter;
use super::symbol_stream::Subscription;

/// Engine timing.
#[derive(Debug, Clone)]
pub struct EngineSettings {
  /// Interval between reconcile + drain passes.
  pub reconcile_interval: Duration,
  /// Upper bound on one notifier delivery.
  pub notify_timeout: Duration,
}

impl Default for EngineSettings {
  fn default() -> Self {
    Self {
      reconcile_interval: Duration::from_secs(5),
      notify_timeout: Duration::from_secs(10),
    }
  }
}

impl From<&EngineConfig> for EngineSettings {
  fn from(config: &EngineConfig) -> Self {
    Self {
      reconcile_interval: config.reconcile_interval(),
      notify_timeout: config.notify_timeout(),
    }
  }
}

/// Alert engine driving subscriptions, detection and notification.
pub struct AlertEngine<A: AlertSource, B: BaselineStore> {
  /// Shared price router.
  router: Arc<PriceRouter>,
  /// Source of enabled alerts.
  alerts: Arc<A>,
  /// Last-price store.
  baselines: Arc<B>,
  /// Notification sinks, disabled ones included.
  notifiers: Vec<Arc<dyn Notifier>>,
  /// Timing.
  settings: EngineSettings,
  /// One subscription per symbol the engine follows.
  subscriptions: HashMap<String, Subscription>,
  /// Optional metrics sink.
  metrics: Option<Arc<MetricsRegistry>>,
}

impl<A: AlertSource, B: BaselineStore> AlertEngine<A, B> {
  pub fn new(
    router: Arc<PriceRouter>,
    alerts: Arc<A>,
    baselines: Arc<B>,
    notifiers: Vec<Arc<dyn Notifier>>,
    settings: EngineSettings,
  ) -> Self {
    Self {
      router,
      alerts,
      baselines,
      notifiers,
      settings,
      subscriptions: HashMap::new(),
      metrics: None,
    }
  }

  #[must_use]
  pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  /// Symbols the engine currently holds a subscription for, sorted.
  pub fn subscribed_symbols(&self) -> Vec<String> {
    let mut symbols: Vec<_> = self.subscriptions.keys().cloned().collect();
    symbols.sort();
    symbols
  }

  /// Run until `shutdown` fires.
  ///
  /// The first pass happens immediately; later passes follow the
  /// reconcile interval. The loop only suspends on that timer.
  #[instrument(skip_all, name = "alert_engine")]
  pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
    info!(
      reconcile_secs = self.settings.reconcile_interval.as_secs(),
      notifiers = self.notifiers.len(),
      "Starting alert engine"
    );

    let mut ticker = tokio::time::interval(self.settings.reconcile_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      tokio::select! {
        biased;
        () = shutdown.cancelled() => {
          info!("Shutdown signal received, stopping alert engine");
          break;
        }
        _ = ticker.tick() => {}
      }

      self.reconcile().await;
      self.pump().await;
    }

    Ok(())
  }

  /// Subscribe to every symbol with an enabled alert not yet followed.
  ///
  /// Returns the number of new subscriptions. A failed alert read is
  /// logged and retried on the next tick.
  pub async fn reconcile(&mut self) -> usize {
    let alerts = match self.alerts.list_enabled_alerts().await {
      Ok(alerts) => alerts,
      Err(e) => {
        warn!(error = %e, "Failed to list enabled alerts");
        return 0;
      }
    };

    let mut added = 0;
    for alert in alerts.iter().filter(|a| a.enabled) {
      if self.subscriptions.contains_key(&alert.symbol) {
        continue;
      }
      let subscription = self.router.subscribe(&alert.symbol);
      self.subscriptions.insert(alert.symbol.clone(), subscription);
      info!(symbol = %alert.symbol, "Subscribed to price updates");
      added += 1;
    }
    added
  }

  /// Drain every subscription until empty and process the updates.
  ///
  /// Disconnected subscriptions are forgotten so the next reconcile can
  /// subscribe again. Returns the number of updates processed.
  pub async fn pump(&mut self) -> usize {
    let mut updates = Vec::new();
    let mut disconnected = Vec::new();

    for (symbol, subscription) in &mut self.subscriptions {
      loop {
        match subscription.try_recv() {
          Ok(update) => updates.push(update),
          Err(TryRecvError::Empty) => break,
          Err(TryRecvError::Disconnected) => {
            disconnected.push(symbol.clone());
            break;
          }
        }
      }
    }

    for symbol in disconnected {
      debug!(%symbol, "Subscription disconnected, will resubscribe");
      self.subscriptions.remove(&symbol);
    }

    for update in &updates {
      self.handle_price_update(update).await;
    }
    updates.len()
  }

  /// Evaluate one update against its symbol's baseline and alerts.
  ///
  /// Returns the events that were dispatched.
  pub async fn handle_price_update(&self, update: &Update) -> Vec<AlertEvent> {
    let previous = match self.baselines.last_price(&update.symbol).await {
      Ok(previous) => previous,
      Err(e) => {
        warn!(symbol = %update.symbol, error = %e, "Failed to read baseline, skipping update");
        return Vec::new();
      }
    };

    if let Err(e) = self
      .baselines
      .set_last_price(&update.symbol, update.price)
      .await
    {
      warn!(symbol = %update.symbol, error = %e, "Failed to store baseline");
    }

    let Some(previous) = previous else {
      debug!(symbol = %update.symbol, price = update.price, "Baseline established");
      return Vec::new();
    };

    let alerts = match self.alerts.list_enabled_alerts().await {
      Ok(alerts) => alerts,
      Err(e) => {
        warn!(symbol = %update.symbol, error = %e, "Failed to list alerts for evaluation");
        return Vec::new();
      }
    };

    let mut events = Vec::new();
    for alert in alerts.iter().filter(|a| a.symbol == update.symbol) {
      if !alert_fires(previous, update.price, alert) {
        continue;
      }
      let event = Self::event_for(alert, update);
      info!(
        alert_id = %event.alert_id,
        symbol = %event.symbol,
        direction = %event.direction,
        previous,
        price = event.price,
        threshold = event.threshold,
        "Alert fired"
      );
      if let Some(metrics) = &self.metrics {
        metrics.record_alert(&event.symbol, event.direction);
      }
      self.dispatch(&event).await;
      events.push(event);
    }
    events
  }

  fn event_for(alert: &AlertRule, update: &Update) -> AlertEvent {
    AlertEvent {
      alert_id: alert.id.clone(),
      symbol: update.symbol.clone(),
      price: update.price,
      threshold: alert.threshold,
      direction: alert.direction,
      triggered_at: Utc::now(),
    }
  }

  /// Deliver `event` to every enabled notifier concurrently.
  ///
  /// Each delivery is bounded by the notify timeout. Failures are logged
  /// per sink and never propagate.
  async fn dispatch(&self, event: &AlertEvent) {
    let timeout = self.settings.notify_timeout;
    let deliveries = self
      .notifiers
      .iter()
      .filter(|n| n.enabled())
      .map(|notifier| async move {
        let outcome = match tokio::time::timeout(timeout, notifier.notify(event)).await {
          Ok(result) => result,
          Err(_) => Err(NotifyError::Timeout(timeout)),
        };
        (notifier.name(), outcome)
      });

    for (name, outcome) in join_all(deliveries).await {
      if let Err(e) = outcome {
        error!(notifier = name, alert_id = %event.alert_id, error = %e, "Notification failed");
        if let Some(metrics) = &self.metrics {
          metrics.record_notify_failure(name);
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use async_trait::async_trait;
  use parking_lot::Mutex;
  use tokio::sync::mpsc;

  use crate::domain::alert::Direction;
  use crate::domain::price::PriceSample;
  use crate::ports::price_feed::{FeedError, PollingFeed, StreamingFeed};
  use crate::usecases::symbol_stream::StreamSettings;

  struct IdlePrimary;

  #[async_trait]
  impl StreamingFeed for IdlePrimary {
    fn name(&self) -> &'static str {
      "idle"
    }

    async fn stream(
      &self,
      _symbol: &str,
      _out: &mpsc::Sender<PriceSample>,
      cancel: &CancellationToken,
    ) -> Result<(), FeedError> {
      cancel.cancelled().await;
      Ok(())
    }
  }

  struct IdlePoller;

  #[async_trait]
  impl PollingFeed for IdlePoller {
    fn name(&self) -> &'static str {
      "idle"
    }

    async fn fetch_price(&self, _symbol: &str) -> Result<f64, FeedError> {
      Err(FeedError::Parse)
    }
  }

  #[derive(Default)]
  struct MemoryAlerts(Mutex<Vec<AlertRule>>);

  #[async_trait]
  impl AlertSource for MemoryAlerts {
    async fn list_enabled_alerts(&self) -> Result<Vec<AlertRule>> {
      Ok(self.0.lock().iter().filter(|a| a.enabled).cloned().collect())
    }
  }

  #[derive(Default)]
  struct MemoryBaselines(Mutex<HashMap<String, f64>>);

  #[async_trait]
  impl BaselineStore for MemoryBaselines {
    async fn last_price(&self, symbol: &str) -> Result<Option<f64>> {
      Ok(self.0.lock().get(symbol).copied())
    }

    async fn set_last_price(&self, symbol: &str, price: f64) -> Result<()> {
      self.0.lock().insert(symbol.to_string(), price);
      Ok(())
    }
  }

  #[derive(Default)]
  struct Recorder(Mutex<Vec<AlertEvent>>);

  #[async_trait]
  impl Notifier for Recorder {
    fn name(&self) -> &'static str {
      "recorder"
    }

    fn enabled(&self) -> bool {
      true
    }

    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError> {
      self.0.lock().push(event.clone());
      Ok(())
    }
  }

  fn router() -> Arc<PriceRouter> {
    Arc::new(PriceRouter::new(
      Arc::new(IdlePrimary),
      Arc::new(IdlePoller),
      StreamSettings::default(),
    ))
  }

  fn engine(
    alerts: Vec<AlertRule>,
    recorder: Arc<Recorder>,
  ) -> AlertEngine<MemoryAlerts, MemoryBaselines> {
    AlertEngine::new(
      router(),
      Arc::new(MemoryAlerts(Mutex::new(alerts))),
      Arc::new(MemoryBaselines::default()),
      vec![recorder as Arc<dyn Notifier>],
      EngineSettings::default(),
    )
  }

  fn btc(price: f64) -> Update {
    PriceSample::new("BTCUSDT", price).unwrap()
  }

  #[tokio::test]
  async fn test_first_update_only_sets_baseline() {
    let recorder = Arc::new(Recorder::default());
    let alert = AlertRule::new("BTCUSDT", 100.0, Direction::Up).unwrap();
    let engine = engine(vec![alert], Arc::clone(&recorder));

    assert!(engine.handle_price_update(&btc(150.0)).await.is_empty());
    assert_eq!(engine.baselines.last_price("BTCUSDT").await.unwrap(), Some(150.0));
    assert!(recorder.0.lock().is_empty());
  }

  #[tokio::test]
  async fn test_upward_crossing_fires_once() {
    let recorder = Arc::new(Recorder::default());
    let alert = AlertRule::new("BTCUSDT", 100.0, Direction::Up).unwrap();
    let id = alert.id.clone();
    let engine = engine(vec![alert], Arc::clone(&recorder));

    engine.handle_price_update(&btc(99.0)).await;
    let fired = engine.handle_price_update(&btc(101.0)).await;
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].alert_id, id);
    assert_eq!(fired[0].price, 101.0);

    // Staying above the threshold does not re-fire.
    assert!(engine.handle_price_update(&btc(105.0)).await.is_empty());
    assert_eq!(recorder.0.lock().len(), 1);
  }

  #[tokio::test]
  async fn test_other_symbols_and_disabled_alerts_ignored() {
    let recorder = Arc::new(Recorder::default());
    let eth = AlertRule::new("ETHUSDT", 100.0, Direction::Up).unwrap();
    let mut disabled = AlertRule::new("BTCUSDT", 100.0, Direction::Up).unwrap();
    disabled.enabled = false;
    let engine = engine(vec![eth, disabled], Arc::clone(&recorder));

    engine.handle_price_update(&btc(99.0)).await;
    assert!(engine.handle_price_update(&btc(101.0)).await.is_empty());
    assert!(recorder.0.lock().is_empty());
  }

  #[tokio::test]
  async fn test_reconcile_subscribes_once_per_symbol() {
    let recorder = Arc::new(Recorder::default());
    let alerts = vec![
      AlertRule::new("BTCUSDT", 100.0, Direction::Up).unwrap(),
      AlertRule::new("BTCUSDT", 90.0, Direction::Down).unwrap(),
      AlertRule::new("ETHUSDT", 3000.0, Direction::Up).unwrap(),
    ];
    let mut engine = engine(alerts, recorder);

    assert_eq!(engine.reconcile().await, 2);
    assert_eq!(engine.reconcile().await, 0);
    assert_eq!(engine.subscribed_symbols(), vec!["BTCUSDT", "ETHUSDT"]);
    assert_eq!(engine.router.subscriber_count("BTCUSDT"), 1);
    engine.router.stop_all();
  }

  #[tokio::test]
  async fn test_pump_drains_fanned_out_updates() {
    let recorder = Arc::new(Recorder::default());
    let alert = AlertRule::new("BTCUSDT", 100.0, Direction::Down).unwrap();
    let mut engine = engine(vec![alert], Arc::clone(&recorder));
    engine.reconcile().await;

    let stream = engine.router.stream("BTCUSDT").unwrap();
    for price in [110.0, 105.0, 95.0] {
      stream.fan_out(&btc(price));
    }

    assert_eq!(engine.pump().await, 3);
    assert_eq!(recorder.0.lock().len(), 1);
    assert_eq!(recorder.0.lock()[0].direction, Direction::Down);
    engine.router.stop_all();
  }

  #[tokio::test]
  async fn test_stopped_stream_is_resubscribed() {
    let recorder = Arc::new(Recorder::default());
    let alert = AlertRule::new("BTCUSDT", 100.0, Direction::Up).unwrap();
    let mut engine = engine(vec![alert], recorder);
    engine.reconcile().await;

    assert!(engine.router.stop("BTCUSDT"));
    engine.pump().await;
    assert!(engine.subscribed_symbols().is_empty());

    assert_eq!(engine.reconcile().await, 1);
    assert_eq!(engine.router.active_symbols(), vec!["BTCUSDT"]);
    engine.router.stop_all();
  }
}
