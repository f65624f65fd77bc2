//! Price Router - Deduplicated Per-Symbol Price Streams
//!
//! Hands out subscriptions keyed by symbol. The first subscriber of a
//! symbol spawns its `SymbolStream`; every later subscriber joins the
//! same stream, so each symbol holds at most one upstream session no
//! matter how many consumers it has.
//!
//! Streams are not torn down when their last subscriber leaves. Use
//! `stop` for a single symbol or `stop_all` at shutdown.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::domain::price::FeedMode;
use crate::ports::price_feed::{PollingFeed, StreamingFeed};

use super::symbol_stream::{StreamSettings, Subscription, SymbolStream};

/// Registry of live symbol streams.
pub struct PriceRouter {
  /// Live streams by symbol. Never locked across an await.
  streams: Mutex<HashMap<String, Arc<SymbolStream>>>,
  /// Preferred streaming source.
  primary: Arc<dyn StreamingFeed>,
  /// Polling source used while the primary is down.
  fallback: Arc<dyn PollingFeed>,
  /// Settings applied to every new stream.
  settings: StreamSettings,
  /// Parent of every stream's cancellation token.
  shutdown: CancellationToken,
  /// Optional metrics sink handed to each stream.
  metrics: Option<Arc<MetricsRegistry>>,
}

impl PriceRouter {
  pub fn new(
    primary: Arc<dyn StreamingFeed>,
    fallback: Arc<dyn PollingFeed>,
    settings: StreamSettings,
  ) -> Self {
    Self {
      streams: Mutex::new(HashMap::new()),
      primary,
      fallback,
      settings,
      shutdown: CancellationToken::new(),
      metrics: None,
    }
  }

  /// Attach a metrics registry. Affects streams created afterwards.
  #[must_use]
  pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  /// Subscribe to `symbol`, starting its stream if none is live.
  ///
  /// Must be called from within a tokio runtime. After `stop_all` the
  /// router is terminal: new subscriptions are disconnected at once.
  pub fn subscribe(&self, symbol: &str) -> Subscription {
    let mut streams = self.streams.lock();
    if self.is_shut_down() {
      warn!(symbol, "Router is shut down, subscription will not receive updates");
      return Subscription::disconnected(symbol);
    }

    let stream = streams.entry(symbol.to_string()).or_insert_with(|| {
      info!(symbol, "Starting symbol stream");
      SymbolStream::spawn(
        symbol,
        Arc::clone(&self.primary),
        Arc::clone(&self.fallback),
        self.settings.clone(),
        self.shutdown.child_token(),
        self.metrics.clone(),
      )
    });

    let subscription = stream.subscribe(self.settings.subscriber_capacity);
    debug!(symbol, subscribers = stream.subscriber_count(), "Subscriber added");
    subscription
  }

  /// Stop one symbol's stream. Returns false if it was not live.
  pub fn stop(&self, symbol: &str) -> bool {
    let removed = self.streams.lock().remove(symbol);
    match removed {
      Some(stream) => {
        stream.stop();
        info!(symbol, "Symbol stream stopped");
        true
      }
      None => false,
    }
  }

  /// Cancel every stream. Used at process shutdown.
  pub fn stop_all(&self) {
    self.shutdown.cancel();
    let streams: Vec<_> = self.streams.lock().drain().map(|(_, s)| s).collect();
    for stream in &streams {
      stream.stop();
    }
    info!(count = streams.len(), "All symbol streams stopped");
  }

  pub fn is_shut_down(&self) -> bool {
    self.shutdown.is_cancelled()
  }

  /// Current feed mode of `symbol`, if it has a live stream.
  pub fn mode(&self, symbol: &str) -> Option<FeedMode> {
    self.streams.lock().get(symbol).map(|s| s.mode())
  }

  /// Feed mode of every live stream.
  pub fn modes(&self) -> HashMap<String, FeedMode> {
    self
      .streams
      .lock()
      .iter()
      .map(|(symbol, stream)| (symbol.clone(), stream.mode()))
      .collect()
  }

  /// Symbols with a live stream, sorted.
  pub fn active_symbols(&self) -> Vec<String> {
    let mut symbols: Vec<_> = self.streams.lock().keys().cloned().collect();
    symbols.sort();
    symbols
  }

  /// Registered subscribers of `symbol` (0 if not live).
  pub fn subscriber_count(&self, symbol: &str) -> usize {
    self
      .streams
      .lock()
      .get(symbol)
      .map_or(0, |s| s.subscriber_count())
  }

  /// Stream handle for `symbol`, if live.
  pub fn stream(&self, symbol: &str) -> Option<Arc<SymbolStream>> {
    self.streams.lock().get(symbol).cloned()
  }
}

impl Drop for PriceRouter {
  fn drop(&mut self) {
    self.shutdown.cancel();
  }
}
