//! Symbol Stream - One Upstream Session per Symbol, Fanned Out
//!
//! Owns the feed lifecycle for a single symbol:
//! 1. Stream from the primary (WebSocket) feed
//! 2. On failure, poll the fallback (REST) feed immediately
//! 3. After the retry cooldown, pause polling and retry the primary
//! 4. Repeat until stopped
//!
//! Every sample, whichever feed produced it, is offered to all
//! registered subscribers with a non-blocking enqueue. A full queue
//! drops that sample for that subscriber only.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::config::FeedsConfig;
use crate::domain::price::{FeedMode, PriceSample, Update};
use crate::ports::price_feed::{FeedError, PollingFeed, StreamingFeed};

/// Timing and capacity knobs shared by all symbol streams.
#[derive(Debug, Clone)]
pub struct StreamSettings {
  /// Fallback polling interval.
  pub poll_interval: Duration,
  /// Time spent on fallback before the primary is retried.
  pub retry_cooldown: Duration,
  /// Queue capacity of each subscription.
  pub subscriber_capacity: usize,
  /// Buffer between a feed session and the fan-out.
  pub sample_buffer: usize,
}

impl Default for StreamSettings {
  fn default() -> Self {
    Self {
      poll_interval: Duration::from_secs(10),
      retry_cooldown: Duration::from_secs(30),
      subscriber_capacity: 16,
      sample_buffer: 8,
    }
  }
}

impl From<&FeedsConfig> for StreamSettings {
  fn from(config: &FeedsConfig) -> Self {
    Self {
      poll_interval: config.poll_interval(),
      retry_cooldown: config.retry_cooldown(),
      subscriber_capacity: config.subscriber_capacity,
      sample_buffer: config.sample_buffer,
    }
  }
}

/// One consumer's private, bounded view of a symbol's updates.
///
/// Dropping it unregisters the consumer on the next fan-out.
#[derive(Debug)]
pub struct Subscription {
  symbol: String,
  rx: mpsc::Receiver<Update>,
}

impl Subscription {
  /// A subscription with no stream behind it. It yields nothing and
  /// reports `Disconnected` right away.
  pub(crate) fn disconnected(symbol: &str) -> Self {
    let (_, rx) = mpsc::channel(1);
    Self {
      symbol: symbol.to_string(),
      rx,
    }
  }

  /// Symbol this subscription delivers.
  pub fn symbol(&self) -> &str {
    &self.symbol
  }

  /// Take the next queued update without waiting.
  ///
  /// `Disconnected` means the stream was stopped and everything it
  /// queued has been read.
  pub fn try_recv(&mut self) -> Result<Update, TryRecvError> {
    self.rx.try_recv()
  }

  /// Wait for the next update. `None` once the stream is stopped.
  pub async fn recv(&mut self) -> Option<Update> {
    self.rx.recv().await
  }
}

/// Result of offering one sample to every subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
  /// Subscribers that accepted the update.
  pub delivered: usize,
  /// Subscribers whose queue was full.
  pub dropped: usize,
  /// Subscribers found gone and removed.
  pub pruned: usize,
}

/// Live state of one symbol's feed.
pub struct SymbolStream {
  symbol: String,
  subscribers: Mutex<Vec<mpsc::Sender<Update>>>,
  mode_tx: watch::Sender<FeedMode>,
  cancel: CancellationToken,
  metrics: Option<Arc<MetricsRegistry>>,
}

impl SymbolStream {
  /// Create the stream and spawn its feed task.
  ///
  /// Must be called from within a tokio runtime.
  pub fn spawn(
    symbol: &str,
    primary: Arc<dyn StreamingFeed>,
    fallback: Arc<dyn PollingFeed>,
    settings: StreamSettings,
    cancel: CancellationToken,
    metrics: Option<Arc<MetricsRegistry>>,
  ) -> Arc<Self> {
    let (mode_tx, _) = watch::channel(FeedMode::Primary);
    let stream = Arc::new(Self {
      symbol: symbol.to_string(),
      subscribers: Mutex::new(Vec::new()),
      mode_tx,
      cancel,
      metrics,
    });

    if let Some(metrics) = &stream.metrics {
      metrics.record_mode(symbol, FeedMode::Primary);
    }

    tokio::spawn(Arc::clone(&stream).run(primary, fallback, settings));
    stream
  }

  pub fn symbol(&self) -> &str {
    &self.symbol
  }

  /// Current feed mode.
  pub fn mode(&self) -> FeedMode {
    *self.mode_tx.borrow()
  }

  /// Receiver that observes every mode transition.
  pub fn watch_mode(&self) -> watch::Receiver<FeedMode> {
    self.mode_tx.subscribe()
  }

  pub fn subscriber_count(&self) -> usize {
    self.subscribers.lock().len()
  }

  pub fn is_stopped(&self) -> bool {
    self.cancel.is_cancelled()
  }

  /// Register a new subscriber with a queue of `capacity` updates.
  /// A stopped stream hands out a disconnected subscription.
  pub fn subscribe(&self, capacity: usize) -> Subscription {
    let mut subscribers = self.subscribers.lock();
    if self.is_stopped() {
      return Subscription::disconnected(&self.symbol);
    }
    let (tx, rx) = mpsc::channel(capacity.max(1));
    subscribers.push(tx);
    Subscription {
      symbol: self.symbol.clone(),
      rx,
    }
  }

  /// Offer `update` to every subscriber without blocking.
  pub fn fan_out(&self, update: &Update) -> FanOut {
    let mut result = FanOut::default();
    {
      let mut subscribers = self.subscribers.lock();
      subscribers.retain(|tx| match tx.try_send(update.clone()) {
        Ok(()) => {
          result.delivered += 1;
          true
        }
        Err(TrySendError::Full(_)) => {
          result.dropped += 1;
          true
        }
        Err(TrySendError::Closed(_)) => {
          result.pruned += 1;
          false
        }
      });
    }

    if result.dropped > 0 {
      trace!(symbol = %self.symbol, dropped = result.dropped, "Subscriber queue full, sample dropped");
      if let Some(metrics) = &self.metrics {
        for _ in 0..result.dropped {
          metrics.record_drop(&self.symbol);
        }
      }
    }
    if result.pruned > 0 {
      debug!(symbol = %self.symbol, pruned = result.pruned, "Removed dropped subscriptions");
    }
    result
  }

  /// Stop the feed and release all subscriber queues.
  ///
  /// Subscribers can still read what was already queued, after which
  /// their `try_recv` reports `Disconnected`.
  pub fn stop(&self) {
    self.cancel.cancel();
    self.subscribers.lock().clear();
  }

  fn set_mode(&self, mode: FeedMode) {
    let changed = self.mode_tx.send_if_modified(|current| {
      if *current == mode {
        false
      } else {
        *current = mode;
        true
      }
    });
    if changed {
      info!(symbol = %self.symbol, %mode, "Feed mode changed");
      if let Some(metrics) = &self.metrics {
        metrics.record_mode(&self.symbol, mode);
      }
    }
  }

  fn deliver(&self, sample: &PriceSample, from_primary: bool) {
    if from_primary && self.mode() == FeedMode::RetryingPrimary {
      self.set_mode(FeedMode::Primary);
    }
    if let Some(metrics) = &self.metrics {
      metrics.record_sample(&self.symbol);
    }
    self.fan_out(sample);
  }

  /// Feed task: primary → fallback → retry primary, until cancelled.
  #[instrument(skip_all, fields(symbol = %self.symbol))]
  async fn run(
    self: Arc<Self>,
    primary: Arc<dyn StreamingFeed>,
    fallback: Arc<dyn PollingFeed>,
    settings: StreamSettings,
  ) {
    let (tx, mut rx) = mpsc::channel::<PriceSample>(settings.sample_buffer.max(1));
    info!(primary = primary.name(), fallback = fallback.name(), "Symbol stream started");

    loop {
      let session = primary.stream(&self.symbol, &tx, &self.cancel);
      let Some(outcome) = self.drive(session, &mut rx, true).await else {
        break;
      };

      match outcome {
        Ok(()) if self.cancel.is_cancelled() => break,
        Ok(()) => warn!(source = primary.name(), "Primary feed ended, switching to fallback"),
        Err(FeedError::Downstream) => break,
        Err(e) => warn!(source = primary.name(), error = %e, "Primary feed failed, switching to fallback"),
      }
      if let Some(metrics) = &self.metrics {
        metrics.record_primary_failure(&self.symbol);
      }

      self.set_mode(FeedMode::Fallback);
      let polling = async {
        tokio::select! {
          () = fallback.poll(&self.symbol, settings.poll_interval, &tx, &self.cancel) => false,
          () = tokio::time::sleep(settings.retry_cooldown) => true,
        }
      };
      match self.drive(polling, &mut rx, false).await {
        Some(true) => {
          info!(cooldown_secs = settings.retry_cooldown.as_secs(), "Retrying primary feed");
          self.set_mode(FeedMode::RetryingPrimary);
        }
        Some(false) | None => break,
      }
    }

    self.set_mode(FeedMode::Stopped);
    info!("Symbol stream stopped");
  }

  /// Run one feed session while fanning out whatever it produces.
  ///
  /// Returns `None` if the stream was cancelled first. Samples still
  /// buffered when the session ends are delivered before returning, so
  /// nothing from a previous session leaks into the next one.
  async fn drive<T>(
    &self,
    session: impl Future<Output = T>,
    rx: &mut mpsc::Receiver<PriceSample>,
    from_primary: bool,
  ) -> Option<T> {
    tokio::pin!(session);

    let outcome = loop {
      tokio::select! {
        biased;
        () = self.cancel.cancelled() => return None,
        Some(sample) = rx.recv() => self.deliver(&sample, from_primary),
        outcome = &mut session => break outcome,
      }
    };

    while let Ok(sample) = rx.try_recv() {
      self.deliver(&sample, from_primary);
    }
    Some(outcome)
  }
}

impl Drop for SymbolStream {
  fn drop(&mut self) {
    self.cancel.cancel();
  }
}
