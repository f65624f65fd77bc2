//! Price Feed Ports - Streaming and Polling Price Sources
//!
//! Two kinds of upstream sources service a symbol stream:
//! - `StreamingFeed`: a persistent low-latency session (WebSocket)
//! - `PollingFeed`: a request/response endpoint polled on an interval
//!
//! Both push `PriceSample`s into a channel owned by the symbol stream
//! and observe a cancellation token at every suspension point.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::price::PriceSample;

/// Ways an upstream price source can fail.
///
/// Only `Connect`, `Transport` and `Closed` terminate a streaming
/// session. `Request`, `Status` and `Parse` are soft failures of a
/// single poll and never stop the polling loop.
#[derive(Debug, Error)]
pub enum FeedError {
  #[error("failed to connect to {url}: {reason}")]
  Connect { url: String, reason: String },

  #[error("transport error: {0}")]
  Transport(String),

  #[error("upstream closed the stream")]
  Closed,

  #[error("request failed: {0}")]
  Request(String),

  #[error("upstream returned HTTP {0}")]
  Status(u16),

  #[error("response did not contain a usable price")]
  Parse,

  #[error("sample channel closed by the consumer")]
  Downstream,
}

/// A persistent streaming price source for one symbol per session.
#[async_trait]
pub trait StreamingFeed: Send + Sync + 'static {
  /// Short source label used in logs and metrics.
  fn name(&self) -> &'static str;

  /// Open one session and forward every parsed price into `out`.
  ///
  /// Non-price frames are skipped. Returns `Ok(())` only when `cancel`
  /// fires; any transport or protocol failure (including a clean close
  /// by the venue) returns an error. A session is not restartable, a
  /// new call opens a new connection.
  async fn stream(
    &self,
    symbol: &str,
    out: &mpsc::Sender<PriceSample>,
    cancel: &CancellationToken,
  ) -> Result<(), FeedError>;
}

/// A request/response price source used while streaming is down.
#[async_trait]
pub trait PollingFeed: Send + Sync + 'static {
  /// Short source label used in logs and metrics.
  fn name(&self) -> &'static str;

  /// Issue a single request for the current price of `symbol`.
  async fn fetch_price(&self, symbol: &str) -> Result<f64, FeedError>;

  /// Poll `symbol` every `interval` until cancelled.
  ///
  /// Failed or malformed responses are logged and skipped, so the loop
  /// stays alive through transient errors. Also returns if the consumer
  /// side of `out` has gone away.
  async fn poll(
    &self,
    symbol: &str,
    interval: Duration,
    out: &mpsc::Sender<PriceSample>,
    cancel: &CancellationToken,
  ) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        _ = ticker.tick() => {}
      }

      let fetched = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        fetched = self.fetch_price(symbol) => fetched,
      };

      let sample = match fetched.map(|price| PriceSample::new(symbol, price)) {
        Ok(Some(sample)) => sample,
        Ok(None) => {
          warn!(symbol, source = self.name(), "Poll returned an invalid price, skipping");
          continue;
        }
        Err(e) => {
          warn!(symbol, source = self.name(), error = %e, "Poll failed, will retry next tick");
          continue;
        }
      };

      tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        sent = out.send(sample) => {
          if sent.is_err() {
            debug!(symbol, "Sample channel closed, stopping poll loop");
            return;
          }
        }
      }
    }
  }
}
