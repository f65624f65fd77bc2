//! Price samples, subscriber updates and feed modes.
//!
//! These are the values that flow from feed clients through a symbol
//! stream to subscribers. All of them are plain data: cheap to clone,
//! immutable once produced.

use std::fmt;

use serde::Serialize;

/// Trading symbol as used by the upstream venue (e.g. `BTCUSDT`).
pub type Symbol = String;

/// A single observed price for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSample {
    /// Symbol the price belongs to.
    pub symbol: Symbol,
    /// Observed last-trade price. Always positive and finite.
    pub price: f64,
}

impl PriceSample {
    /// Build a sample, rejecting prices that are not positive and finite.
    pub fn new(symbol: impl Into<Symbol>, price: f64) -> Option<Self> {
        is_valid_price(price).then(|| Self {
            symbol: symbol.into(),
            price,
        })
    }
}

/// Subscriber-facing delivery unit. Same shape as a [`PriceSample`].
pub type Update = PriceSample;

/// Returns true for prices a feed is allowed to emit.
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Outcome of parsing one upstream payload.
///
/// Venues interleave heartbeats, subscription acks and other non-price
/// frames with tickers; those come back as `Unparseable` and are skipped
/// by the caller rather than treated as a feed failure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickerFrame {
    /// Payload carried a usable price.
    Price(f64),
    /// Payload was not a price (or not valid JSON at all).
    Unparseable,
}

impl TickerFrame {
    /// Parse a decimal price string, validating it on the way.
    pub fn from_decimal_str(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(p) if is_valid_price(p) => Self::Price(p),
            _ => Self::Unparseable,
        }
    }
}

/// Which upstream source currently services a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedMode {
    /// Streaming feed is connected (or connecting for the first time).
    Primary,
    /// Streaming feed failed; polling feed is active.
    Fallback,
    /// Cooldown elapsed; streaming feed is being re-attempted.
    RetryingPrimary,
    /// Stream was shut down. Terminal.
    Stopped,
}

impl FeedMode {
    /// Numeric encoding for the Prometheus mode gauge.
    pub const fn as_gauge(self) -> f64 {
        match self {
            Self::Primary => 0.0,
            Self::Fallback => 1.0,
            Self::RetryingPrimary => 2.0,
            Self::Stopped => 3.0,
        }
    }
}

impl fmt::Display for FeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Fallback => write!(f, "fallback"),
            Self::RetryingPrimary => write!(f, "retrying_primary"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
