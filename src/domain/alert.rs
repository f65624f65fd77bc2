//! Alert rules and their validation.
//!
//! An alert watches one symbol for a price crossing a threshold in a
//! given direction. Rules are owned by the alert store; the engine and
//! the crossing detector only ever read them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Alert identifier (UUID v4 rendered as a string).
pub type AlertId = String;

/// Direction of a threshold crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Price moves from below the threshold to at-or-above it.
    Up,
    /// Price moves from above the threshold to at-or-below it.
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::Down => write!(f, "DOWN"),
        }
    }
}

impl FromStr for Direction {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UP" => Ok(Self::Up),
            "DOWN" => Ok(Self::Down),
            other => Err(AlertError::InvalidDirection(other.to_string())),
        }
    }
}

/// Errors raised by alert validation and alert store lookups.
#[derive(Debug, Error, PartialEq)]
pub enum AlertError {
    #[error("symbol required")]
    EmptySymbol,

    #[error("symbol must be uppercase, e.g. BTCUSDT (got {0})")]
    LowercaseSymbol(String),

    #[error("threshold must be a positive finite number (got {0})")]
    InvalidThreshold(f64),

    #[error("direction must be UP or DOWN (got {0})")]
    InvalidDirection(String),

    #[error("alert {0} not found")]
    NotFound(AlertId),
}

/// A user-defined price alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Unique identifier.
    pub id: AlertId,
    /// Watched symbol, uppercase (e.g. `ETHUSDT`).
    pub symbol: String,
    /// Price level to watch.
    pub threshold: f64,
    /// Which way the price has to cross.
    pub direction: Direction,
    /// Disabled alerts are kept but never evaluated.
    pub enabled: bool,
    /// Creation time, used for newest-first listing.
    pub created_at: DateTime<Utc>,
}

impl AlertRule {
    /// Build a new enabled alert with a fresh id, validating the inputs.
    pub fn new(
        symbol: impl Into<String>,
        threshold: f64,
        direction: Direction,
    ) -> Result<Self, AlertError> {
        let rule = Self {
            id: Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            threshold,
            direction,
            enabled: true,
            created_at: Utc::now(),
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Check the invariants a stored alert must satisfy.
    pub fn validate(&self) -> Result<(), AlertError> {
        if self.symbol.is_empty() {
            return Err(AlertError::EmptySymbol);
        }
        if self.symbol.to_uppercase() != self.symbol {
            return Err(AlertError::LowercaseSymbol(self.symbol.clone()));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(AlertError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }

    /// True when this rule watches the same level as another one.
    pub fn same_trigger(&self, symbol: &str, threshold: f64, direction: Direction) -> bool {
        self.symbol == symbol
            && self.direction == direction
            && (self.threshold - threshold).abs() < f64::EPSILON
    }
}
