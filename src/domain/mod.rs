//! Domain layer - Alert rules, price samples and crossing detection.
//!
//! Pure types and functions only: nothing in here touches the network,
//! the filesystem or the clock beyond stamping `created_at`.

pub mod alert;
pub mod crossing;
pub mod price;

pub use alert::{AlertError, AlertId, AlertRule, Direction};
pub use crossing::{alert_fires, crosses};
pub use price::{FeedMode, PriceSample, Symbol, TickerFrame, Update};
