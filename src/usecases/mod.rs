//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces.
//!
//! Use cases:
//! - `SymbolStream`: one upstream session per symbol with failover and fan-out
//! - `PriceRouter`: deduplicated subscriptions keyed by symbol
//! - `AlertEngine`: reconcile subscriptions, detect crossings, notify

pub mod alert_engine;
pub mod price_router;
pub mod symbol_stream;

pub use alert_engine::{AlertEngine, EngineSettings};
pub use price_router::PriceRouter;
pub use symbol_stream::{FanOut, StreamSettings, Subscription, SymbolStream};
