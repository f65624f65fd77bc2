//! Market Data Feed Adapters - Upstream Price Sources
//!
//! Provides the two source kinds a symbol stream fails over between:
//! - Binance WebSocket: primary, one ticker stream per symbol
//! - Binance REST: fallback, polled while the stream is down

pub mod binance;
pub mod binance_rest;

pub use binance::BinanceStreamFeed;
pub use binance_rest::BinanceRestFeed;
