//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (WebSockets, HTTP clients, file I/O). Each
//! sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `feeds`: Binance WebSocket ticker stream and REST ticker polling
//! - `metrics`: Prometheus metrics export and health checks
//! - `notify`: log and Telegram alert sinks
//! - `persistence`: JSON snapshot files for alerts and baselines

pub mod feeds;
pub mod metrics;
pub mod notify;
pub mod persistence;
