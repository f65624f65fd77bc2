//! Metrics and Monitoring Adapters
//!
//! Provides Prometheus metrics export and health check endpoints
//! (/live, /ready, /streams) via axum 0.7.

pub mod health;
pub mod prometheus;

pub use self::health::HealthState;
pub use self::prometheus::MetricsRegistry;
