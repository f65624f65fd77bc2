//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `StreamingFeed` / `PollingFeed`: upstream price sources
//! - `AlertSource` / `BaselineStore`: alert and last-price storage
//! - `Notifier`: outbound alert delivery

pub mod notifier;
pub mod price_feed;
pub mod repository;

pub use notifier::{AlertEvent, Notifier, NotifyError};
pub use price_feed::{FeedError, PollingFeed, StreamingFeed};
pub use repository::{AlertSource, BaselineStore};
