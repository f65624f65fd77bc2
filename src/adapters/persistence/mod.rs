//! Persistence Adapters - JSON File Storage
//!
//! Implements the repository ports with small JSON documents that are
//! replaced atomically on write. No database dependency.

pub mod alert_store;
pub mod baseline_store;
pub mod snapshot;

pub use alert_store::JsonAlertStore;
pub use baseline_store::JsonBaselineStore;
pub use snapshot::SnapshotFile;
