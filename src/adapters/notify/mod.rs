//! Notification Adapters
//!
//! Concrete `Notifier` sinks:
//! - `LogNotifier`: structured tracing event per alert
//! - `TelegramNotifier`: Bot API `sendMessage`
//! - `EmailNotifier`: plain-text mail over SMTP

pub mod email;
pub mod logger;
pub mod telegram;

pub use email::{EmailNotifier, EmailSettings};
pub use logger::LogNotifier;
pub use telegram::TelegramNotifier;
