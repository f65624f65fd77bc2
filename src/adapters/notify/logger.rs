//! Log Notifier - Alerts as Structured Log Events

use async_trait::async_trait;
use tracing::info;

use crate::ports::notifier::{AlertEvent, Notifier, NotifyError};

/// Writes every alert as an `ALERT` event through tracing.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    enabled: bool,
}

impl LogNotifier {
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        info!(
            notifier = "log",
            alert_id = %event.alert_id,
            symbol = %event.symbol,
            price = event.price,
            threshold = event.threshold,
            direction = %event.direction,
            "ALERT"
        );
        Ok(())
    }
}
