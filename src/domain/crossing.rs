//! Threshold crossing detection.
//!
//! Edge-triggered: a crossing fires on the sample that moves the price
//! across the threshold, not on every sample that sits beyond it. The
//! caller must pass the most recent baseline as `previous`.

use super::alert::{AlertRule, Direction};

/// Returns true if moving from `previous` to `current` crosses
/// `threshold` in `direction`.
///
/// A `previous` of zero means no baseline exists yet, so the first
/// sample for a symbol can never fire.
pub fn crosses(previous: f64, current: f64, threshold: f64, direction: Direction) -> bool {
    if previous == 0.0 {
        return false;
    }
    match direction {
        Direction::Up => previous < threshold && current >= threshold,
        Direction::Down => previous > threshold && current <= threshold,
    }
}

/// Convenience wrapper evaluating a stored alert.
pub fn alert_fires(previous: f64, current: f64, alert: &AlertRule) -> bool {
    alert.enabled && crosses(previous, current, alert.threshold, alert.direction)
}
