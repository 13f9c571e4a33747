//! Debounced alert filter
//!
//! An alert key is `(severity, message)`. A key that fired less than the
//! cooldown ago is suppressed; otherwise it is emitted and its timestamp
//! refreshed. The cooldown table is bounded: expired keys are pruned first,
//! then the key with the oldest timestamp is evicted.
//!
//! Elapsed time is measured on the monotonic clock, so wall-clock steps
//! neither extend nor cut short a cooldown.

use crate::models::{Alert, AlertSource, Severity};
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const DEFAULT_COOLDOWN_SECS: u64 = 300;
pub const DEFAULT_COOLDOWN_CAPACITY: usize = 256;

pub type AlertKey = (Severity, String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Emit,
    /// Same key fired within the cooldown window
    Suppressed,
}

/// Automated reaction attached to an emitted alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertResponse {
    /// Stop motors, save state, return to dock
    BatteryProtection,
    ReduceMotorSpeed,
    /// Fall back to redundant sensors or halt navigation
    SafeMode,
}

impl AlertResponse {
    pub fn for_alert(alert: &Alert) -> Option<Self> {
        match (alert.source, alert.severity) {
            (AlertSource::Power, Severity::Critical) => Some(Self::BatteryProtection),
            (AlertSource::Motor, _) => Some(Self::ReduceMotorSpeed),
            (AlertSource::Sensor, _) => Some(Self::SafeMode),
            _ => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::BatteryProtection => "Initiating battery protection mode",
            Self::ReduceMotorSpeed => "Reducing motor speed due to overheating",
            Self::SafeMode => "Sensor failure detected, entering safe mode",
        }
    }
}

#[derive(Debug)]
pub struct AlertFilter {
    cooldown: Duration,
    capacity: usize,
    last_fired: HashMap<AlertKey, Instant>,
}

impl AlertFilter {
    pub fn new(cooldown: Duration, capacity: usize) -> Self {
        Self {
            cooldown,
            capacity: capacity.max(1),
            last_fired: HashMap::new(),
        }
    }

    /// Decide whether `alert` goes out at `now`, recording it when it does
    pub fn check(&mut self, alert: &Alert, now: Instant) -> Decision {
        let key = (alert.severity, alert.message.clone());
        if let Some(last) = self.last_fired.get(&key) {
            if now.saturating_duration_since(*last) < self.cooldown {
                return Decision::Suppressed;
            }
        }

        if !self.last_fired.contains_key(&key) && self.last_fired.len() >= self.capacity {
            self.make_room(now);
        }
        self.last_fired.insert(key, now);
        Decision::Emit
    }

    /// Alerts from `alerts` that pass the filter, in order
    pub fn filter<'a>(&mut self, alerts: &'a [Alert], now: Instant) -> Vec<&'a Alert> {
        alerts
            .iter()
            .filter(|alert| self.check(alert, now) == Decision::Emit)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.last_fired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_fired.is_empty()
    }

    pub fn last_fired(&self, severity: Severity, message: &str) -> Option<Instant> {
        self.last_fired.get(&(severity, message.to_string())).copied()
    }

    fn make_room(&mut self, now: Instant) {
        let cooldown = self.cooldown;
        self.last_fired
            .retain(|_, fired| now.saturating_duration_since(*fired) < cooldown);

        if self.last_fired.len() >= self.capacity {
            let oldest = self
                .last_fired
                .iter()
                .min_by_key(|(_, fired)| **fired)
                .map(|(key, _)| key.clone());
            if let Some(key) = oldest {
                self.last_fired.remove(&key);
            }
        }
    }
}

impl Default for AlertFilter {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            DEFAULT_COOLDOWN_CAPACITY,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(base: Instant, secs: u64) -> Instant {
        base + Duration::from_secs(secs)
    }

    #[test]
    fn test_cooldown_window() {
        let t0 = Instant::now();
        let mut filter = AlertFilter::default();
        let alert = Alert::warning(AlertSource::Sensor, "Sensor lidar not publishing");

        assert_eq!(filter.check(&alert, t0), Decision::Emit);
        assert_eq!(filter.check(&alert, at(t0, 100)), Decision::Suppressed);
        assert_eq!(filter.last_fired(Severity::Warning, &alert.message), Some(t0));
        assert_eq!(filter.check(&alert, at(t0, 301)), Decision::Emit);
        assert_eq!(filter.last_fired(Severity::Warning, &alert.message), Some(at(t0, 301)));
        assert_eq!(filter.check(&alert, at(t0, 400)), Decision::Suppressed);
    }

    #[test]
    fn test_cooldown_boundary_emits() {
        let t0 = Instant::now();
        let mut filter = AlertFilter::default();
        let alert = Alert::critical(AlertSource::Power, "Battery critical: 5.0%");
        filter.check(&alert, t0);
        assert_eq!(filter.check(&alert, at(t0, 300)), Decision::Emit);
    }

    #[test]
    fn test_key_includes_severity() {
        let t0 = Instant::now();
        let mut filter = AlertFilter::default();
        let warning = Alert::warning(AlertSource::Host, "same text");
        let critical = Alert::critical(AlertSource::Host, "same text");
        assert_eq!(filter.check(&warning, t0), Decision::Emit);
        assert_eq!(filter.check(&critical, t0), Decision::Emit);
        assert_eq!(filter.len(), 2);
    }

    #[test]
    fn test_filter_keeps_order_and_drops_repeats() {
        let t0 = Instant::now();
        let mut filter = AlertFilter::default();
        let alerts = vec![
            Alert::warning(AlertSource::Sensor, "Sensor imu not publishing"),
            Alert::critical(AlertSource::Motor, "Motor left overheating: 75.0°C"),
        ];
        assert_eq!(filter.filter(&alerts, t0).len(), 2);
        assert!(filter.filter(&alerts, at(t0, 5)).is_empty());
    }

    #[test]
    fn test_table_stays_bounded() {
        let t0 = Instant::now();
        let mut filter = AlertFilter::new(Duration::from_secs(300), 4);
        for i in 0..20 {
            let alert = Alert::warning(AlertSource::Power, format!("Battery low: {i}.0%"));
            assert_eq!(filter.check(&alert, at(t0, i)), Decision::Emit);
            assert!(filter.len() <= 4);
        }
        // Oldest keys were evicted, the newest is still debounced
        assert!(filter.last_fired(Severity::Warning, "Battery low: 0.0%").is_none());
        let newest = Alert::warning(AlertSource::Power, "Battery low: 19.0%");
        assert_eq!(filter.check(&newest, at(t0, 20)), Decision::Suppressed);
    }

    #[test]
    fn test_expired_keys_pruned_before_eviction() {
        let t0 = Instant::now();
        let mut filter = AlertFilter::new(Duration::from_secs(10), 2);
        filter.check(&Alert::warning(AlertSource::Host, "a"), t0);
        filter.check(&Alert::warning(AlertSource::Host, "b"), at(t0, 8));
        filter.check(&Alert::warning(AlertSource::Host, "c"), at(t0, 12));
        assert!(filter.last_fired(Severity::Warning, "a").is_none());
        assert!(filter.last_fired(Severity::Warning, "b").is_some());
        assert!(filter.last_fired(Severity::Warning, "c").is_some());
    }

    #[test]
    fn test_earlier_instant_stays_suppressed() {
        let t0 = Instant::now() + Duration::from_secs(10);
        let mut filter = AlertFilter::default();
        let alert = Alert::warning(AlertSource::Host, "High memory usage: 95.0%");
        assert_eq!(filter.check(&alert, t0), Decision::Emit);
        // A reading taken before the last firing counts as zero elapsed
        assert_eq!(filter.check(&alert, t0 - Duration::from_secs(5)), Decision::Suppressed);
        assert_eq!(filter.check(&alert, at(t0, 300)), Decision::Emit);
    }

    #[test]
    fn test_responses() {
        let battery = Alert::critical(AlertSource::Power, "Battery critical: 3.0%");
        let low = Alert::warning(AlertSource::Power, "Battery low: 15.0%");
        let motor = Alert::critical(AlertSource::Motor, "Motor right overheating: 80.0°C");
        let sensor = Alert::warning(AlertSource::Sensor, "Sensor camera not publishing");
        let host = Alert::warning(AlertSource::Host, "High CPU usage: 99.0%");
        assert_eq!(AlertResponse::for_alert(&battery), Some(AlertResponse::BatteryProtection));
        assert_eq!(AlertResponse::for_alert(&low), None);
        assert_eq!(AlertResponse::for_alert(&motor), Some(AlertResponse::ReduceMotorSpeed));
        assert_eq!(AlertResponse::for_alert(&sensor), Some(AlertResponse::SafeMode));
        assert_eq!(AlertResponse::for_alert(&host), None);
    }
}
