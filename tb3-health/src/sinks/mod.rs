//! Alert sinks
//!
//! The poller pushes every emitted alert (with its automated response, if
//! any) and every published snapshot to a sink.

pub mod mqtt;

use crate::alerts::AlertResponse;
use crate::models::{Alert, Severity, Snapshot};
use std::sync::Arc;
use tracing::{error, warn};

pub use mqtt::MqttSink;

/// Called from inside a poll cycle, between its last await and the snapshot
/// being published.
///
/// Implementations must not block. `stop()` can only cancel a cycle at an
/// await point: a cycle stuck in `emit` outlives the shutdown timeout and,
/// once it returns, still publishes its snapshot after `stop()` gave up on
/// it. Queue the work (as `MqttSink` does with `try_publish`) instead.
pub trait AlertSink: Send + Sync {
    fn emit(&self, alert: &Alert, response: Option<AlertResponse>);

    /// Same non-blocking rule as `emit`
    fn publish_snapshot(&self, _snapshot: &Snapshot) {}
}

/// Logs alerts through tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AlertSink for TracingSink {
    fn emit(&self, alert: &Alert, response: Option<AlertResponse>) {
        match alert.severity {
            Severity::Critical => error!(source = ?alert.source, "🚨 {}", alert.message),
            Severity::Warning => warn!(source = ?alert.source, "⚠️  {}", alert.message),
        }

        match response {
            Some(AlertResponse::BatteryProtection) => error!("{}...", AlertResponse::BatteryProtection.describe()),
            Some(other) => warn!("{}...", other.describe()),
            None => {}
        }
    }
}

/// Forwards to every inner sink in order
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AlertSink for FanoutSink {
    fn emit(&self, alert: &Alert, response: Option<AlertResponse>) {
        for sink in &self.sinks {
            sink.emit(alert, response);
        }
    }

    fn publish_snapshot(&self, snapshot: &Snapshot) {
        for sink in &self.sinks {
            sink.publish_snapshot(snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlertSource;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Counting {
        alerts: Mutex<Vec<(String, Option<AlertResponse>)>>,
    }

    impl AlertSink for Counting {
        fn emit(&self, alert: &Alert, response: Option<AlertResponse>) {
            self.alerts.lock().push((alert.message.clone(), response));
        }
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = Arc::new(Counting::default());
        let b = Arc::new(Counting::default());
        let fanout = FanoutSink::new()
            .with(a.clone())
            .with(Arc::new(TracingSink))
            .with(b.clone());
        assert_eq!(fanout.len(), 3);

        let alert = Alert::critical(AlertSource::Motor, "Motor left overheating: 80.0°C");
        fanout.emit(&alert, AlertResponse::for_alert(&alert));

        for sink in [&a, &b] {
            let seen = sink.alerts.lock();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].1, Some(AlertResponse::ReduceMotorSpeed));
        }
    }
}
