/*!
Recording alert sink

Keeps every alert the poller emits, with its response, and every
snapshot it publishes, for assertions.
*/

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tb3_health::{Alert, AlertResponse, AlertSink, AlertSource, Snapshot};

#[derive(Debug, Clone)]
pub struct RecordedAlert {
    pub alert: Alert,
    pub response: Option<AlertResponse>,
    pub at: DateTime<Utc>,
}

#[derive(Default)]
pub struct RecordingSink {
    alerts: Mutex<Vec<RecordedAlert>>,
    snapshots: Mutex<Vec<Snapshot>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<RecordedAlert> {
        self.alerts.lock().clone()
    }

    /// Emitted messages in order
    pub fn messages(&self) -> Vec<String> {
        self.alerts.lock().iter().map(|r| r.alert.message.clone()).collect()
    }

    pub fn alerts_from(&self, source: AlertSource) -> Vec<RecordedAlert> {
        self.alerts
            .lock()
            .iter()
            .filter(|r| r.alert.source == source)
            .cloned()
            .collect()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.lock().len()
    }

    pub fn last_snapshot(&self) -> Option<Snapshot> {
        self.snapshots.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.alerts.lock().clear();
        self.snapshots.lock().clear();
    }
}

impl AlertSink for RecordingSink {
    fn emit(&self, alert: &Alert, response: Option<AlertResponse>) {
        tracing::debug!("[RECORD] {:?} {}", alert.severity, alert.message);
        self.alerts.lock().push(RecordedAlert {
            alert: alert.clone(),
            response,
            at: Utc::now(),
        });
    }

    fn publish_snapshot(&self, snapshot: &Snapshot) {
        self.snapshots.lock().push(snapshot.clone());
    }
}
