use crate::models::Snapshot;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Bounded, arrival-ordered snapshot log; the oldest entry is evicted first
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<Arc<Snapshot>>,
    capacity: usize,
}

/// Averages over a window of history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trends {
    pub samples: usize,
    pub avg_power_level: f64,
    pub avg_cpu_percent: f64,
    pub avg_memory_percent: f64,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
        }
    }

    pub fn push(&mut self, snapshot: Arc<Snapshot>) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Snapshot>> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<Arc<Snapshot>> {
        self.entries.iter().cloned().collect()
    }

    /// Entries taken within `window` of `now`
    pub fn since(&self, now: DateTime<Utc>, window: Duration) -> Vec<Arc<Snapshot>> {
        self.entries
            .iter()
            .filter(|s| now.signed_duration_since(s.timestamp) < window)
            .cloned()
            .collect()
    }

    pub fn trends(&self, now: DateTime<Utc>, window: Duration) -> Option<Trends> {
        trends_of(&self.since(now, window))
    }
}

pub fn trends_of(snapshots: &[Arc<Snapshot>]) -> Option<Trends> {
    if snapshots.is_empty() {
        return None;
    }
    let n = snapshots.len() as f64;
    let avg = |f: fn(&Snapshot) -> f64| snapshots.iter().map(|s| f(s)).sum::<f64>() / n;
    Some(Trends {
        samples: snapshots.len(),
        avg_power_level: avg(|s| s.power.level),
        avg_cpu_percent: avg(|s| s.host.cpu_percent),
        avg_memory_percent: avg(|s| s.host.memory_percent),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HostMetrics, PowerReading, PowerStatus};
    use std::collections::BTreeMap;

    fn snapshot_at(timestamp: DateTime<Utc>, level: f64) -> Arc<Snapshot> {
        Arc::new(Snapshot {
            timestamp,
            power: PowerReading { level, voltage: 12.0, current: 0.0, status: PowerStatus::Good },
            sensors: BTreeMap::new(),
            motors: BTreeMap::new(),
            host: HostMetrics { cpu_percent: level / 2.0, memory_percent: 10.0, ..HostMetrics::default() },
            alerts: Vec::new(),
        })
    }

    #[test]
    fn test_evicts_oldest_first() {
        let base = Utc::now();
        let mut history = History::new(3);
        for i in 0..5 {
            history.push(snapshot_at(base + Duration::seconds(i), i as f64));
        }
        let levels: Vec<f64> = history.iter().map(|s| s.power.level).collect();
        assert_eq!(levels, vec![2.0, 3.0, 4.0]);
        assert_eq!(history.capacity(), 3);
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let mut history = History::new(0);
        history.push(snapshot_at(Utc::now(), 1.0));
        history.push(snapshot_at(Utc::now(), 2.0));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_trends_over_last_hour() {
        let now = Utc::now();
        let mut history = History::new(10);
        history.push(snapshot_at(now - Duration::hours(2), 10.0));
        history.push(snapshot_at(now - Duration::minutes(30), 80.0));
        history.push(snapshot_at(now - Duration::minutes(5), 60.0));

        let trends = history.trends(now, Duration::hours(1)).unwrap();
        assert_eq!(trends.samples, 2);
        assert_eq!(trends.avg_power_level, 70.0);
        assert_eq!(trends.avg_cpu_percent, 35.0);
        assert_eq!(trends.avg_memory_percent, 10.0);

        assert!(History::new(4).trends(now, Duration::hours(1)).is_none());
    }
}
