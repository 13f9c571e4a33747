/*!
Snapshot builder

Starts from a healthy robot (score 100) so each test only states what it
changes.
*/

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tb3_health::{
    Alert, HostMetrics, MotorReading, PowerReading, PowerStatus, SensorReading, Snapshot,
};

pub struct SnapshotBuilder {
    snapshot: Snapshot,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        let sensors = ["lidar", "imu", "camera", "odometry"]
            .into_iter()
            .map(|name| (name.to_string(), SensorReading::active(10.0)))
            .collect();

        let motors = ["left", "right"]
            .into_iter()
            .map(|id| (id.to_string(), MotorReading { temperature: 35.0, current: 0.2, rpm: 0 }))
            .collect();

        Self {
            snapshot: Snapshot {
                timestamp: Utc::now(),
                power: PowerReading { level: 90.0, voltage: 12.3, current: 0.4, status: PowerStatus::Good },
                sensors,
                motors,
                host: HostMetrics { cpu_percent: 15.0, memory_percent: 35.0, disk_percent: 50.0, net_tx: 0, net_rx: 0 },
                alerts: Vec::new(),
            },
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.snapshot.timestamp = timestamp;
        self
    }

    /// Sets the level only; the status is left to the caller
    pub fn power_level(mut self, level: f64) -> Self {
        self.snapshot.power.level = level;
        self
    }

    pub fn power(mut self, power: PowerReading) -> Self {
        self.snapshot.power = power;
        self
    }

    pub fn sensor(mut self, name: &str, reading: SensorReading) -> Self {
        self.snapshot.sensors.insert(name.to_string(), reading);
        self
    }

    pub fn motor_temperature(mut self, id: &str, temperature: f64) -> Self {
        self.snapshot
            .motors
            .entry(id.to_string())
            .or_default()
            .temperature = temperature;
        self
    }

    pub fn no_motors(mut self) -> Self {
        self.snapshot.motors = BTreeMap::new();
        self
    }

    pub fn host(mut self, cpu_percent: f64, memory_percent: f64) -> Self {
        self.snapshot.host.cpu_percent = cpu_percent;
        self.snapshot.host.memory_percent = memory_percent;
        self
    }

    pub fn alert(mut self, alert: Alert) -> Self {
        self.snapshot.alerts.push(alert);
        self
    }

    pub fn build(self) -> Snapshot {
        self.snapshot
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tb3_health::{health_score, PowerThresholds};

    #[test]
    fn test_default_snapshot_is_healthy() {
        let snapshot = SnapshotBuilder::new().build();
        assert_eq!(health_score(&snapshot, &PowerThresholds::default()), 100.0);
        assert_eq!(snapshot.inactive_sensor_count(), 0);
    }
}
