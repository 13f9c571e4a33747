//! Snapshot data model
//!
//! One `Snapshot` is built per poll tick and never mutated once published:
//! - Power source reading with derived status
//! - Sensor liveness per sensor name
//! - Motor telemetry per motor id
//! - Host resource usage
//! - Alerts raised while building it

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Power source status derived from the level thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerStatus {
    Good,
    Low,
    Critical,
    Unknown,
}

/// Battery reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerReading {
    pub level: f64,
    pub voltage: f64,
    pub current: f64,
    pub status: PowerStatus,
}

impl PowerReading {
    /// Reading used when the power source could not be queried
    pub fn unknown() -> Self {
        Self {
            level: 100.0,
            voltage: 0.0,
            current: 0.0,
            status: PowerStatus::Unknown,
        }
    }
}

/// Raw battery values as reported by a telemetry source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerSample {
    pub level: f64,
    pub voltage: f64,
    pub current: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorStatus {
    Active,
    Inactive,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub status: SensorStatus,
    /// Publishing rate in Hz, 0 when not publishing
    pub data_rate: f64,
}

impl SensorReading {
    pub fn active(data_rate: f64) -> Self {
        Self { status: SensorStatus::Active, data_rate }
    }

    pub fn inactive() -> Self {
        Self { status: SensorStatus::Inactive, data_rate: 0.0 }
    }

    pub fn unknown() -> Self {
        Self { status: SensorStatus::Unknown, data_rate: 0.0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorReading {
    /// Degrees Celsius
    pub temperature: f64,
    /// Amperes
    pub current: f64,
    pub rpm: i64,
}

/// Host resource usage, percentages in 0..=100
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostMetrics {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    /// Total bytes sent on all interfaces
    pub net_tx: u64,
    /// Total bytes received on all interfaces
    pub net_rx: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

/// Snapshot section that raised an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSource {
    Power,
    Sensor,
    Motor,
    Host,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Alert {
    pub severity: Severity,
    pub message: String,
    pub source: AlertSource,
}

impl Alert {
    pub fn warning(source: AlertSource, message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, message: message.into(), source }
    }

    pub fn critical(source: AlertSource, message: impl Into<String>) -> Self {
        Self { severity: Severity::Critical, message: message.into(), source }
    }
}

/// Point-in-time capture of every monitored subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub power: PowerReading,
    pub sensors: BTreeMap<String, SensorReading>,
    pub motors: BTreeMap<String, MotorReading>,
    pub host: HostMetrics,
    pub alerts: Vec<Alert>,
}

impl Snapshot {
    pub fn inactive_sensor_count(&self) -> usize {
        self.sensors
            .values()
            .filter(|s| s.status != SensorStatus::Active)
            .count()
    }

    pub fn has_critical_alert(&self) -> bool {
        self.alerts.iter().any(|a| a.severity == Severity::Critical)
    }
}
