//! Health score and threshold evaluation
//!
//! Deductions from a perfect 100:
//! - power below critical: 30, else below low: 15
//! - each sensor not Active: 10
//! - each motor above 70°C: 20, else above 60°C: 10
//! - host CPU above 90%: 10, host memory above 90%: 10

use crate::models::{Alert, AlertSource, MotorReading, PowerReading, PowerSample, PowerStatus, Snapshot};

pub const MOTOR_OVERHEAT_C: f64 = 70.0;
pub const MOTOR_WARM_C: f64 = 60.0;
pub const HOST_LOAD_LIMIT: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerThresholds {
    pub low: f64,
    pub critical: f64,
}

impl Default for PowerThresholds {
    fn default() -> Self {
        Self { low: 20.0, critical: 10.0 }
    }
}

/// Deterministic score in 0..=100
pub fn health_score(snapshot: &Snapshot, thresholds: &PowerThresholds) -> f64 {
    let mut score = 100.0;

    let level = snapshot.power.level;
    if level < thresholds.critical {
        score -= 30.0;
    } else if level < thresholds.low {
        score -= 15.0;
    }

    score -= 10.0 * snapshot.inactive_sensor_count() as f64;

    for motor in snapshot.motors.values() {
        if motor.temperature > MOTOR_OVERHEAT_C {
            score -= 20.0;
        } else if motor.temperature > MOTOR_WARM_C {
            score -= 10.0;
        }
    }

    if snapshot.host.cpu_percent > HOST_LOAD_LIMIT {
        score -= 10.0;
    }
    if snapshot.host.memory_percent > HOST_LOAD_LIMIT {
        score -= 10.0;
    }

    f64::max(score, 0.0)
}

/// Derive the power status and its alert, if any
pub fn classify_power(sample: PowerSample, thresholds: &PowerThresholds) -> (PowerReading, Option<Alert>) {
    let level = sample.level;
    let (status, alert) = if level > thresholds.low {
        (PowerStatus::Good, None)
    } else if level > thresholds.critical {
        (
            PowerStatus::Low,
            Some(Alert::warning(AlertSource::Power, format!("Battery low: {level:.1}%"))),
        )
    } else {
        (
            PowerStatus::Critical,
            Some(Alert::critical(AlertSource::Power, format!("Battery critical: {level:.1}%"))),
        )
    };

    let reading = PowerReading {
        level,
        voltage: sample.voltage,
        current: sample.current,
        status,
    };
    (reading, alert)
}

pub fn motor_alert(id: &str, motor: &MotorReading) -> Option<Alert> {
    (motor.temperature > MOTOR_OVERHEAT_C).then(|| {
        Alert::critical(
            AlertSource::Motor,
            format!("Motor {id} overheating: {:.1}°C", motor.temperature),
        )
    })
}

pub fn sensor_alert(name: &str) -> Alert {
    Alert::warning(AlertSource::Sensor, format!("Sensor {name} not publishing"))
}

pub fn host_alerts(cpu_percent: f64, memory_percent: f64) -> Vec<Alert> {
    let mut alerts = Vec::new();
    if cpu_percent > HOST_LOAD_LIMIT {
        alerts.push(Alert::warning(AlertSource::Host, format!("High CPU usage: {cpu_percent:.1}%")));
    }
    if memory_percent > HOST_LOAD_LIMIT {
        alerts.push(Alert::warning(AlertSource::Host, format!("High memory usage: {memory_percent:.1}%")));
    }
    alerts
}
