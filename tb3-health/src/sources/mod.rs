//! Telemetry sources for the health poller
//!
//! A source answers four queries, each allowed to fail on its own:
//! - power: battery level, voltage, current
//! - sensor: liveness and rate of one topic
//! - motors: temperature, current, rpm per motor
//! - host: CPU, memory, disk, network counters

pub mod host;
pub mod ros;

use crate::error::SourceError;
use crate::models::{HostMetrics, MotorReading, PowerSample, SensorReading};
use async_trait::async_trait;
use std::collections::BTreeMap;

pub use host::HostSampler;
pub use ros::RosCliSource;

#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn query_power(&self) -> Result<PowerSample, SourceError>;

    /// Status of the sensor publishing on `topic`
    async fn query_sensor(&self, name: &str, topic: &str) -> Result<SensorReading, SourceError>;

    async fn query_motors(&self) -> Result<BTreeMap<String, MotorReading>, SourceError>;

    async fn query_host(&self) -> Result<HostMetrics, SourceError>;
}

/// Robot telemetry from the ROS2 CLI plus host metrics from sysinfo
pub struct RobotSource {
    ros: RosCliSource,
    host: HostSampler,
}

impl RobotSource {
    pub fn new(ros: RosCliSource, host: HostSampler) -> Self {
        Self { ros, host }
    }
}

#[async_trait]
impl TelemetrySource for RobotSource {
    async fn query_power(&self) -> Result<PowerSample, SourceError> {
        self.ros.battery_state().await
    }

    async fn query_sensor(&self, name: &str, topic: &str) -> Result<SensorReading, SourceError> {
        self.ros.topic_rate(name, topic).await
    }

    async fn query_motors(&self) -> Result<BTreeMap<String, MotorReading>, SourceError> {
        self.ros.motor_diagnostics().await
    }

    async fn query_host(&self) -> Result<HostMetrics, SourceError> {
        self.host.sample().await
    }
}
