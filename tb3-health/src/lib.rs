//! TurtleBot3 health poller
//!
//! Periodically samples the robot's power source, sensor topics, motors and
//! the host, scores the result and raises debounced alerts:
//! - `sources`: telemetry queries (ROS2 CLI, sysinfo)
//! - `score`: thresholds, alerts and the 0..=100 health score
//! - `alerts`: cooldown filter and automated responses
//! - `history`: bounded snapshot log and trends
//! - `poller`: the background poll task and its public operations
//! - `sinks`: where emitted alerts go (log, MQTT)
//! - `report`: text report and JSON exports

pub mod alerts;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod models;
pub mod poller;
pub mod report;
pub mod score;
pub mod sinks;
pub mod sources;
pub mod state;

pub use alerts::{AlertFilter, AlertResponse, Decision};
pub use config::{load_config, Tb3Config};
pub use error::{ConfigError, HealthError, SourceError};
pub use history::{History, Trends};
pub use logging::{apply_log_level, init_logging};
pub use models::*;
pub use poller::{Diagnostics, HealthPoller, PollerSettings};
pub use score::{health_score, PowerThresholds};
pub use sinks::{AlertSink, FanoutSink, MqttSink, TracingSink};
pub use sources::{RobotSource, TelemetrySource};
