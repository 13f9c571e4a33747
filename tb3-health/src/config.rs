//! Configuration loading
//!
//! YAML file resolved from `--config`, then `TB3_HEALTH_CONFIG`, then
//! `config/system_config.yaml`. A missing file yields the defaults.
//! String values written as `${VAR}` are replaced from the environment.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

pub const CONFIG_ENV: &str = "TB3_HEALTH_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/system_config.yaml";
/// Upper bound for every seconds-valued setting (one year)
pub const MAX_SECONDS: f64 = 365.0 * 24.0 * 3600.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tb3Config {
    pub system: SystemConf,
    pub health_monitor: MonitorConf,
    pub mqtt: Option<MqttConf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConf {
    pub name: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConf {
    /// Seconds between poll ticks
    pub check_interval: f64,
    pub battery_low_threshold: f64,
    pub battery_critical_threshold: f64,
    pub enable_alerts: bool,
    pub save_history: bool,
    pub history_capacity: usize,
    /// Seconds before the same alert may fire again
    pub alert_cooldown: u64,
    pub cooldown_capacity: usize,
    /// Seconds `stop()` waits for the poll task
    pub shutdown_timeout: f64,
    /// Seconds allowed per ROS CLI call
    pub command_timeout: f64,
    /// ROS CLI invocation, split like a shell would (ex: "docker exec tb3 ros2")
    pub ros_command: String,
    /// Sensor name -> topic
    pub sensors: BTreeMap<String, String>,
    pub motors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
}

impl Default for SystemConf {
    fn default() -> Self {
        Self {
            name: "TurtleBot3 Smart Automation".into(),
            log_level: "info".into(),
        }
    }
}

impl Default for MonitorConf {
    fn default() -> Self {
        let sensors = [
            ("lidar", "/scan"),
            ("imu", "/imu"),
            ("camera", "/camera/image_raw"),
            ("odometry", "/odom"),
        ]
        .into_iter()
        .map(|(name, topic)| (name.to_string(), topic.to_string()))
        .collect();

        Self {
            check_interval: 5.0,
            battery_low_threshold: 20.0,
            battery_critical_threshold: 10.0,
            enable_alerts: true,
            save_history: true,
            history_capacity: 1000,
            alert_cooldown: 300,
            cooldown_capacity: 256,
            shutdown_timeout: 5.0,
            command_timeout: 3.0,
            ros_command: "ros2".into(),
            sensors,
            motors: vec!["left".into(), "right".into()],
        }
    }
}

impl MonitorConf {
    pub fn interval(&self) -> Duration {
        seconds(self.check_interval)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.alert_cooldown)
    }

    pub fn shutdown_wait(&self) -> Duration {
        seconds(self.shutdown_timeout)
    }

    pub fn command_wait(&self) -> Duration {
        seconds(self.command_timeout)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |name: &str, v: f64| {
            if v > 0.0 && v <= MAX_SECONDS {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must be within (0, {MAX_SECONDS}] seconds, got {v}")))
            }
        };
        positive("check_interval", self.check_interval)?;
        positive("shutdown_timeout", self.shutdown_timeout)?;
        positive("command_timeout", self.command_timeout)?;

        let low = self.battery_low_threshold;
        let critical = self.battery_critical_threshold;
        if !(0.0..=100.0).contains(&low) || !(0.0..=100.0).contains(&critical) {
            return Err(ConfigError::Invalid("battery thresholds must be within 0..=100".into()));
        }
        if critical >= low {
            return Err(ConfigError::Invalid(format!(
                "battery_critical_threshold ({critical}) must be below battery_low_threshold ({low})"
            )));
        }
        if self.history_capacity == 0 || self.cooldown_capacity == 0 {
            return Err(ConfigError::Invalid("capacities must be non-zero".into()));
        }
        if shell_words::split(&self.ros_command).map_or(true, |w| w.is_empty()) {
            return Err(ConfigError::Invalid(format!("unusable ros_command: {:?}", self.ros_command)));
        }
        Ok(())
    }
}

/// Unvalidated values are clamped instead of panicking; NaN reads as zero
fn seconds(v: f64) -> Duration {
    if v > 0.0 {
        Duration::from_secs_f64(v.min(MAX_SECONDS))
    } else {
        Duration::ZERO
    }
}

impl Tb3Config {
    /// Parse YAML text, substituting `${VAR}` values first
    pub fn from_yaml_str(txt: &str) -> Result<Self, ConfigError> {
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: Value = serde_yaml::from_str(txt)?;
        let config: Tb3Config = serde_yaml::from_value(substitute_env(raw))?;
        config.health_monitor.validate()?;
        Ok(config)
    }
}

/// Resolve which file to read
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(p) => p.to_path_buf(),
        None => std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
    }
}

pub async fn load_config(explicit: Option<&Path>) -> Result<Tb3Config, ConfigError> {
    let path = config_path(explicit);
    if !path.exists() {
        warn!("No configuration at {}, using defaults", path.display());
        return Ok(Tb3Config::default());
    }

    let txt = fs::read_to_string(&path).await.map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config = Tb3Config::from_yaml_str(&txt)?;
    info!("Configuration loaded from {}", path.display());
    Ok(config)
}

fn substitute_env(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| (k, substitute_env(v)))
                .collect(),
        ),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(substitute_env).collect()),
        Value::String(s) => {
            let Some(name) = s.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) else {
                return Value::String(s);
            };
            match std::env::var(name) {
                // Re-read as a YAML scalar so numbers and booleans keep their type
                Ok(resolved) => serde_yaml::from_str::<Value>(&resolved)
                    .ok()
                    .filter(|v| !matches!(v, Value::Mapping(_) | Value::Sequence(_) | Value::Null))
                    .unwrap_or(Value::String(resolved)),
                Err(_) => Value::String(s),
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Tb3Config::default();
        let monitor = &config.health_monitor;
        assert_eq!(monitor.interval(), Duration::from_secs(5));
        assert_eq!(monitor.cooldown(), Duration::from_secs(300));
        assert_eq!(monitor.history_capacity, 1000);
        assert_eq!(monitor.sensors.get("lidar").map(String::as_str), Some("/scan"));
        assert_eq!(monitor.motors, vec!["left".to_string(), "right".to_string()]);
        assert!(config.mqtt.is_none());
        monitor.validate().unwrap();
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let txt = "health_monitor:\n  check_interval: 1.5\n  save_history: false\n";
        let config = Tb3Config::from_yaml_str(txt).unwrap();
        assert_eq!(config.health_monitor.check_interval, 1.5);
        assert!(!config.health_monitor.save_history);
        assert_eq!(config.health_monitor.battery_low_threshold, 20.0);
        assert_eq!(config.system.log_level, "info");
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("TB3_TEST_MQTT_HOST", "broker.lan");
        std::env::set_var("TB3_TEST_MQTT_PORT", "1884");
        let txt = "mqtt:\n  host: ${TB3_TEST_MQTT_HOST}\n  port: ${TB3_TEST_MQTT_PORT}\nsystem:\n  name: ${TB3_TEST_UNSET_VAR}\n";
        let config = Tb3Config::from_yaml_str(txt).unwrap();
        let mqtt = config.mqtt.unwrap();
        assert_eq!(mqtt.host, "broker.lan");
        assert_eq!(mqtt.port, 1884);
        assert_eq!(config.system.name, "${TB3_TEST_UNSET_VAR}");
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let txt = "health_monitor:\n  battery_low_threshold: 10\n  battery_critical_threshold: 20\n";
        assert!(matches!(Tb3Config::from_yaml_str(txt), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let txt = "health_monitor:\n  check_interval: 0\n";
        assert!(matches!(Tb3Config::from_yaml_str(txt), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_huge_interval() {
        for field in ["check_interval", "shutdown_timeout", "command_timeout"] {
            for value in ["1e20", "1e12", ".nan", ".inf"] {
                let txt = format!("health_monitor:\n  {field}: {value}\n");
                assert!(matches!(Tb3Config::from_yaml_str(&txt), Err(ConfigError::Invalid(_))), "{field}: {value}");
            }
        }

        // Accessors on an unvalidated config do not panic
        let monitor = MonitorConf { check_interval: 1e20, shutdown_timeout: f64::NAN, ..MonitorConf::default() };
        assert_eq!(monitor.interval(), Duration::from_secs(365 * 24 * 3600));
        assert_eq!(monitor.shutdown_wait(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.yaml"))).await.unwrap();
        assert_eq!(config.health_monitor.alert_cooldown, 300);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system_config.yaml");
        std::fs::write(&path, "health_monitor:\n  motors: [left]\n  ros_command: \"docker exec tb3 ros2\"\n").unwrap();
        let config = load_config(Some(&path)).await.unwrap();
        assert_eq!(config.health_monitor.motors, vec!["left".to_string()]);
        assert_eq!(config.health_monitor.ros_command, "docker exec tb3 ros2");
    }
}
