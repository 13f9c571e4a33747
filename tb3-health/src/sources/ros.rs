//! ROS2 CLI telemetry
//!
//! Every query shells out to the ROS2 command line under a timeout:
//! - `topic echo /battery_state --once` for the power source
//! - `topic hz <topic>` for sensor liveness (read until a rate line or the window ends)
//! - `topic echo /diagnostics --once` for motor key/value diagnostics
//!
//! Echo output is YAML, parsed with serde_yaml. Children are killed on drop.

use crate::error::SourceError;
use crate::models::{MotorReading, PowerSample, SensorReading};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as AsyncCommand;
use tracing::debug;

pub const BATTERY_TOPIC: &str = "/battery_state";
pub const DIAGNOSTICS_TOPIC: &str = "/diagnostics";

#[derive(Debug, Clone)]
pub struct RosCliSource {
    program: String,
    base_args: Vec<String>,
    timeout: Duration,
    motors: Vec<String>,
}

impl RosCliSource {
    /// `ros_command` is split like a shell would, so wrappers such as
    /// `docker exec tb3 ros2` work
    pub fn new(ros_command: &str, timeout: Duration, motors: Vec<String>) -> Result<Self, SourceError> {
        let mut words = shell_words::split(ros_command)
            .map_err(|e| SourceError::Parse(format!("ros_command {ros_command:?}: {e}")))?;
        if words.is_empty() {
            return Err(SourceError::Parse("empty ros_command".into()));
        }
        let program = words.remove(0);
        Ok(Self {
            program,
            base_args: words,
            timeout,
            motors,
        })
    }

    pub async fn battery_state(&self) -> Result<PowerSample, SourceError> {
        let stdout = self.run(&["topic", "echo", BATTERY_TOPIC, "--once"]).await?;
        parse_battery_state(&stdout)
    }

    /// Active with its rate when `topic hz` reports one inside the timeout,
    /// Inactive otherwise
    pub async fn topic_rate(&self, name: &str, topic: &str) -> Result<SensorReading, SourceError> {
        let args = ["topic", "hz", topic, "--window", "10"];
        let command = self.describe(&args);
        debug!("Checking sensor {} with `{}`", name, command);

        let mut child = AsyncCommand::new(&self.program)
            .args(&self.base_args)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SourceError::Spawn { command: command.clone(), source })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::NoData(format!("no stdout from `{command}`")))?;
        let mut lines = BufReader::new(stdout).lines();

        let scan = async {
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(rate) = parse_average_rate(&line) {
                    return Some(rate);
                }
            }
            None
        };
        let rate = tokio::time::timeout(self.timeout, scan).await.ok().flatten();
        let _ = child.start_kill();

        Ok(match rate {
            Some(rate) => SensorReading::active(rate),
            None => SensorReading::inactive(),
        })
    }

    pub async fn motor_diagnostics(&self) -> Result<BTreeMap<String, MotorReading>, SourceError> {
        let stdout = self.run(&["topic", "echo", DIAGNOSTICS_TOPIC, "--once"]).await?;
        parse_motor_diagnostics(&stdout, &self.motors)
    }

    async fn run(&self, args: &[&str]) -> Result<String, SourceError> {
        let command = self.describe(args);
        debug!("Executing `{}` (timeout: {:?})", command, self.timeout);

        let output = tokio::time::timeout(
            self.timeout,
            AsyncCommand::new(&self.program)
                .args(&self.base_args)
                .args(args)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| SourceError::Timeout { command: command.clone(), timeout: self.timeout })?
        .map_err(|source| SourceError::Spawn { command: command.clone(), source })?;

        if !output.status.success() {
            return Err(SourceError::CommandFailed {
                command,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() {
            return Err(SourceError::NoData(format!("`{command}` printed nothing")));
        }
        Ok(stdout)
    }

    fn describe(&self, args: &[&str]) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.base_args.iter().map(String::as_str))
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// First YAML document of a `topic echo` dump
fn first_document(stdout: &str) -> Result<Value, SourceError> {
    let doc = serde_yaml::Deserializer::from_str(stdout)
        .next()
        .ok_or_else(|| SourceError::NoData("empty echo output".into()))?;
    Value::deserialize(doc).map_err(|e| SourceError::Parse(e.to_string()))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `sensor_msgs/BatteryState`; a percentage within 0..=1 is scaled to 0..=100
pub fn parse_battery_state(stdout: &str) -> Result<PowerSample, SourceError> {
    let doc = first_document(stdout)?;
    let level = doc
        .get("percentage")
        .and_then(as_number)
        .filter(|v| v.is_finite())
        .ok_or_else(|| SourceError::Parse("battery_state has no usable percentage".into()))?;
    let level = if (0.0..=1.0).contains(&level) { level * 100.0 } else { level };

    let field = |name: &str| doc.get(name).and_then(as_number).filter(|v| v.is_finite()).unwrap_or(0.0);
    Ok(PowerSample {
        level: level.clamp(0.0, 100.0),
        voltage: field("voltage"),
        current: field("current"),
    })
}

/// Rate from a `topic hz` line such as `average rate: 10.012`
pub fn parse_average_rate(line: &str) -> Option<f64> {
    let rest = line.trim().strip_prefix("average rate:")?;
    rest.split_whitespace().next()?.parse().ok()
}

/// Collect `<motor>_motor_<field>` / `<motor>_<field>` diagnostic values
/// for fields temperature, current and rpm
pub fn parse_motor_diagnostics(
    stdout: &str,
    motors: &[String],
) -> Result<BTreeMap<String, MotorReading>, SourceError> {
    let doc = first_document(stdout)?;
    let statuses = doc
        .get("status")
        .and_then(Value::as_sequence)
        .ok_or_else(|| SourceError::Parse("diagnostics has no status list".into()))?;

    let pairs = statuses
        .iter()
        .filter_map(|status| status.get("values").and_then(Value::as_sequence))
        .flatten()
        .filter_map(|kv| {
            let key = kv.get("key")?.as_str()?;
            let value = as_number(kv.get("value")?)?;
            Some((key.to_ascii_lowercase(), value))
        });

    let mut readings: BTreeMap<String, MotorReading> = BTreeMap::new();
    for (key, value) in pairs {
        for motor in motors {
            let Some(field) = key
                .strip_prefix(&format!("{motor}_motor_"))
                .or_else(|| key.strip_prefix(&format!("{motor}_")))
            else {
                continue;
            };
            if !matches!(field, "temperature" | "current" | "rpm") {
                continue;
            }
            let reading = readings.entry(motor.clone()).or_default();
            match field {
                "temperature" => reading.temperature = value,
                "current" => reading.current = value,
                _ => reading.rpm = value.round() as i64,
            }
        }
    }

    if readings.is_empty() {
        return Err(SourceError::NoData("no motor values in diagnostics".into()));
    }
    Ok(readings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SensorStatus;

    const BATTERY_ECHO: &str = "header:
  stamp:
    sec: 1733900000
    nanosec: 0
  frame_id: ''
voltage: 11.9
temperature: .nan
current: -0.42
percentage: 0.87
power_supply_status: 2
present: true
---
";

    const DIAGNOSTICS_ECHO: &str = "header:
  stamp:
    sec: 1733900000
    nanosec: 0
  frame_id: ''
status:
- level: \"\\0\"
  name: 'turtlebot3_node: motors'
  message: OK
  hardware_id: ''
  values:
  - key: left_motor_temperature
    value: '41.5'
  - key: left_motor_current
    value: '0.8'
  - key: right_temperature
    value: '72.0'
  - key: right_rpm
    value: '55.4'
  - key: firmware
    value: '1.2.6'
---
";

    #[test]
    fn test_parse_battery_state() {
        let sample = parse_battery_state(BATTERY_ECHO).unwrap();
        assert!((sample.level - 87.0).abs() < 1e-9);
        assert_eq!(sample.voltage, 11.9);
        assert_eq!(sample.current, -0.42);
    }

    #[test]
    fn test_parse_battery_percent_scale() {
        let sample = parse_battery_state("percentage: 55.0\nvoltage: 12.0\n").unwrap();
        assert_eq!(sample.level, 55.0);
        assert_eq!(sample.current, 0.0);
    }

    #[test]
    fn test_parse_battery_rejects_nan() {
        assert!(matches!(parse_battery_state("percentage: .nan\n"), Err(SourceError::Parse(_))));
        assert!(parse_battery_state("").is_err());
    }

    #[test]
    fn test_parse_average_rate() {
        assert_eq!(parse_average_rate("average rate: 10.012"), Some(10.012));
        assert_eq!(parse_average_rate("  average rate: 5.000 "), Some(5.0));
        assert_eq!(parse_average_rate("\tmin: 0.099s max: 0.101s std dev: 0.00050s window: 10"), None);
        assert_eq!(parse_average_rate("WARNING: topic [/scan] does not appear to be published yet"), None);
    }

    #[test]
    fn test_parse_motor_diagnostics() {
        let motors = vec!["left".to_string(), "right".to_string()];
        let readings = parse_motor_diagnostics(DIAGNOSTICS_ECHO, &motors).unwrap();
        assert_eq!(readings["left"].temperature, 41.5);
        assert_eq!(readings["left"].current, 0.8);
        assert_eq!(readings["right"].temperature, 72.0);
        assert_eq!(readings["right"].rpm, 55);
    }

    #[test]
    fn test_parse_motor_diagnostics_without_motor_keys() {
        let motors = vec!["rear".to_string()];
        assert!(matches!(
            parse_motor_diagnostics(DIAGNOSTICS_ECHO, &motors),
            Err(SourceError::NoData(_))
        ));
    }

    #[test]
    fn test_rejects_empty_command() {
        assert!(RosCliSource::new("   ", Duration::from_secs(1), vec![]).is_err());
        assert!(RosCliSource::new("ros2 'unterminated", Duration::from_secs(1), vec![]).is_err());
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let source = RosCliSource::new("tb3-health-no-such-binary", Duration::from_secs(1), vec![]).unwrap();
        assert!(matches!(source.battery_state().await, Err(SourceError::Spawn { .. })));
        assert!(source.topic_rate("lidar", "/scan").await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_battery_through_wrapper_command() {
        let script = r#"sh -c 'printf "percentage: 0.5\nvoltage: 11.1\ncurrent: 0.2\n---\n"'"#;
        let source = RosCliSource::new(script, Duration::from_secs(5), vec![]).unwrap();
        let sample = source.battery_state().await.unwrap();
        assert_eq!(sample.level, 50.0);
        assert_eq!(sample.voltage, 11.1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_timeout() {
        let source = RosCliSource::new("sh -c 'sleep 5'", Duration::from_millis(200), vec![]).unwrap();
        assert!(matches!(source.battery_state().await, Err(SourceError::Timeout { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_topic_rate_reads_until_rate_line() {
        let script = r#"sh -c 'echo "average rate: 9.500"; sleep 5'"#;
        let source = RosCliSource::new(script, Duration::from_secs(3), vec![]).unwrap();
        let started = std::time::Instant::now();
        let reading = source.topic_rate("lidar", "/scan").await.unwrap();
        assert_eq!(reading.status, SensorStatus::Active);
        assert_eq!(reading.data_rate, 9.5);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_topic_is_inactive() {
        let source = RosCliSource::new("sh -c 'sleep 5'", Duration::from_millis(200), vec![]).unwrap();
        let reading = source.topic_rate("imu", "/imu").await.unwrap();
        assert_eq!(reading.status, SensorStatus::Inactive);
        assert_eq!(reading.data_rate, 0.0);
    }
}
