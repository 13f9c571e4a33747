/*!
Scripted telemetry source

Every section returns whatever was last set on it, or a `SourceError` when
it was told to fail. An optional delay is applied to each query so tests
can exercise slow cycles and cancellation.
*/

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tb3_health::{HostMetrics, MotorReading, PowerSample, SensorReading, SourceError, TelemetrySource};

#[derive(Debug, Clone)]
struct Script {
    power: Option<PowerSample>,
    sensors: BTreeMap<String, SensorReading>,
    motors: Option<BTreeMap<String, MotorReading>>,
    host: Option<HostMetrics>,
    delay: Duration,
}

/// Telemetry source driven by the test
pub struct ScriptedSource {
    script: Mutex<Script>,
    power_queries: AtomicUsize,
}

impl ScriptedSource {
    /// Healthy robot: full battery, the four default sensors active, cool motors, idle host
    pub fn new() -> Self {
        let sensors = ["lidar", "imu", "camera", "odometry"]
            .into_iter()
            .map(|name| (name.to_string(), SensorReading::active(10.0)))
            .collect();

        let motors = ["left", "right"]
            .into_iter()
            .map(|id| {
                (
                    id.to_string(),
                    MotorReading { temperature: 35.0, current: 0.2, rpm: 0 },
                )
            })
            .collect();

        Self {
            script: Mutex::new(Script {
                power: Some(PowerSample { level: 90.0, voltage: 12.3, current: 0.4 }),
                sensors,
                motors: Some(motors),
                host: Some(HostMetrics {
                    cpu_percent: 15.0,
                    memory_percent: 35.0,
                    disk_percent: 50.0,
                    net_tx: 0,
                    net_rx: 0,
                }),
                delay: Duration::ZERO,
            }),
            power_queries: AtomicUsize::new(0),
        }
    }

    pub fn set_power_level(&self, level: f64) {
        let mut script = self.script.lock();
        let sample = script.power.get_or_insert(PowerSample { level, voltage: 12.0, current: 0.0 });
        sample.level = level;
    }

    pub fn fail_power(&self) {
        self.script.lock().power = None;
    }

    pub fn set_sensor(&self, name: &str, reading: SensorReading) {
        self.script.lock().sensors.insert(name.to_string(), reading);
    }

    /// Queries for `name` return an error
    pub fn fail_sensor(&self, name: &str) {
        self.script.lock().sensors.remove(name);
    }

    pub fn set_motor_temperature(&self, id: &str, temperature: f64) {
        let mut script = self.script.lock();
        let motors = script.motors.get_or_insert_with(BTreeMap::new);
        motors.entry(id.to_string()).or_default().temperature = temperature;
    }

    pub fn fail_motors(&self) {
        self.script.lock().motors = None;
    }

    pub fn set_host(&self, cpu_percent: f64, memory_percent: f64) {
        let mut script = self.script.lock();
        let host = script.host.get_or_insert_with(HostMetrics::default);
        host.cpu_percent = cpu_percent;
        host.memory_percent = memory_percent;
    }

    pub fn fail_host(&self) {
        self.script.lock().host = None;
    }

    /// Latency added to every query
    pub fn set_delay(&self, delay: Duration) {
        self.script.lock().delay = delay;
    }

    /// Number of power queries so far, one per started poll cycle
    pub fn power_queries(&self) -> usize {
        self.power_queries.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = self.script.lock().delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetrySource for ScriptedSource {
    async fn query_power(&self) -> Result<PowerSample, SourceError> {
        self.power_queries.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.script
            .lock()
            .power
            .ok_or_else(|| SourceError::NoData("scripted power failure".into()))
    }

    async fn query_sensor(&self, name: &str, _topic: &str) -> Result<SensorReading, SourceError> {
        self.pause().await;
        self.script
            .lock()
            .sensors
            .get(name)
            .cloned()
            .ok_or_else(|| SourceError::NoData(format!("scripted failure for sensor {name}")))
    }

    async fn query_motors(&self) -> Result<BTreeMap<String, MotorReading>, SourceError> {
        self.pause().await;
        self.script
            .lock()
            .motors
            .clone()
            .ok_or_else(|| SourceError::NoData("scripted motor failure".into()))
    }

    async fn query_host(&self) -> Result<HostMetrics, SourceError> {
        self.pause().await;
        self.script
            .lock()
            .host
            .clone()
            .ok_or_else(|| SourceError::Host("scripted host failure".into()))
    }
}
