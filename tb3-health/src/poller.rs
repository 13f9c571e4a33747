//! Health poller
//!
//! One background task ticks at the configured interval and runs a poll
//! cycle per tick. A cycle queries every subsystem concurrently, builds a
//! `Snapshot`, runs its alerts through the cooldown filter and then
//! publishes it to the latest slot and the history.
//!
//! Cycles are serialized by the filter lock, so a manual `poll_once`
//! never interleaves with a scheduled one. All state is written after the
//! last await of a cycle: a cycle cancelled by `stop()` leaves nothing
//! behind.

use crate::alerts::{AlertFilter, AlertResponse};
use crate::config::{MonitorConf, Tb3Config};
use crate::error::{HealthError, SourceError};
use crate::history::{History, Trends};
use crate::models::{PowerReading, SensorReading, SensorStatus, Snapshot};
use crate::report;
use crate::score::{classify_power, health_score, host_alerts, motor_alert, sensor_alert, PowerThresholds};
use crate::sinks::{AlertSink, FanoutSink, MqttSink, TracingSink};
use crate::sources::{HostSampler, RobotSource, RosCliSource, TelemetrySource};
use crate::state::{new_state, publish, LatestSlot, Shared};
use chrono::Utc;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Window used for report trends
pub const TREND_WINDOW_SECS: i64 = 3600;

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub interval: Duration,
    pub thresholds: PowerThresholds,
    pub enable_alerts: bool,
    pub save_history: bool,
    pub history_capacity: usize,
    pub cooldown: Duration,
    pub cooldown_capacity: usize,
    pub shutdown_timeout: Duration,
    /// Sensor name -> topic
    pub sensors: BTreeMap<String, String>,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self::from(&MonitorConf::default())
    }
}

impl From<&MonitorConf> for PollerSettings {
    fn from(conf: &MonitorConf) -> Self {
        Self {
            interval: conf.interval(),
            thresholds: PowerThresholds {
                low: conf.battery_low_threshold,
                critical: conf.battery_critical_threshold,
            },
            enable_alerts: conf.enable_alerts,
            save_history: conf.save_history,
            history_capacity: conf.history_capacity,
            cooldown: conf.cooldown(),
            cooldown_capacity: conf.cooldown_capacity,
            shutdown_timeout: conf.shutdown_wait(),
            sensors: conf.sensors.clone(),
        }
    }
}

/// Result of a one-shot diagnostics run
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub snapshot: Arc<Snapshot>,
    pub health_score: f64,
    pub trends: Option<Trends>,
    pub report: String,
}

struct PollTask {
    handle: JoinHandle<()>,
    shutdown_tx: oneshot::Sender<()>,
}

struct PollerInner {
    settings: PollerSettings,
    source: Arc<dyn TelemetrySource>,
    sink: Arc<dyn AlertSink>,
    filter: tokio::sync::Mutex<AlertFilter>,
    history: Shared<History>,
    latest: LatestSlot,
    live_tasks: AtomicUsize,
    cycles: AtomicU64,
}

/// Counts a running poll task for as long as it is alive, abort included
struct LiveGuard<'a>(&'a AtomicUsize);

impl<'a> LiveGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct HealthPoller {
    inner: Arc<PollerInner>,
    task: Mutex<Option<PollTask>>,
}

impl HealthPoller {
    pub fn new(settings: PollerSettings, source: Arc<dyn TelemetrySource>, sink: Arc<dyn AlertSink>) -> Self {
        let filter = AlertFilter::new(settings.cooldown, settings.cooldown_capacity);
        let history = History::new(settings.history_capacity);
        Self {
            inner: Arc::new(PollerInner {
                settings,
                source,
                sink,
                filter: tokio::sync::Mutex::new(filter),
                history: new_state(history),
                latest: new_state(None),
                live_tasks: AtomicUsize::new(0),
                cycles: AtomicU64::new(0),
            }),
            task: Mutex::new(None),
        }
    }

    /// Poller wired to the robot: ROS CLI and sysinfo telemetry, alerts to
    /// the log and, when configured, to MQTT. Must be called inside a tokio
    /// runtime.
    pub fn from_config(config: &Tb3Config) -> Result<Self, SourceError> {
        let monitor = &config.health_monitor;
        let ros = RosCliSource::new(&monitor.ros_command, monitor.command_wait(), monitor.motors.clone())?;
        let source = Arc::new(RobotSource::new(ros, HostSampler::new()));

        let mut sink = FanoutSink::new().with(Arc::new(TracingSink));
        if let Some(mqtt) = &config.mqtt {
            info!("Publishing health events to MQTT broker {}:{}", mqtt.host, mqtt.port);
            sink = sink.with(Arc::new(MqttSink::connect(mqtt, "tb3-health")));
        }

        Ok(Self::new(PollerSettings::from(monitor), source, Arc::new(sink)))
    }

    pub fn settings(&self) -> &PollerSettings {
        &self.inner.settings
    }

    /// Launch the background poll task; a second call while running is a no-op
    pub fn start(&self) {
        let mut task = self.task.lock();
        if let Some(running) = task.as_ref() {
            if !running.handle.is_finished() {
                warn!("Health monitoring already running");
                return;
            }
        }

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let inner = Arc::clone(&self.inner);
        info!("🏥 Starting health monitoring (every {:?})", inner.settings.interval);

        let handle = tokio::spawn(async move {
            let _live = LiveGuard::enter(&inner.live_tasks);
            // interval() panics on a zero period
            let mut ticker = tokio::time::interval(inner.settings.interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            biased;
                            _ = &mut shutdown_rx => {
                                debug!("Shutdown during poll cycle, cycle discarded");
                                break;
                            }
                            snapshot = inner.cycle() => {
                                debug!(
                                    "Poll cycle done: {} alerts, score {:.0}",
                                    snapshot.alerts.len(),
                                    health_score(&snapshot, &inner.settings.thresholds)
                                );
                            }
                        }
                    }
                }
            }

            info!("Health monitoring stopped");
        });

        *task = Some(PollTask { handle, shutdown_tx });
    }

    /// Signal the poll task and wait for it, aborting it after the shutdown timeout.
    ///
    /// An abort lands at the task's next await; a sink blocking inside a
    /// cycle keeps it running past this call (see `AlertSink`).
    pub async fn stop(&self) -> Result<(), HealthError> {
        let task = self.task.lock().take();
        let Some(PollTask { mut handle, shutdown_tx }) = task else {
            debug!("Health monitoring not running");
            return Ok(());
        };

        info!("Stopping health monitoring...");
        // The task may already be gone; a closed channel is fine
        let _ = shutdown_tx.send(());

        let wait = self.inner.settings.shutdown_timeout;
        match tokio::time::timeout(wait, &mut handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!("Poll task ended abnormally: {}", e);
                Ok(())
            }
            Err(_) => {
                handle.abort();
                error!("Poll task did not stop within {:?}, aborted", wait);
                Err(HealthError::ShutdownTimeout(wait))
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Number of poll tasks currently alive
    pub fn live_tasks(&self) -> usize {
        self.inner.live_tasks.load(Ordering::SeqCst)
    }

    /// Completed poll cycles, scheduled and manual
    pub fn cycles(&self) -> u64 {
        self.inner.cycles.load(Ordering::SeqCst)
    }

    /// Run one poll cycle now
    pub async fn poll_once(&self) -> Arc<Snapshot> {
        self.inner.cycle().await
    }

    pub fn score(&self, snapshot: &Snapshot) -> f64 {
        health_score(snapshot, &self.inner.settings.thresholds)
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.inner.latest.lock().clone()
    }

    /// Copy of the history, oldest first
    pub fn history(&self) -> Vec<Arc<Snapshot>> {
        self.inner.history.lock().to_vec()
    }

    pub fn history_len(&self) -> usize {
        self.inner.history.lock().len()
    }

    pub fn trends(&self) -> Option<Trends> {
        self.inner
            .history
            .lock()
            .trends(Utc::now(), chrono::Duration::seconds(TREND_WINDOW_SECS))
    }

    /// Report for `snapshot`, with trends once the history holds more than one entry
    pub fn render_report(&self, snapshot: &Snapshot) -> String {
        let trends = if self.history_len() > 1 { self.trends() } else { None };
        report::render_report(snapshot, self.score(snapshot), trends.as_ref())
    }

    /// Poll once and bundle the snapshot with its score and report
    pub async fn diagnostics(&self) -> Diagnostics {
        info!("🔧 Running comprehensive diagnostics...");
        let snapshot = self.poll_once().await;
        let health_score = self.score(&snapshot);
        let trends = if self.history_len() > 1 { self.trends() } else { None };
        let report = report::render_report(&snapshot, health_score, trends.as_ref());
        Diagnostics {
            snapshot,
            health_score,
            trends,
            report,
        }
    }

    pub async fn export_latest(&self, path: &Path) -> Result<(), HealthError> {
        let snapshot = self.latest().ok_or(HealthError::NoSnapshot)?;
        report::export_snapshot(path, &snapshot).await
    }

    /// Write the history as a JSON array; returns the number of entries written
    pub async fn export_history(&self, path: &Path) -> Result<usize, HealthError> {
        let history = self.history();
        report::export_history(path, &history).await?;
        Ok(history.len())
    }

    /// Save the report for the latest snapshot into `dir` as text plus JSON
    pub async fn save_report(&self, dir: &Path) -> Result<PathBuf, HealthError> {
        let snapshot = self.latest().ok_or(HealthError::NoSnapshot)?;
        let report = self.render_report(&snapshot);
        report::save_report(dir, &report, &snapshot).await
    }
}

impl PollerInner {
    async fn cycle(&self) -> Arc<Snapshot> {
        // Held for the whole cycle
        let mut filter = self.filter.lock().await;
        let started = Instant::now();

        let snapshot = Arc::new(self.collect().await);

        if self.settings.enable_alerts {
            for alert in filter.filter(&snapshot.alerts, Instant::now()) {
                self.sink.emit(alert, AlertResponse::for_alert(alert));
            }
        }

        publish(&self.latest, Arc::clone(&snapshot));
        if self.settings.save_history {
            self.history.lock().push(Arc::clone(&snapshot));
        }
        self.sink.publish_snapshot(&snapshot);
        self.cycles.fetch_add(1, Ordering::SeqCst);

        debug!("Poll cycle took {:?}", started.elapsed());
        snapshot
    }

    /// Query every subsystem; a failed query degrades its own section only
    async fn collect(&self) -> Snapshot {
        let timestamp = Utc::now();
        let source = self.source.as_ref();

        let sensor_queries = self.settings.sensors.iter().map(move |(name, topic)| async move {
            let reading = match source.query_sensor(name, topic).await {
                Ok(reading) => reading,
                Err(e) => {
                    debug!("Sensor {} check failed: {}", name, e);
                    SensorReading::unknown()
                }
            };
            (name.clone(), reading)
        });

        let (power, sensors, motors, host) = tokio::join!(
            source.query_power(),
            join_all(sensor_queries),
            source.query_motors(),
            source.query_host(),
        );

        let mut alerts = Vec::new();

        let power = match power {
            Ok(sample) => {
                let (reading, alert) = classify_power(sample, &self.settings.thresholds);
                alerts.extend(alert);
                reading
            }
            Err(e) => {
                debug!("Battery check failed: {}", e);
                PowerReading::unknown()
            }
        };

        let sensors: BTreeMap<_, _> = sensors.into_iter().collect();
        for (name, reading) in &sensors {
            if reading.status == SensorStatus::Inactive {
                alerts.push(sensor_alert(name));
            }
        }

        let motors = match motors {
            Ok(motors) => motors,
            Err(e) => {
                debug!("Motor check failed: {}", e);
                BTreeMap::new()
            }
        };
        alerts.extend(motors.iter().filter_map(|(id, motor)| motor_alert(id, motor)));

        let host = match host {
            Ok(host) => {
                alerts.extend(host_alerts(host.cpu_percent, host.memory_percent));
                host
            }
            Err(e) => {
                debug!("System resource check failed: {}", e);
                Default::default()
            }
        };

        Snapshot {
            timestamp,
            power,
            sensors,
            motors,
            host,
            alerts,
        }
    }
}
