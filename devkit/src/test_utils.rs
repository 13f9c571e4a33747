/*!
Test harness for the health poller

Builds a `HealthPoller` over a `ScriptedSource` and a `RecordingSink`,
with a short interval so scheduled cycles happen within a test.
*/

use crate::recording_sink::RecordingSink;
use crate::scripted_source::ScriptedSource;
use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tb3_health::{HealthPoller, PollerSettings};

/// Route tracing output through the test writer; safe to call more than once
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init()
        .ok();
}

/// Poll `check` every 10ms until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// `wait_until` that fails with a readable error naming what never happened
pub async fn wait_for(what: &str, timeout: Duration, check: impl FnMut() -> bool) -> Result<()> {
    if wait_until(timeout, check).await {
        Ok(())
    } else {
        bail!("timed out after {:?} waiting for {}", timeout, what)
    }
}

pub struct TestHarness {
    pub source: Arc<ScriptedSource>,
    pub sink: Arc<RecordingSink>,
    pub settings: PollerSettings,
}

impl TestHarness {
    /// Default settings with a 20ms interval and a 1s shutdown timeout
    pub fn new() -> Self {
        init_tracing();
        Self {
            source: Arc::new(ScriptedSource::new()),
            sink: Arc::new(RecordingSink::new()),
            settings: PollerSettings {
                interval: Duration::from_millis(20),
                shutdown_timeout: Duration::from_secs(1),
                ..PollerSettings::default()
            },
        }
    }

    pub fn with_settings(mut self, tweak: impl FnOnce(&mut PollerSettings)) -> Self {
        tweak(&mut self.settings);
        self
    }

    pub fn poller(&self) -> HealthPoller {
        HealthPoller::new(self.settings.clone(), self.source.clone(), self.sink.clone())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
