//! Host resource sampling with sysinfo
//!
//! The `System` handle is kept between samples so CPU usage is measured
//! over the interval since the previous poll. The first sample waits for
//! one minimum CPU update interval to get a meaningful reading.

use crate::error::SourceError;
use crate::models::HostMetrics;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use sysinfo::{Disks, Networks, System};
use tracing::debug;

pub struct HostSampler {
    system: Mutex<System>,
    primed: AtomicBool,
}

impl HostSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
            primed: AtomicBool::new(false),
        }
    }

    pub async fn sample(&self) -> Result<HostMetrics, SourceError> {
        if !self.primed.swap(true, Ordering::Relaxed) {
            tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        }

        let (cpu_percent, memory_percent) = {
            let mut sys = self.system.lock();
            sys.refresh_cpu_usage();
            sys.refresh_memory();
            if sys.total_memory() == 0 || sys.cpus().is_empty() {
                return Err(SourceError::Host("no CPU or memory information".into()));
            }
            (
                f64::from(sys.global_cpu_info().cpu_usage()),
                percent(sys.used_memory(), sys.total_memory()),
            )
        };

        let disk_percent = root_disk_percent();
        let (net_tx, net_rx) = network_totals();
        debug!(
            "Host sample: cpu {:.1}%, memory {:.1}%, disk {:.1}%",
            cpu_percent, memory_percent, disk_percent
        );

        Ok(HostMetrics {
            cpu_percent,
            memory_percent,
            disk_percent,
            net_tx,
            net_rx,
        })
    }
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}

/// Usage of the filesystem mounted at `/`, or the largest disk when `/` is not listed
fn root_disk_percent() -> f64 {
    let disks = Disks::new_with_refreshed_list();
    let root = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .or_else(|| disks.list().iter().max_by_key(|d| d.total_space()));

    root.map(|d| percent(d.total_space().saturating_sub(d.available_space()), d.total_space()))
        .unwrap_or(0.0)
}

/// Bytes sent and received summed over all interfaces
fn network_totals() -> (u64, u64) {
    let networks = Networks::new_with_refreshed_list();
    networks.iter().fold((0, 0), |(tx, rx), (_, data)| {
        (tx + data.total_transmitted(), rx + data.total_received())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(50, 200), 25.0);
        assert_eq!(percent(10, 0), 0.0);
    }

    #[tokio::test]
    async fn test_host_sample_ranges() {
        let sampler = HostSampler::new();
        let metrics = sampler.sample().await.unwrap();
        assert!((0.0..=100.0).contains(&metrics.memory_percent));
        assert!(metrics.memory_percent > 0.0);
        assert!((0.0..=100.0).contains(&metrics.disk_percent));
        assert!(metrics.cpu_percent >= 0.0);

        // Second sample skips the priming wait
        let again = sampler.sample().await.unwrap();
        assert!(again.memory_percent > 0.0);
    }
}
