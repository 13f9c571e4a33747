//! Human-readable health report and JSON exports

use crate::error::HealthError;
use crate::history::Trends;
use crate::models::{PowerStatus, SensorStatus, Severity, Snapshot};
use chrono::Utc;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::info;

const RULE_WIDTH: usize = 70;

fn power_status_str(status: PowerStatus) -> &'static str {
    match status {
        PowerStatus::Good => "good",
        PowerStatus::Low => "low",
        PowerStatus::Critical => "critical",
        PowerStatus::Unknown => "unknown",
    }
}

fn sensor_status_str(status: SensorStatus) -> &'static str {
    match status {
        SensorStatus::Active => "active",
        SensorStatus::Inactive => "inactive",
        SensorStatus::Unknown => "unknown",
    }
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
}

pub fn render_report(snapshot: &Snapshot, score: f64, trends: Option<&Trends>) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    // writeln! into a String cannot fail
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "🏥 TURTLEBOT3 HEALTH REPORT");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Generated: {}", snapshot.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "Health Score: {score:.0}/100");
    let _ = writeln!(out);

    let power = &snapshot.power;
    section(&mut out, "📊 CURRENT STATUS");
    let _ = writeln!(out, "Battery: {:.1}% ({})", power.level, power_status_str(power.status));
    let _ = writeln!(out, "Voltage: {:.2}V", power.voltage);
    let _ = writeln!(out, "Current: {:.2}A", power.current);
    let _ = writeln!(out);

    section(&mut out, "🔍 SENSORS");
    for (name, sensor) in &snapshot.sensors {
        let icon = if sensor.status == SensorStatus::Active { "✅" } else { "❌" };
        let rate = if sensor.data_rate > 0.0 {
            format!("{:.1} Hz", sensor.data_rate)
        } else {
            "N/A".to_string()
        };
        let _ = writeln!(
            out,
            "{icon} {}: {} ({rate})",
            name.to_uppercase(),
            sensor_status_str(sensor.status)
        );
    }
    let _ = writeln!(out);

    section(&mut out, "⚙️  MOTORS");
    for (id, motor) in &snapshot.motors {
        let _ = writeln!(
            out,
            "{}: {:.1}°C, {:.2}A, {} RPM",
            id.to_uppercase(),
            motor.temperature,
            motor.current,
            motor.rpm
        );
    }
    let _ = writeln!(out);

    let host = &snapshot.host;
    section(&mut out, "💻 SYSTEM RESOURCES");
    let _ = writeln!(out, "CPU Usage: {:.1}%", host.cpu_percent);
    let _ = writeln!(out, "Memory Usage: {:.1}%", host.memory_percent);
    let _ = writeln!(out, "Disk Usage: {:.1}%", host.disk_percent);
    let _ = writeln!(out);

    if !snapshot.alerts.is_empty() {
        section(&mut out, "⚠️  ACTIVE ALERTS");
        for alert in &snapshot.alerts {
            let (icon, level) = match alert.severity {
                Severity::Critical => ("🚨", "CRITICAL"),
                Severity::Warning => ("⚠️ ", "WARNING"),
            };
            let _ = writeln!(out, "{icon} [{level}] {}", alert.message);
        }
        let _ = writeln!(out);
    }

    if let Some(trends) = trends {
        section(&mut out, "📈 TRENDS (Last hour)");
        let _ = writeln!(out, "Average Battery: {:.1}%", trends.avg_power_level);
        let _ = writeln!(out, "Average CPU: {:.1}%", trends.avg_cpu_percent);
        let _ = writeln!(out, "Average Memory: {:.1}%", trends.avg_memory_percent);
        let _ = writeln!(out);
    }

    out.push_str(&rule);
    out
}

async fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), HealthError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).await?;
    Ok(())
}

pub async fn export_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), HealthError> {
    write_json(path, snapshot).await?;
    info!("Health data saved to {}", path.display());
    Ok(())
}

pub async fn export_history(path: &Path, history: &[Arc<Snapshot>]) -> Result<(), HealthError> {
    write_json(path, history).await?;
    info!("Exported {} history entries to {}", history.len(), path.display());
    Ok(())
}

/// Write `health_report_<stamp>.txt` and its `.json` companion into `dir`;
/// returns the text report path
pub async fn save_report(dir: &Path, report: &str, snapshot: &Snapshot) -> Result<PathBuf, HealthError> {
    fs::create_dir_all(dir).await?;
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let txt_path = dir.join(format!("health_report_{stamp}.txt"));

    fs::write(&txt_path, report).await?;
    info!("Health report saved to {}", txt_path.display());

    export_snapshot(&txt_path.with_extension("json"), snapshot).await?;
    Ok(txt_path)
}
