//! tb3-health - TurtleBot3 health diagnostics
//!
//! One-shot diagnostics by default, continuous monitoring with `--monitor`.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tb3_health::{apply_log_level, init_logging, load_config, HealthPoller};
use tracing::{info, warn};

const STATUS_EVERY: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "tb3-health", version, about = "TurtleBot3 system health diagnostics")]
struct Cli {
    /// Configuration file (defaults to $TB3_HEALTH_CONFIG, then config/system_config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep polling and print a status line until Ctrl+C
    #[arg(long)]
    monitor: bool,

    /// Save the report as text and JSON
    #[arg(long)]
    save_report: bool,

    #[arg(long, default_value = "logs")]
    report_dir: PathBuf,

    /// Write the snapshot history as a JSON array
    #[arg(long)]
    export_history: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Before load_config so its warnings are not lost
    let log_level = init_logging();

    let config = load_config(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    if std::env::var_os("RUST_LOG").is_none() {
        if let Err(e) = apply_log_level(&log_level, &config.system.log_level) {
            warn!("Keeping log level info: {}", e);
        }
    }

    info!("🤖 {}", config.system.name);
    let poller = HealthPoller::from_config(&config).context("Failed to set up telemetry")?;

    if cli.monitor {
        monitor(&poller).await?;
    } else {
        let diagnostics = poller.diagnostics().await;
        println!("{}", diagnostics.report);
        println!("\nOverall health score: {:.0}/100", diagnostics.health_score);
    }

    if cli.save_report {
        let path = poller
            .save_report(&cli.report_dir)
            .await
            .context("Failed to save report")?;
        println!("\n💾 Report archived in {}", path.display());
    }

    if let Some(path) = &cli.export_history {
        let count = poller
            .export_history(path)
            .await
            .context("Failed to export history")?;
        info!("History ({} entries) written to {}", count, path.display());
    }

    Ok(())
}

async fn monitor(poller: &HealthPoller) -> Result<()> {
    println!("Initiating continuous monitoring...");
    println!("Press Ctrl+C to terminate\n");
    poller.start();

    let mut status = tokio::time::interval(STATUS_EVERY);
    // First tick fires immediately, before any snapshot exists
    status.tick().await;

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
                break;
            }
            _ = status.tick() => {
                if let Some(snapshot) = poller.latest() {
                    print!(
                        "\r[{}] Power: {:.1}% | Processor: {:.1}% | Warnings: {} | Score: {:.0}",
                        chrono::Local::now().format("%H:%M:%S"),
                        snapshot.power.level,
                        snapshot.host.cpu_percent,
                        snapshot.alerts.len(),
                        poller.score(&snapshot),
                    );
                    std::io::stdout().flush().ok();
                }
            }
        }
    }

    println!("\n\nTerminating monitoring...");
    poller.stop().await.context("Failed to stop health monitoring")?;
    Ok(())
}
