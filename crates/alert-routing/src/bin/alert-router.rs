//! Operator CLI for the alert routing engine.
//!
//! Runs against the database named in the config file (or
//! `ALERT_ROUTING__DATABASE__URL`) and prints results as JSON.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::warn;

use alert_routing::logging::{setup_logging, LoggingConfig};
use alert_routing::prelude::*;

/// Alert routing operator tool
#[derive(Parser, Debug)]
#[command(name = "alert-router", author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the background tasks enabled in config until Ctrl-C
    Run,
    /// Escalate stale PENDING assignments
    Sweep {
        /// Override `sweeper.max_age_days`
        #[arg(long)]
        max_age_days: Option<u32>,

        /// Keep sweeping on `sweeper.interval_secs` until Ctrl-C
        #[arg(long)]
        watch: bool,
    },
    /// List routing rules in evaluation order
    Rules,
    /// List agents with their workload
    Agents,
    /// Show one agent's workload
    Workload { agent_id: String },
    /// Routing statistics for the last N days
    Stats {
        #[arg(long, default_value = "7")]
        days: u32,
    },
    /// Alerts waiting in the supervisor queue
    Queue,
    /// Route an alert described by a JSON file
    Route { context: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = RoutingEngineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    setup_logging(LoggingConfig::from_settings(&config.logging)?)?;

    let engine = RoutingEngine::new(config).await.context("starting routing engine")?;

    match cli.command {
        Command::Run => match engine.start_background_tasks() {
            Some(handle) => {
                tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
                handle.shutdown().await;
            }
            None => warn!("No background tasks enabled; set [sweeper] enabled = true"),
        },
        Command::Sweep { max_age_days, watch } => {
            let days = max_age_days.unwrap_or(engine.config().sweeper.max_age_days);
            if watch {
                let handle = StaleAlertSweeper::new(engine.clone()).with_max_age_days(days).spawn();
                tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
                handle.shutdown().await;
            } else {
                print_json(&engine.handle_stale_alerts(days).await?)?;
            }
        }
        Command::Rules => print_json(&engine.list_rules().await?)?,
        Command::Agents => print_json(&engine.database().list_agent_snapshots().await?)?,
        Command::Workload { agent_id } => print_json(&engine.get_agent_workload(&agent_id).await?)?,
        Command::Stats { days } => {
            print_json(&engine.get_routing_stats(DateRange::last_days(days)).await?)?
        }
        Command::Queue => print_json(&engine.supervisor_queue().await?)?,
        Command::Route { context } => {
            let raw = std::fs::read_to_string(&context)
                .with_context(|| format!("reading {}", context.display()))?;
            let alert: AlertContext = serde_json::from_str(&raw).context("parsing alert context")?;
            print_json(&engine.route(&alert).await?)?;
        }
    }

    engine.database().close().await;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
