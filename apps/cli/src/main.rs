//! CareBook operational CLI
//!
//! Usage:
//!   carebook health [--url <url>] [--interval 5] [--timeout 3] [--attempts 0] [--until-healthy]

mod probe;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[clap(name = "carebook")]
#[clap(about = "Operational tooling for the CareBook server")]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the server health endpoint
    Health(HealthArgs),
}

#[derive(Args, Debug)]
struct HealthArgs {
    /// Health endpoint to poll
    #[clap(long, default_value = "http://localhost:5000/health")]
    url: String,

    /// Seconds between probes
    #[clap(short, long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Per-request timeout in seconds
    #[clap(short, long, default_value_t = 3, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Number of probes to run (0 = until interrupted)
    #[clap(short, long, default_value_t = 0)]
    attempts: u64,

    /// Stop at the first healthy probe
    #[clap(long)]
    until_healthy: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Health(args) => health(args).await,
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the last probe was healthy.
async fn health(args: HealthArgs) -> Result<bool> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()
        .context("Failed to build HTTP client")?;
    let interval = Duration::from_secs(args.interval);
    let stop = probe::StopRule {
        attempts: args.attempts,
        until_healthy: args.until_healthy,
    };

    info!(url = %args.url, interval_secs = args.interval, "Polling health endpoint");

    let mut attempt = 0u64;
    loop {
        attempt += 1;
        let result = probe::probe(&client, &args.url).await;
        let latency_ms = result.latency.as_millis() as u64;
        let database = result.database.as_deref().unwrap_or("unknown");

        match (&result.status, &result.error) {
            (Some(status), None) if result.healthy => {
                info!(attempt, status, latency_ms, database, "healthy");
            }
            (Some(status), None) => {
                warn!(attempt, status, latency_ms, database, "unhealthy");
            }
            (status, Some(e)) => {
                warn!(attempt, status = ?status, latency_ms, error = %e, "probe failed");
            }
            (None, None) => {
                warn!(attempt, latency_ms, "probe returned no status");
            }
        }

        if stop.should_stop(attempt, result.healthy) {
            return Ok(result.healthy);
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(result.healthy);
            }
        }
    }
}
