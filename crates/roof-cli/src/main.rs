//! roofctl - Observatory Roof Controller CLI
//!
//! Thin `reqwest`-backed client for `roofd`'s `/v1/*` API.

mod client;
mod error;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use roof_controller::{HealthReport, Status, StatusSnapshot, StopReason};

use client::RoofClient;

#[derive(Parser)]
#[command(name = "roofctl")]
#[command(about = "Observatory Roof Controller CLI")]
#[command(version)]
struct Cli {
    /// Base URL of the running `roofd` instance.
    #[arg(long, env = "ROOFCTL_ENDPOINT", global = true)]
    endpoint: Option<String>,

    /// Emit machine-readable JSON instead of colored text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current status snapshot.
    Status,
    /// Show the readiness/liveness health projection.
    Health,
    /// Command motion toward the open limit.
    Open,
    /// Command motion toward the closed limit.
    Close,
    /// Stop motion (fail-safe hold).
    Stop {
        /// Reason recorded alongside the stop (defaults to `NormalStop`).
        #[arg(long, value_enum)]
        reason: Option<StopReasonArg>,
    },
    /// Pulse the clear-fault relay and re-resolve status.
    ClearFault {
        /// Milliseconds to hold the clear-fault relay high.
        #[arg(long, default_value_t = 250)]
        pulse_ms: u64,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum StopReasonArg {
    Normal,
    Emergency,
    StopButton,
}

impl From<StopReasonArg> for StopReason {
    fn from(value: StopReasonArg) -> Self {
        match value {
            StopReasonArg::Normal => StopReason::NormalStop,
            StopReasonArg::Emergency => StopReason::EmergencyStop,
            StopReasonArg::StopButton => StopReason::StopButtonPressed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = RoofClient::connect(cli.endpoint.as_deref())?;

    let result = match cli.command {
        Commands::Status => client.status().await.map(|s| print_status(&s, cli.json)),
        Commands::Health => client.health().await.map(|h| print_health(&h, cli.json)),
        Commands::Open => client.open().await.map(|s| print_status(&s, cli.json)),
        Commands::Close => client.close().await.map(|s| print_status(&s, cli.json)),
        Commands::Stop { reason } => client
            .stop(reason.map(Into::into))
            .await
            .map(|s| print_status(&s, cli.json)),
        Commands::ClearFault { pulse_ms } => client
            .clear_fault(pulse_ms)
            .await
            .map(|s| print_status(&s, cli.json)),
    };

    if let Err(err) = result {
        if cli.json {
            print_error_json(&err);
        } else {
            eprintln!("{} {}", "Error:".red().bold(), err);
        }
        return Err(err);
    }

    Ok(())
}

fn print_status(snapshot: &StatusSnapshot, json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot).unwrap_or_default());
        return;
    }

    println!("{} {}", "Status:".bold(), colorize_status(snapshot.status));
    println!("  Moving:          {}", snapshot.is_moving);
    println!("  Last stop reason: {:?}", snapshot.last_stop_reason);
    println!(
        "  Watchdog:        {}",
        if snapshot.is_watchdog_active {
            format!(
                "armed ({:.1}s remaining)",
                snapshot.watchdog_seconds_remaining.unwrap_or(0.0)
            )
            .yellow()
        } else {
            "disarmed".green()
        }
    );
    println!("  At speed:        {}", snapshot.is_at_speed);
    println!("  Last transition: {}", snapshot.last_transition_utc);
}

fn print_health(report: &HealthReport, json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(report).unwrap_or_default());
        return;
    }

    println!("{}", "Health".bold());
    println!("  Initialized: {}", report.is_initialized);
    println!("  Disposed:    {}", report.is_disposed);
    println!("  Status:      {}", colorize_status(report.status));
    println!(
        "  Ready:       {}",
        if report.ready { "yes".green() } else { "no".red() }
    );
}

fn colorize_status(status: Status) -> colored::ColoredString {
    let text = format!("{status:?}");
    match status {
        Status::Open | Status::Closed | Status::Stopped => text.green(),
        Status::Opening | Status::Closing => text.yellow(),
        Status::Error => text.red().bold(),
        Status::NotInitialized | Status::Unknown => text.dimmed(),
        Status::PartiallyOpen | Status::PartiallyClose => text.yellow(),
    }
}

fn print_error_json(error: &anyhow::Error) {
    let body = serde_json::json!({
        "success": false,
        "error": error.to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
}
