//! hmis-stage - JSOC export request stager
//!
//! Operator entry points:
//! - `run` stages whole months
//! - `range` re-stages a window of one month after a stall
//! - `extract-ids` turns the success log into a request ID list

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hmis_common::config::{resolve_notify_address, ConfigResolver};
use hmis_common::StagerConfig;
use hmis_stage::services::{summarize, IdExtractor, JsocClient, SessionReport};
use hmis_stage::{StageOrchestrator, StagingSession};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for hmis-stage
#[derive(Parser, Debug)]
#[command(name = "hmis-stage")]
#[command(about = "Stage HMI SHARP export requests with the JSOC export service")]
#[command(version)]
struct Args {
    /// Config file (overrides HMIS_CONFIG and the user config file)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the outcome logs
    #[arg(long, global = true, env = "HMIS_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stage every day of one or more months of a year
    Run {
        year: i32,
        /// Months to stage (1-12)
        #[arg(required = true, value_parser = clap::value_parser!(u32).range(1..=12))]
        months: Vec<u32>,
        /// Days in the month, when staging a single month (defaults to the calendar)
        #[arg(long)]
        days: Option<u32>,
    },
    /// Stage days START through END of one month
    Range {
        year: i32,
        #[arg(value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,
        start: u32,
        end: u32,
        /// Days in the month (defaults to the calendar)
        #[arg(long)]
        days: Option<u32>,
    },
    /// Extract request IDs from the success log
    ExtractIds {
        /// Success log to scan (defaults to the configured success log)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Output file (defaults to the configured ID list)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = ConfigResolver::new(args.config.clone());
    let mut config = resolver.load().context("Failed to load configuration")?;
    if let Some(log_dir) = &args.log_dir {
        config.log_dir = log_dir.clone();
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting hmis-stage v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match resolver.config_path() {
        Some(path) => info!("Config: {}", path.display()),
        None => info!("Config: compiled defaults"),
    }

    match args.command {
        Command::Run { year, months, days } => {
            if days.is_some() && months.len() > 1 {
                anyhow::bail!("--days can only be given when staging a single month");
            }
            let notify = resolve_notify_address(&config)?;
            let sessions = months
                .iter()
                .map(|&month| StagingSession::new(year, month, days, &config, notify.clone()))
                .collect::<hmis_common::Result<Vec<_>>>()?;

            let orchestrator = build_orchestrator(&config)?;
            let reports = orchestrator
                .run_sessions(&sessions)
                .await
                .context("Staging aborted")?;
            print_summary(&reports);
        }
        Command::Range {
            year,
            month,
            start,
            end,
            days,
        } => {
            let notify = resolve_notify_address(&config)?;
            let session = StagingSession::new(year, month, days, &config, notify)?;

            let orchestrator = build_orchestrator(&config)?;
            let report = orchestrator
                .run_range(&session, start, end)
                .await
                .context("Staging aborted")?;
            print_summary(&[report]);
        }
        Command::ExtractIds { input, output } => {
            let input = input.unwrap_or_else(|| config.success_log_path());
            let output = output.unwrap_or_else(|| config.id_list_path());

            let extractor = IdExtractor::new(&config.id_prefix)?;
            let extraction = extractor.extract_file(&input, &output)?;
            info!(
                "Wrote {} request IDs to {} ({} lines without an ID)",
                extraction.ids.len(),
                output.display(),
                extraction.unmatched.len()
            );
        }
    }

    Ok(())
}

/// JSOC-backed orchestrator cancelled by Ctrl+C / SIGTERM
fn build_orchestrator(config: &StagerConfig) -> Result<StageOrchestrator> {
    let client = JsocClient::new(&config.jsoc).context("Failed to create JSOC client")?;

    let cancel_token = CancellationToken::new();
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Shutdown requested; abandoning pending ranges");
        signal_token.cancel();
    });

    info!(
        "Outcome logs: {} / {}",
        config.success_log_path().display(),
        config.failure_log_path().display()
    );

    Ok(StageOrchestrator::from_config(
        Arc::new(client),
        config,
        cancel_token,
    ))
}

fn print_summary(reports: &[SessionReport]) {
    for report in reports {
        for range in &report.cancelled {
            warn!("Not staged (cancelled): {}", range);
        }
        for range in &report.oversized {
            warn!("Staged above the record limit: {}", range);
        }
    }

    if let Some(total) = summarize(reports) {
        info!(
            "Done: {} staged, {} failed, {} cancelled, {} bisections, {} submissions",
            total.successes.len(),
            total.failures.len(),
            total.cancelled.len(),
            total.bisections,
            total.submissions
        );
        if !total.failures.is_empty() {
            warn!("Failed ranges are listed in the failure log; re-run them with `hmis-stage range`");
        }
    }
}

/// Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}
