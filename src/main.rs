use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidscan::config::{Config, LoggingConfig, Variant};
use vidscan::scheduler::HalfSelector;

mod commands;

use commands::ScanOverrides;

#[derive(Parser)]
#[command(
    name = "vidscan",
    version,
    about = "Time-sharded vendor id scanner with identity rotation and bounded retries",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file (environment variables are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (overrides the configured level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan this worker's share of the current shard
    Scan {
        /// Deployment preset (fresh, pooled)
        #[arg(long)]
        variant: Option<Variant>,

        /// Zero-based worker ordinal
        #[arg(short, long)]
        worker: Option<usize>,

        /// Number of workers sharing a shard
        #[arg(long)]
        workers: Option<usize>,

        /// Keep only the first (1) or second (2) half of the worker's range
        #[arg(long)]
        half: Option<HalfSelector>,

        /// Run budget in minutes
        #[arg(long)]
        run_minutes: Option<u32>,

        /// Activation URL substring that marks a match
        #[arg(short, long)]
        pattern: Option<String>,

        /// Seed for fingerprint and jitter selection
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Build the daily token report and send it to the notifier
    Report {
        /// Print the report without sending it
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },

    /// Show the current shard, budget and this worker's range
    Shard {
        /// Fetch the candidate set to show concrete bounds
        #[arg(long, default_value = "false")]
        fetch: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    // Initialize tracing/logging
    let logging = config
        .logging
        .clone()
        .with_overrides(cli.log_format.as_deref(), cli.verbose);
    logging.validate()?;
    setup_tracing(&logging)?;

    tracing::info!("vidscan starting");

    match cli.command {
        Commands::Scan {
            variant,
            worker,
            workers,
            half,
            run_minutes,
            pattern,
            seed,
        } => {
            tracing::info!(
                variant = ?variant,
                worker = ?worker,
                workers = ?workers,
                half = ?half,
                run_minutes = ?run_minutes,
                "Starting scan command"
            );
            ScanOverrides {
                variant,
                worker,
                workers,
                half,
                run_minutes,
                pattern,
                seed,
            }
            .apply(&mut config);
            commands::scan(config).await?;
        }

        Commands::Report { dry_run } => {
            tracing::info!(dry_run = %dry_run, "Starting report command");
            commands::report(config, dry_run).await?;
        }

        Commands::Shard { fetch } => {
            tracing::info!(fetch = %fetch, "Starting shard command");
            commands::shard(config, fetch).await?;
        }
    }

    tracing::info!("vidscan completed successfully");
    Ok(())
}

fn setup_tracing(logging: &LoggingConfig) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::new(logging.filter_directive());

    if logging.is_json() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    Ok(())
}
