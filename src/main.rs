use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mulgyeol::commands;
use mulgyeol::config::Config;

#[derive(Parser)]
#[command(
    name = "mulgyeol",
    version,
    about = "Feed update scheduling core with slot-window scheduling and filter evaluation",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (TOML); environment variables otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler loop
    Run,

    /// Backfill slot offsets for feeds lacking one
    Backfill {
        /// Feeds per batch
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// Evaluate a filter expression against an article and explain the verdict
    CheckFilter {
        /// Path to a JSON filter expression
        #[arg(short, long)]
        expression: PathBuf,

        /// Path to a JSON article (flat string fields)
        #[arg(short, long)]
        article: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate()?;

    match cli.command {
        Commands::Run => {
            tracing::info!(
                tick_seconds = config.scheduler.tick_seconds,
                max_concurrency = config.scheduler.max_concurrency,
                "Starting scheduler"
            );
            commands::run(config).await?;
        }

        Commands::Backfill { batch_size } => {
            let batch_size = batch_size.unwrap_or(config.scheduler.backfill_batch_size);
            tracing::info!(batch_size = batch_size, "Starting slot offset backfill");
            commands::backfill(config, batch_size).await?;
        }

        Commands::CheckFilter {
            expression,
            article,
        } => {
            commands::check_filter(&config, &expression, &article)?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("mulgyeol=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("mulgyeol=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
