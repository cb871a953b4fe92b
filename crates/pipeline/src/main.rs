//! AQI Forecast Pipeline - Main Entry Point

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use pipeline::{init_logging, Pipeline, PipelineConfig};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "aqi-pipeline", version, about = "Air quality forecasting pipeline")]
struct Cli {
    /// Configuration file (defaults to ./aqi-pipeline.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate synthetic hourly history and store its features
    Mock {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Store features for the current reading
    Ingest,
    /// Store forecast-derived proxy history with synthesized AQI
    Backfill {
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        #[arg(long)]
        end: Option<DateTime<Utc>>,
    },
    /// Train every model family and select the best
    Train {
        #[arg(long)]
        days: Option<u32>,
    },
    /// Forecast the next days
    Predict {
        #[arg(long)]
        days: Option<usize>,
    },
    /// Show the current AQI
    Current,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PipelineConfig::load(cli.config.as_deref())?;
    init_logging(&config.logging)?;

    info!("=== AQI Pipeline v{} ===", env!("CARGO_PKG_VERSION"));
    let pipeline = Pipeline::from_config(&config)?;

    let output = match cli.command {
        Command::Mock { days } => json!({ "stored": pipeline.generate_history(days)? }),
        Command::Ingest => json!({ "stored": pipeline.ingest_current()? }),
        Command::Backfill { start, end } => json!({ "stored": pipeline.backfill(start, end)? }),
        Command::Train { days } => serde_json::to_value(pipeline.train_all_models(days)?)?,
        Command::Predict { days } => serde_json::to_value(pipeline.predict(days)?)?,
        Command::Current => serde_json::to_value(pipeline.current_aqi()?)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
