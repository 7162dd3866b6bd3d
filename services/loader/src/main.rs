//! Hazard dataset bulk loader.
//!
//! Streams gzip-compressed regional CSV sources into PostgreSQL through a
//! staging-then-merge pipeline. Repeated runs are idempotent: rows already
//! present are never duplicated.

mod config;

use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use config::{LoaderConfig, SECONDARY_INDEXES};
use ingestion::{LoadPipeline, PipelineConfig, RunMode};
use storage::Catalog;

#[derive(Parser, Debug)]
#[command(name = "loader")]
#[command(about = "Bulk loader for gridded hazard datasets")]
struct Args {
    /// Dataset description file (regions, documents, column format);
    /// defaults to the built-in deterministic dataset
    #[arg(short, long)]
    dataset: Option<String>,

    /// Only add missing rows and metadata; keep the existing schema
    #[arg(long)]
    missing: bool,

    /// Schema creation script
    #[arg(long, default_value = "services/loader/sql/schema.sql")]
    schema_file: String,

    /// Index creation script
    #[arg(long, default_value = "services/loader/sql/index.sql")]
    index_file: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting hazard data loader");

    let config = LoaderConfig::from_env(args.dataset.as_deref())?;
    info!(
        schema = %config.schema,
        regions = config.dataset.regions.len(),
        "Loaded configuration"
    );

    let schema_sql = fs::read_to_string(&args.schema_file)
        .with_context(|| format!("Failed to read schema script {}", args.schema_file))?;
    let index_sql = fs::read_to_string(&args.index_file)
        .with_context(|| format!("Failed to read index script {}", args.index_file))?;

    let mode = if args.missing {
        RunMode::MissingOnly
    } else {
        RunMode::FullReload
    };

    let catalog = Catalog::connect(&config.database_url, &config.schema).await?;

    let pipeline_config = PipelineConfig::new(mode, schema_sql, index_sql)
        .with_secondary_indexes(SECONDARY_INDEXES.iter().map(|s| s.to_string()).collect());

    let pipeline = LoadPipeline::new(catalog, config.dataset, pipeline_config)?;
    let summary = pipeline.run().await?;

    for report in &summary.loaded {
        info!(
            region = %report.name,
            rows_copied = report.rows_copied,
            rows_merged = report.rows_merged,
            rows_skipped = report.rows_skipped,
            "Region loaded"
        );
    }
    for failure in &summary.failed {
        error!(region = %failure.name, reason = %failure.reason, "Region failed");
    }

    if !summary.all_succeeded() {
        anyhow::bail!(
            "{} of {} regions failed to load",
            summary.failed.len(),
            summary.loaded.len() + summary.failed.len()
        );
    }

    info!("Done loading data");
    Ok(())
}
