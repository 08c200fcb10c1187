//! Novo Ingest - incremental dataset ingestion tool

use anyhow::{Context, Result};
use clap::Parser;
use novo_common::logging::{init_logging, LogConfig, LogLevel};
use novo_ingest::catalog::DatasetCatalog;
use novo_ingest::cli::{Cli, Command};
use novo_ingest::engine::build_engine;
use novo_ingest::{run_all, DatasetOutcome, Ingestor, ParquetStateStore};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("novo-ingest")
        .build();

    // Environment variables take precedence
    let log_config = log_config.merge_env()?;
    let _guard = init_logging(&log_config)?;

    let settings = cli.settings()?;
    let catalog = DatasetCatalog::load(&cli.catalog)
        .with_context(|| format!("loading catalog {}", cli.catalog.display()))?;
    let jobs = catalog.jobs(cli.command.datasets(), &settings.input_dir)?;

    let engine = build_engine(&settings)?;
    let state = Arc::new(ParquetStateStore::new(&settings.state_dir));
    let ingestor = Arc::new(Ingestor::new(engine, state));

    match cli.command {
        Command::Run { summary_out, .. } => {
            let outcomes = run_all(ingestor, jobs, settings.max_concurrent_datasets).await;
            print_outcomes(&outcomes);

            if let Some(path) = summary_out {
                let json = serde_json::to_string_pretty(&summary_json(&outcomes))?;
                std::fs::write(&path, json)
                    .with_context(|| format!("writing summary to {}", path.display()))?;
                info!(path = %path.display(), "Wrote run summary");
            }

            if outcomes.iter().all(DatasetOutcome::is_success) {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        },
        Command::Status { .. } => {
            let mut failed = false;
            println!("{:<24} {:>12} {:>14}  {}", "DATASET", "STATE", "ROWS", "LOCATION");
            for job in &jobs {
                match ingestor.status(&job.descriptor) {
                    Ok(status) => println!(
                        "{:<24} {:>12} {:>14}  {}",
                        status.dataset_name,
                        status.state_size,
                        status.persisted_rows,
                        status.data_location.display()
                    ),
                    Err(e) => {
                        failed = true;
                        println!("{:<24} error: {}", job.descriptor.name(), e);
                    },
                }
            }
            Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        },
    }
}

fn print_outcomes(outcomes: &[DatasetOutcome]) {
    for outcome in outcomes {
        match &outcome.result {
            Ok(summary) => println!(
                "✓ {}: {} read, {} novel, {} already seen, {} duplicate, {} malformed (state: {})",
                summary.dataset_name,
                summary.total_read,
                summary.total_novel,
                summary.already_seen,
                summary.duplicates_in_batch,
                summary.malformed,
                summary.state_size
            ),
            Err(e) => println!("✗ {}: {}", outcome.dataset, e),
        }
    }
}

fn summary_json(outcomes: &[DatasetOutcome]) -> Vec<serde_json::Value> {
    outcomes
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(summary) => serde_json::to_value(summary)
                .unwrap_or_else(|e| failure_json(&outcome.dataset, &e.to_string())),
            Err(e) => failure_json(&outcome.dataset, &e.to_string()),
        })
        .collect()
}

fn failure_json(dataset: &str, error: &str) -> serde_json::Value {
    serde_json::json!({ "dataset_name": dataset, "error": error })
}
