//! Command-line interface definitions
//!
//! Kept in the library so build tooling can render the reference docs from
//! the same definitions the binary parses.

use crate::engine::EngineKind;
use crate::error::Result;
use crate::settings::IngestSettings;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "novo-ingest")]
#[command(author, version, about = "Incremental, schema-enforcing dataset ingestion")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Dataset catalog (TOML)
    #[arg(long, global = true, env = "NOVO_CATALOG", default_value = "datasets.toml")]
    pub catalog: PathBuf,

    /// Directory holding raw inputs [default: $NOVO_INPUT_DIR or ./data/raw]
    #[arg(long, global = true)]
    pub input_dir: Option<PathBuf>,

    /// Root for typed output [default: $NOVO_OUTPUT_DIR or ./data/typed]
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Root for identity state [default: $NOVO_STATE_DIR or ./data/state]
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest the novel records of one or more datasets
    Run {
        /// Dataset to ingest (repeatable); all catalog datasets when omitted
        #[arg(short, long = "dataset")]
        datasets: Vec<String>,

        /// Execution engine [default: $NOVO_ENGINE or local]
        #[arg(short, long, value_enum)]
        engine: Option<EngineKind>,

        /// Write the per-dataset summaries to this file as JSON
        #[arg(long)]
        summary_out: Option<PathBuf>,
    },

    /// Show state size and persisted rows per dataset
    Status {
        /// Dataset to inspect (repeatable); all catalog datasets when omitted
        #[arg(short, long = "dataset")]
        datasets: Vec<String>,

        /// Engine whose data layout to inspect [default: $NOVO_ENGINE or local]
        #[arg(short, long, value_enum)]
        engine: Option<EngineKind>,
    },
}

impl Command {
    pub fn datasets(&self) -> &[String] {
        match self {
            Command::Run { datasets, .. } | Command::Status { datasets, .. } => datasets,
        }
    }

    pub fn engine(&self) -> Option<EngineKind> {
        match self {
            Command::Run { engine, .. } | Command::Status { engine, .. } => *engine,
        }
    }
}

impl Cli {
    /// Environment settings with command-line overrides applied
    pub fn settings(&self) -> Result<IngestSettings> {
        dotenvy::dotenv().ok();
        let settings = IngestSettings::from_env()?;
        let settings = self.apply_overrides(settings);
        settings.validate()?;
        Ok(settings)
    }

    fn apply_overrides(&self, mut settings: IngestSettings) -> IngestSettings {
        if let Some(dir) = &self.input_dir {
            settings.input_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            settings.output_dir = dir.clone();
        }
        if let Some(dir) = &self.state_dir {
            settings.state_dir = dir.clone();
        }
        if let Some(engine) = self.command.engine() {
            settings.engine = engine;
        }
        settings
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from([
            "novo-ingest",
            "run",
            "--dataset",
            "confirmed",
            "-d",
            "deaths",
            "--engine",
            "batch",
            "--state-dir",
            "/tmp/state",
        ]);

        assert_eq!(cli.command.datasets(), ["confirmed", "deaths"]);
        assert_eq!(cli.command.engine(), Some(EngineKind::Batch));
        assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/state")));
    }

    #[test]
    fn test_overrides_win_over_settings() {
        let cli = Cli::parse_from([
            "novo-ingest",
            "--output-dir",
            "/srv/typed",
            "status",
            "--engine",
            "batch",
        ]);
        let settings = cli.apply_overrides(IngestSettings::default());
        assert_eq!(settings.output_dir, PathBuf::from("/srv/typed"));
        assert_eq!(settings.engine, EngineKind::Batch);
        assert_eq!(settings.state_dir, IngestSettings::default().state_dir);
    }
}
