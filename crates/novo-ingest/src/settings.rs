//! Runtime settings
//!
//! Loaded from the environment (after `.env`, if present) with defaults, then
//! validated. CLI flags override individual fields after loading.

use crate::engine::EngineKind;
use crate::error::{IngestError, Result};
use serde::Serialize;
use std::path::PathBuf;

// ============================================================================
// Defaults
// ============================================================================

/// Default directory holding raw `<dataset>.csv` inputs.
pub const DEFAULT_INPUT_DIR: &str = "./data/raw";

/// Default root for typed output.
pub const DEFAULT_OUTPUT_DIR: &str = "./data/typed";

/// Default root for persisted identity state.
pub const DEFAULT_STATE_DIR: &str = "./data/state";

/// Default number of records per batch-engine partition.
pub const DEFAULT_PARTITION_SIZE: usize = 10_000;

/// Default number of datasets processed at once.
pub const DEFAULT_MAX_CONCURRENT_DATASETS: usize = 4;

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestSettings {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub state_dir: PathBuf,
    pub engine: EngineKind,
    pub partition_size: usize,
    /// Worker threads for the batch engine
    pub parallelism: usize,
    pub max_concurrent_datasets: usize,
}

impl IngestSettings {
    /// Load settings from environment and defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let settings = Self::from_env()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read `NOVO_*` variables without consulting `.env` or validating
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            input_dir: env_path("NOVO_INPUT_DIR").unwrap_or(defaults.input_dir),
            output_dir: env_path("NOVO_OUTPUT_DIR").unwrap_or(defaults.output_dir),
            state_dir: env_path("NOVO_STATE_DIR").unwrap_or(defaults.state_dir),
            engine: match std::env::var("NOVO_ENGINE") {
                Ok(value) => value.parse()?,
                Err(_) => defaults.engine,
            },
            partition_size: env_usize("NOVO_PARTITION_SIZE")?.unwrap_or(defaults.partition_size),
            parallelism: env_usize("NOVO_PARALLELISM")?.unwrap_or(defaults.parallelism),
            max_concurrent_datasets: env_usize("NOVO_MAX_CONCURRENT_DATASETS")?
                .unwrap_or(defaults.max_concurrent_datasets),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.partition_size == 0 {
            return Err(IngestError::configuration("partition size must be greater than 0"));
        }

        if self.parallelism == 0 {
            return Err(IngestError::configuration("parallelism must be greater than 0"));
        }

        if self.max_concurrent_datasets == 0 {
            return Err(IngestError::configuration(
                "max concurrent datasets must be greater than 0",
            ));
        }

        if self.output_dir == self.state_dir {
            return Err(IngestError::configuration(format!(
                "output and state directories must differ (both are {})",
                self.output_dir.display()
            )));
        }

        Ok(())
    }
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            engine: EngineKind::default(),
            partition_size: DEFAULT_PARTITION_SIZE,
            parallelism: default_parallelism(),
            max_concurrent_datasets: DEFAULT_MAX_CONCURRENT_DATASETS,
        }
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn env_usize(name: &str) -> Result<Option<usize>> {
    match std::env::var(name) {
        Ok(value) => value.trim().parse().map(Some).map_err(|_| {
            IngestError::configuration(format!(
                "{} must be a positive integer, got '{}'",
                name, value
            ))
        }),
        Err(_) => Ok(None),
    }
}
