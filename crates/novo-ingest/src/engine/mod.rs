//! Execution engines
//!
//! An [`Engine`] is the substrate a run executes on: how raw records are read,
//! how hashing and casting are scheduled, and how typed records are persisted.
//! Identity, novelty and casting rules are shared, so both engines make the
//! same decisions for the same input and differ only in where the work runs
//! and in how data files are laid out.

pub mod batch;
pub mod local;

pub use batch::BatchEngine;
pub use local::LocalEngine;

use crate::caster::SchemaCaster;
use crate::error::{IngestError, Result};
use crate::hasher::IdentityHasher;
use crate::novelty::HashedRecord;
use crate::reader::{self, RawBatch};
use crate::settings::IngestSettings;
use novo_common::types::{DatasetDescriptor, RawRecord, TypedRecord};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which engine a run uses
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Partition-parallel on a dedicated worker pool, part-file output
    Batch,
    /// Sequential in the calling thread, single-file output
    #[default]
    Local,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Batch => "batch",
            EngineKind::Local => "local",
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EngineKind {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "batch" => Ok(EngineKind::Batch),
            "local" => Ok(EngineKind::Local),
            other => Err(IngestError::configuration(format!(
                "unknown engine '{}' (expected 'batch' or 'local')",
                other
            ))),
        }
    }
}

/// Capabilities a run needs from its execution substrate
pub trait Engine: Send + Sync {
    fn kind(&self) -> EngineKind;

    /// Read all raw records of a dataset from `source`
    fn read(&self, descriptor: &DatasetDescriptor, source: &Path) -> Result<RawBatch> {
        reader::read_csv_file(descriptor.name(), source)
    }

    /// Pair every record with its identity, preserving input order
    fn hash(&self, hasher: &IdentityHasher, records: Vec<RawRecord>) -> Vec<HashedRecord>;

    /// Type every record, preserving input order
    fn cast(&self, caster: &SchemaCaster, records: Vec<RawRecord>) -> Vec<TypedRecord>;

    /// Durably persist typed records; returns the number of rows written
    fn write_data(&self, descriptor: &DatasetDescriptor, records: &[TypedRecord]) -> Result<usize>;

    /// Where this engine keeps a dataset's typed data
    fn data_location(&self, descriptor: &DatasetDescriptor) -> PathBuf;

    /// Data files of a dataset in storage order; empty before the first write
    fn data_files(&self, descriptor: &DatasetDescriptor) -> Result<Vec<PathBuf>>;

    /// Rows persisted so far for a dataset
    fn persisted_rows(&self, descriptor: &DatasetDescriptor) -> Result<usize>;
}

/// Construct the engine selected by `settings`
pub fn build_engine(settings: &IngestSettings) -> Result<Arc<dyn Engine>> {
    let engine: Arc<dyn Engine> = match settings.engine {
        EngineKind::Local => Arc::new(LocalEngine::new(&settings.output_dir)),
        EngineKind::Batch => Arc::new(BatchEngine::new(
            &settings.output_dir,
            settings.partition_size,
            settings.parallelism,
        )?),
    };
    Ok(engine)
}
