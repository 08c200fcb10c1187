//! Shared fixtures for novo-ingest integration tests
//!
//! Each [`TestWorkspace`] owns a scratch directory with `raw/`, `typed/` and
//! `state/` subdirectories, mirroring the default data layout.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use arrow::array::Array;
use arrow::util::display::array_value_to_string;
use novo_common::types::{ColumnSpec, ColumnType, DatasetDescriptor};
use novo_ingest::engine::{BatchEngine, Engine, EngineKind, LocalEngine};
use novo_ingest::sink;
use novo_ingest::{DatasetJob, Ingestor, ParquetStateStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,novo_ingest=debug")),
        )
        .with_test_writer()
        .try_init();
}

pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        for sub in ["raw", "typed", "state"] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root().join("raw")
    }

    pub fn typed_dir(&self) -> PathBuf {
        self.root().join("typed")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root().join("state")
    }

    /// Write (or overwrite) the raw CSV for a dataset
    pub fn write_raw(&self, dataset: &str, csv: &str) -> PathBuf {
        let path = self.raw_dir().join(format!("{}.csv", dataset));
        std::fs::write(&path, csv).unwrap();
        path
    }

    pub fn engine(&self, kind: EngineKind) -> Arc<dyn Engine> {
        match kind {
            EngineKind::Local => Arc::new(LocalEngine::new(self.typed_dir())),
            EngineKind::Batch => Arc::new(BatchEngine::new(self.typed_dir(), 2, 3).unwrap()),
        }
    }

    pub fn state_store(&self) -> Arc<ParquetStateStore> {
        Arc::new(ParquetStateStore::new(self.state_dir()))
    }

    pub fn ingestor(&self, kind: EngineKind) -> Ingestor {
        Ingestor::new(self.engine(kind), self.state_store())
    }

    pub fn job(&self, descriptor: &DatasetDescriptor) -> DatasetJob {
        DatasetJob::new(
            descriptor.clone(),
            self.raw_dir().join(format!("{}.csv", descriptor.name())),
        )
    }
}

/// `[country, date]`-keyed dataset with a typed measurement and a free-text note
pub fn cases_descriptor() -> DatasetDescriptor {
    DatasetDescriptor::new(
        "cases",
        vec!["country".to_string(), "date".to_string()],
        vec![
            ColumnSpec::new("country", ColumnType::String),
            ColumnSpec::new("date", ColumnType::Date),
            ColumnSpec::new("cases", ColumnType::Integer),
            ColumnSpec::new("rate", ColumnType::Float),
        ],
    )
    .unwrap()
}

/// Relative paths of every file below `root`, hidden ones included, sorted
pub fn files_under(root: &Path) -> Vec<String> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                out.push(path.strip_prefix(root).unwrap().to_string_lossy().to_string());
            }
        }
    }

    let mut files = Vec::new();
    if root.exists() {
        walk(root, root, &mut files);
    }
    files.sort();
    files
}

/// Every persisted row of a dataset rendered as strings, in storage order
pub fn persisted_rows(engine: &dyn Engine, descriptor: &DatasetDescriptor) -> Vec<Vec<String>> {
    let files = engine.data_files(descriptor).unwrap();

    let mut rows = Vec::new();
    for file in files {
        let (_, batches) = sink::read_parquet(&file).unwrap();
        for batch in batches {
            for row in 0..batch.num_rows() {
                rows.push(
                    batch
                        .columns()
                        .iter()
                        .map(|column| {
                            if column.is_null(row) {
                                "NULL".to_string()
                            } else {
                                array_value_to_string(column, row).unwrap()
                            }
                        })
                        .collect(),
                );
            }
        }
    }
    rows
}
