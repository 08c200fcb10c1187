//! Run orchestration
//!
//! One run takes one dataset through
//! `START → LOADED_STATE → READ_RAW → HASHED → FILTERED → CAST → WRITTEN_DATA
//! → WRITTEN_STATE → DONE`. State is written last, and only after the data
//! write succeeded, so persisted state never claims an identity whose record
//! was not stored. A failure at any phase leaves the state store untouched.
//!
//! Runs for different datasets are independent and may execute concurrently
//! through [`run_all`]. Two runs for the same dataset must not overlap.

use crate::caster::SchemaCaster;
use crate::engine::{Engine, EngineKind};
use crate::error::{IngestError, Result};
use crate::hasher::IdentityHasher;
use crate::novelty;
use crate::reader::RawBatch;
use crate::state::StateStore;
use futures::stream::{self, StreamExt};
use novo_common::types::DatasetDescriptor;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span};

/// Phases of a single dataset run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    Start,
    LoadedState,
    ReadRaw,
    Hashed,
    Filtered,
    Cast,
    WrittenData,
    WrittenState,
    Done,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Start => "START",
            RunPhase::LoadedState => "LOADED_STATE",
            RunPhase::ReadRaw => "READ_RAW",
            RunPhase::Hashed => "HASHED",
            RunPhase::Filtered => "FILTERED",
            RunPhase::Cast => "CAST",
            RunPhase::WrittenData => "WRITTEN_DATA",
            RunPhase::WrittenState => "WRITTEN_STATE",
            RunPhase::Done => "DONE",
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dataset and the raw input to ingest for it
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetJob {
    pub descriptor: DatasetDescriptor,
    pub source: PathBuf,
}

impl DatasetJob {
    pub fn new(descriptor: DatasetDescriptor, source: impl Into<PathBuf>) -> Self {
        Self {
            descriptor,
            source: source.into(),
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub dataset_name: String,
    pub engine: EngineKind,
    /// Records decoded from the raw input
    pub total_read: usize,
    /// Records persisted by this run
    pub total_novel: usize,
    pub already_seen: usize,
    pub duplicates_in_batch: usize,
    /// Raw rows skipped because they could not be decoded
    pub malformed: usize,
    /// Identities in the state store after the run
    pub state_size: usize,
    pub data_location: PathBuf,
}

/// Persisted size of a dataset, for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetStatus {
    pub dataset_name: String,
    pub state_size: usize,
    pub persisted_rows: usize,
    pub data_location: PathBuf,
}

/// Per-dataset result of a multi-dataset run
#[derive(Debug)]
pub struct DatasetOutcome {
    pub dataset: String,
    pub result: Result<RunSummary>,
}

impl DatasetOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Drives dataset runs on one engine against one state store
pub struct Ingestor {
    engine: Arc<dyn Engine>,
    state: Arc<dyn StateStore>,
}

impl Ingestor {
    pub fn new(engine: Arc<dyn Engine>, state: Arc<dyn StateStore>) -> Self {
        Self { engine, state }
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    pub fn state(&self) -> &dyn StateStore {
        self.state.as_ref()
    }

    /// Run one dataset end to end
    pub fn run(&self, job: &DatasetJob) -> Result<RunSummary> {
        let descriptor = &job.descriptor;
        let dataset = descriptor.name();
        let engine = self.engine.kind();
        let span = info_span!("ingest_run", dataset, engine = %engine);
        let _enter = span.enter();
        let started = Instant::now();

        let mut phase = RunPhase::Start;
        let mut advance = |next: RunPhase| {
            debug!(from = %phase, to = %next, "Phase transition");
            phase = next;
        };

        // Configuration problems surface here, before any I/O
        let hasher = IdentityHasher::new(descriptor.key_columns())?;
        let caster = SchemaCaster::new(descriptor);

        let existing = self.state.load(dataset)?;
        advance(RunPhase::LoadedState);

        let raw = self.engine.read(descriptor, &job.source)?;
        check_key_columns(descriptor, &raw)?;
        let total_read = raw.records.len();
        let malformed = raw.malformed;
        advance(RunPhase::ReadRaw);

        let hashed = self.engine.hash(&hasher, raw.records);
        advance(RunPhase::Hashed);

        let mut partition = novelty::partition(hashed, &existing);
        let stats = partition.stats;
        advance(RunPhase::Filtered);

        let mut summary = RunSummary {
            dataset_name: dataset.to_string(),
            engine,
            total_read,
            total_novel: 0,
            already_seen: stats.already_seen,
            duplicates_in_batch: stats.duplicates_in_batch,
            malformed,
            state_size: existing.len(),
            data_location: self.engine.data_location(descriptor),
        };

        if partition.is_empty() {
            // Nothing to persist: neither data nor state changes
            advance(RunPhase::Done);
            info!(
                total_read,
                already_seen = stats.already_seen,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "No novel records"
            );
            return Ok(summary);
        }

        let novel_identities = std::mem::take(&mut partition.novel_identities);
        let typed = self.engine.cast(&caster, partition.into_records());
        advance(RunPhase::Cast);

        summary.total_novel = self.engine.write_data(descriptor, &typed)?;
        advance(RunPhase::WrittenData);

        let merged = self.state.merge_and_save(dataset, &existing, &novel_identities)?;
        summary.state_size = merged.len();
        advance(RunPhase::WrittenState);

        advance(RunPhase::Done);
        info!(
            total_read = summary.total_read,
            total_novel = summary.total_novel,
            already_seen = summary.already_seen,
            duplicates_in_batch = summary.duplicates_in_batch,
            malformed = summary.malformed,
            state_size = summary.state_size,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Run complete"
        );
        Ok(summary)
    }

    /// Report persisted state and data sizes for a dataset
    pub fn status(&self, descriptor: &DatasetDescriptor) -> Result<DatasetStatus> {
        Ok(DatasetStatus {
            dataset_name: descriptor.name().to_string(),
            state_size: self.state.load(descriptor.name())?.len(),
            persisted_rows: self.engine.persisted_rows(descriptor)?,
            data_location: self.engine.data_location(descriptor),
        })
    }
}

/// Every key column has to be present in a non-empty source header, otherwise
/// each record would hash that key as null
fn check_key_columns(descriptor: &DatasetDescriptor, raw: &RawBatch) -> Result<()> {
    if raw.headers.is_empty() {
        return Ok(());
    }
    let missing: Vec<&str> = descriptor
        .key_columns()
        .iter()
        .map(String::as_str)
        .filter(|column| !raw.has_column(column))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(IngestError::configuration(format!(
        "dataset '{}': key columns {:?} not found in source header {:?}",
        descriptor.name(),
        missing,
        raw.headers
    )))
}

/// Run several datasets concurrently, at most `max_concurrent` at a time
///
/// Each dataset gets its own outcome; a failure never stops the others.
/// Outcomes come back in the order of `jobs`.
pub async fn run_all(
    ingestor: Arc<Ingestor>,
    jobs: Vec<DatasetJob>,
    max_concurrent: usize,
) -> Vec<DatasetOutcome> {
    let total = jobs.len();
    info!(
        datasets = total,
        max_concurrent,
        engine = %ingestor.engine().kind(),
        "Starting ingestion"
    );

    let mut outcomes: Vec<(usize, DatasetOutcome)> = stream::iter(jobs.into_iter().enumerate())
        .map(|(index, job)| {
            let ingestor = ingestor.clone();
            async move {
                let dataset = job.descriptor.name().to_string();
                let result = match tokio::task::spawn_blocking(move || ingestor.run(&job)).await {
                    Ok(result) => result,
                    Err(e) => Err(IngestError::Worker {
                        dataset: dataset.clone(),
                        reason: e.to_string(),
                    }),
                };

                if let Err(e) = &result {
                    error!(dataset = %dataset, error = %e, "Dataset run failed");
                }
                (index, DatasetOutcome { dataset, result })
            }
        })
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await;

    outcomes.sort_by_key(|(index, _)| *index);
    let outcomes: Vec<DatasetOutcome> = outcomes.into_iter().map(|(_, o)| o).collect();

    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    info!(succeeded, failed = total - succeeded, "Ingestion finished");
    outcomes
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::engine::LocalEngine;
    use crate::state::MemoryStateStore;
    use novo_common::types::{ColumnSpec, ColumnType};
    use tempfile::TempDir;

    fn descriptor() -> DatasetDescriptor {
        DatasetDescriptor::new(
            "cases",
            vec!["id".to_string()],
            vec![
                ColumnSpec::new("id", ColumnType::Integer),
                ColumnSpec::new("value", ColumnType::String),
            ],
        )
        .unwrap()
    }

    fn setup(dir: &TempDir, csv: &str) -> (Ingestor, DatasetJob) {
        let source = dir.path().join("cases.csv");
        std::fs::write(&source, csv).unwrap();
        let ingestor = Ingestor::new(
            Arc::new(LocalEngine::new(dir.path().join("out"))),
            Arc::new(MemoryStateStore::new()),
        );
        (ingestor, DatasetJob::new(descriptor(), source))
    }

    #[test]
    fn test_phase_order() {
        assert!(RunPhase::Start < RunPhase::LoadedState);
        assert!(RunPhase::WrittenData < RunPhase::WrittenState);
        assert_eq!(RunPhase::WrittenState.to_string(), "WRITTEN_STATE");
    }

    #[test]
    fn test_run_then_rerun() {
        let dir = TempDir::new().unwrap();
        let (ingestor, job) = setup(&dir, "id,value\n1,a\n2,b\n2,c\n");

        let first = ingestor.run(&job).unwrap();
        assert_eq!(first.total_read, 3);
        assert_eq!(first.total_novel, 2);
        assert_eq!(first.duplicates_in_batch, 1);
        assert_eq!(first.state_size, 2);

        let second = ingestor.run(&job).unwrap();
        assert_eq!(second.total_novel, 0);
        assert_eq!(second.already_seen, 3);
        assert_eq!(second.state_size, 2);

        let status = ingestor.status(&job.descriptor).unwrap();
        assert_eq!(status.persisted_rows, 2);
        assert_eq!(status.state_size, 2);
    }

    #[test]
    fn test_missing_input_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let (ingestor, mut job) = setup(&dir, "id,value\n1,a\n");
        job.source = dir.path().join("absent.csv");

        assert!(matches!(ingestor.run(&job), Err(IngestError::Read { .. })));
        assert!(ingestor.state().load("cases").unwrap().is_empty());
    }

    #[test]
    fn test_key_column_missing_from_header_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (ingestor, job) = setup(&dir, "ID,value\n1,a\n2,b\n3,c\n");

        let err = ingestor.run(&job).unwrap_err();
        assert!(err.is_fatal_config(), "got {err}");
        assert!(err.to_string().contains("\"id\""));
        assert!(ingestor.state().load("cases").unwrap().is_empty());
        assert_eq!(ingestor.engine().persisted_rows(&job.descriptor).unwrap(), 0);
    }

    #[test]
    fn test_empty_source_is_not_a_key_error() {
        let dir = TempDir::new().unwrap();
        let (ingestor, job) = setup(&dir, "");

        let summary = ingestor.run(&job).unwrap();
        assert_eq!(summary.total_read, 0);
        assert_eq!(summary.total_novel, 0);
    }

    #[tokio::test]
    async fn test_run_all_isolates_failures() {
        let dir = TempDir::new().unwrap();
        let (ingestor, good) = setup(&dir, "id,value\n1,a\n");
        let mut bad = good.clone();
        bad.descriptor = DatasetDescriptor::new(
            "other",
            vec!["id".to_string()],
            vec![ColumnSpec::new("id", ColumnType::Integer)],
        )
        .unwrap();
        bad.source = dir.path().join("missing.csv");

        let outcomes = run_all(Arc::new(ingestor), vec![bad, good], 2).await;
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].dataset, "other");
        assert!(!outcomes[0].is_success());
        assert!(outcomes[1].is_success());
    }
}
