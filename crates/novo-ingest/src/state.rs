//! Persisted "seen identity" state
//!
//! A [`StateStore`] holds, per dataset, the full set of identities ever
//! processed. Saves always replace the whole set (never append a delta) and
//! must be atomic with respect to later loads.
//!
//! Concurrent runs against the same dataset are not supported: the
//! load → merge → save cycle is a read-modify-write and callers serialize it.

use crate::error::{IngestError, Result};
use crate::sink::write_parquet_atomically;
use arrow::array::{Array, ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use novo_common::types::StateSnapshot;
use novo_common::Identity;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Name of the single column in a persisted state file
pub const IDENTITY_COLUMN: &str = "identity";

/// Storage for per-dataset identity sets
pub trait StateStore: Send + Sync {
    /// Load the persisted set, or an empty snapshot when none exists yet.
    ///
    /// Only absence counts as "no prior state"; unreadable or malformed state
    /// is an error.
    fn load(&self, dataset: &str) -> Result<StateSnapshot>;

    /// Persist `existing ∪ newly_seen`, replacing prior state, and return it
    fn merge_and_save(
        &self,
        dataset: &str,
        existing: &StateSnapshot,
        newly_seen: &BTreeSet<Identity>,
    ) -> Result<StateSnapshot>;
}

/// State store keeping one Parquet file per dataset under a root directory
#[derive(Debug, Clone)]
pub struct ParquetStateStore {
    root: PathBuf,
}

impl ParquetStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of a dataset's state file
    pub fn state_path(&self, dataset: &str) -> PathBuf {
        self.root.join(format!("{}.state.parquet", dataset))
    }

    fn read_snapshot(&self, dataset: &str, file: File) -> Result<StateSnapshot> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| IngestError::state_corrupt(dataset, e))?;

        let fields = builder.schema().fields();
        if fields.len() != 1
            || fields[0].name() != IDENTITY_COLUMN
            || fields[0].data_type() != &DataType::Utf8
        {
            return Err(IngestError::state_corrupt(
                dataset,
                format!(
                    "expected a single Utf8 '{}' column, found {:?}",
                    IDENTITY_COLUMN,
                    fields.iter().map(|f| f.name()).collect::<Vec<_>>()
                ),
            ));
        }

        let reader = builder
            .build()
            .map_err(|e| IngestError::state_corrupt(dataset, e))?;
        let mut identities = Vec::new();
        for batch in reader {
            let batch = batch.map_err(|e| IngestError::state_corrupt(dataset, e))?;
            let column = batch
                .column(0)
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| {
                    IngestError::state_corrupt(dataset, "identity column is not a string array")
                })?;

            for value in column.iter() {
                let value =
                    value.ok_or_else(|| IngestError::state_corrupt(dataset, "null identity"))?;
                let identity =
                    Identity::from_hex(value).map_err(|e| IngestError::state_corrupt(dataset, e))?;
                identities.push(identity);
            }
        }

        Ok(identities.into_iter().collect())
    }
}

impl StateStore for ParquetStateStore {
    fn load(&self, dataset: &str) -> Result<StateSnapshot> {
        let path = self.state_path(dataset);

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(dataset, path = %path.display(), "No prior state, starting empty");
                return Ok(StateSnapshot::new());
            },
            Err(source) => {
                return Err(IngestError::StateIo {
                    dataset: dataset.to_string(),
                    source,
                })
            },
        };

        let snapshot = self.read_snapshot(dataset, file)?;
        debug!(dataset, identities = snapshot.len(), "Loaded state");
        Ok(snapshot)
    }

    fn merge_and_save(
        &self,
        dataset: &str,
        existing: &StateSnapshot,
        newly_seen: &BTreeSet<Identity>,
    ) -> Result<StateSnapshot> {
        let merged = existing.merged_with(newly_seen);

        let schema = Arc::new(Schema::new(vec![Field::new(
            IDENTITY_COLUMN,
            DataType::Utf8,
            false,
        )]));
        let column: ArrayRef = Arc::new(StringArray::from_iter_values(
            merged.iter().map(Identity::to_hex),
        ));
        let batch = RecordBatch::try_new(schema.clone(), vec![column])
            .map_err(|e| IngestError::state_write(dataset, e))?;

        std::fs::create_dir_all(&self.root).map_err(|e| IngestError::state_write(dataset, e))?;
        write_parquet_atomically(&self.state_path(dataset), schema, &[batch])
            .map_err(|e| IngestError::state_write(dataset, e))?;

        info!(
            dataset,
            previous = existing.len(),
            added = merged.len() - existing.len(),
            total = merged.len(),
            "State saved"
        );
        Ok(merged)
    }
}

/// Process-local state store, useful for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: Mutex<HashMap<String, StateSnapshot>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, dataset: &str) -> Result<StateSnapshot> {
        let states = self
            .states
            .lock()
            .map_err(|_| IngestError::state_corrupt(dataset, "state lock poisoned"))?;
        Ok(states.get(dataset).cloned().unwrap_or_default())
    }

    fn merge_and_save(
        &self,
        dataset: &str,
        existing: &StateSnapshot,
        newly_seen: &BTreeSet<Identity>,
    ) -> Result<StateSnapshot> {
        let merged = existing.merged_with(newly_seen);
        let mut states = self
            .states
            .lock()
            .map_err(|_| IngestError::state_write(dataset, "state lock poisoned"))?;
        states.insert(dataset.to_string(), merged.clone());
        Ok(merged)
    }
}
