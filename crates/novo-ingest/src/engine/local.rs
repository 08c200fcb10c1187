//! Single-process engine
//!
//! Everything runs sequentially on the calling thread. Each dataset's typed
//! data lives in one Parquet file; appending rewrites the file with the new
//! rows added and swaps it in with a rename.

use super::{Engine, EngineKind};
use crate::caster::SchemaCaster;
use crate::error::{IngestError, Result};
use crate::hasher::IdentityHasher;
use crate::novelty::HashedRecord;
use crate::sink;
use novo_common::types::{DatasetDescriptor, RawRecord, TypedRecord};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LocalEngine {
    output_dir: PathBuf,
}

impl LocalEngine {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl Engine for LocalEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Local
    }

    fn hash(&self, hasher: &IdentityHasher, records: Vec<RawRecord>) -> Vec<HashedRecord> {
        records
            .into_iter()
            .map(|record| HashedRecord::new(hasher.hash(&record), record))
            .collect()
    }

    fn cast(&self, caster: &SchemaCaster, records: Vec<RawRecord>) -> Vec<TypedRecord> {
        records.iter().map(|record| caster.cast(record)).collect()
    }

    fn write_data(&self, descriptor: &DatasetDescriptor, records: &[TypedRecord]) -> Result<usize> {
        let dataset = descriptor.name();
        let path = self.data_location(descriptor);

        let fresh = sink::to_record_batch(descriptor.columns(), records)
            .map_err(|e| IngestError::data_write(dataset, e))?;
        let schema = fresh.schema();

        let mut batches = if path.exists() {
            let (existing_schema, batches) =
                sink::read_parquet(&path).map_err(|e| IngestError::data_write(dataset, e))?;
            if existing_schema.fields() != schema.fields() {
                return Err(IngestError::data_write(
                    dataset,
                    format!(
                        "existing data at {} has a different schema than the declared columns",
                        path.display()
                    ),
                ));
            }
            batches
        } else {
            Vec::new()
        };
        debug!(dataset, existing_batches = batches.len(), "Appending to data file");
        batches.push(fresh);

        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| IngestError::data_write(dataset, e))?;
        sink::write_parquet_atomically(&path, schema, &batches)
            .map_err(|e| IngestError::data_write(dataset, e))?;

        Ok(records.len())
    }

    fn data_location(&self, descriptor: &DatasetDescriptor) -> PathBuf {
        self.output_dir.join(format!("{}.parquet", descriptor.name()))
    }

    fn data_files(&self, descriptor: &DatasetDescriptor) -> Result<Vec<PathBuf>> {
        let path = self.data_location(descriptor);
        Ok(if path.exists() { vec![path] } else { Vec::new() })
    }

    fn persisted_rows(&self, descriptor: &DatasetDescriptor) -> Result<usize> {
        let path = self.data_location(descriptor);
        if !path.exists() {
            return Ok(0);
        }
        sink::parquet_row_count(&path).map_err(|e| IngestError::data_write(descriptor.name(), e))
    }
}
