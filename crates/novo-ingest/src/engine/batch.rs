//! Partition-parallel engine
//!
//! Records are split into partitions of `partition_size` and hashed and cast
//! on a rayon pool owned by the engine. The pool lives as long as the engine,
//! so dropping the engine ends the session. Every run adds one part file per
//! partition under the dataset's directory; part files are staged under
//! hidden names and only renamed into place once all of them are written.
//!
//! Part files are named `part-<run>-<partition>.parquet`, where `<run>` is one
//! past the highest run already on disk. Storage order is `(run, partition)`.

use super::{Engine, EngineKind};
use crate::caster::SchemaCaster;
use crate::error::{IngestError, Result};
use crate::hasher::IdentityHasher;
use crate::novelty::HashedRecord;
use crate::sink;
use novo_common::types::{DatasetDescriptor, RawRecord, TypedRecord};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const PART_PREFIX: &str = "part-";
const PART_SUFFIX: &str = ".parquet";

/// `(run, partition)` encoded in a part file name
fn part_key(path: &Path) -> Option<(u64, u64)> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_prefix(PART_PREFIX)?.strip_suffix(PART_SUFFIX)?;
    let (run, partition) = stem.split_once('-')?;
    Some((run.parse().ok()?, partition.parse().ok()?))
}

fn part_name(run: u64, partition: usize) -> String {
    format!("{}{:010}-{:05}{}", PART_PREFIX, run, partition, PART_SUFFIX)
}

pub struct BatchEngine {
    output_dir: PathBuf,
    partition_size: usize,
    pool: ThreadPool,
}

impl std::fmt::Debug for BatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchEngine")
            .field("output_dir", &self.output_dir)
            .field("partition_size", &self.partition_size)
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

impl BatchEngine {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        partition_size: usize,
        parallelism: usize,
    ) -> Result<Self> {
        if partition_size == 0 {
            return Err(IngestError::configuration("partition size must be greater than 0"));
        }
        if parallelism == 0 {
            return Err(IngestError::configuration("parallelism must be greater than 0"));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .thread_name(|index| format!("novo-batch-{}", index))
            .build()
            .map_err(|e| {
                IngestError::configuration(format!("failed to start worker pool: {}", e))
            })?;

        Ok(Self {
            output_dir: output_dir.into(),
            partition_size,
            pool,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn partition_size(&self) -> usize {
        self.partition_size
    }

    /// Part files of a dataset in `(run, partition)` order
    fn part_files(&self, descriptor: &DatasetDescriptor) -> std::io::Result<Vec<PathBuf>> {
        let dir = self.data_location(descriptor);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut parts = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if let Some(key) = part_key(&path) {
                parts.push((key, path));
            }
        }
        parts.sort();
        Ok(parts.into_iter().map(|(_, path)| path).collect())
    }

    fn check_existing_schema(
        &self,
        descriptor: &DatasetDescriptor,
        schema: &arrow::datatypes::Schema,
    ) -> Result<()> {
        let dataset = descriptor.name();
        let parts = self
            .part_files(descriptor)
            .map_err(|e| IngestError::data_write(dataset, e))?;
        let Some(first) = parts.first() else {
            return Ok(());
        };

        let (existing, _) =
            sink::read_parquet(first).map_err(|e| IngestError::data_write(dataset, e))?;
        if existing.fields() != schema.fields() {
            return Err(IngestError::data_write(
                dataset,
                format!(
                    "existing part {} has a different schema than the declared columns",
                    first.display()
                ),
            ));
        }
        Ok(())
    }
}

impl Engine for BatchEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Batch
    }

    fn hash(&self, hasher: &IdentityHasher, records: Vec<RawRecord>) -> Vec<HashedRecord> {
        let partition_size = self.partition_size;
        self.pool.install(|| {
            records
                .into_par_iter()
                .with_min_len(partition_size)
                .map(|record| HashedRecord::new(hasher.hash(&record), record))
                .collect()
        })
    }

    fn cast(&self, caster: &SchemaCaster, records: Vec<RawRecord>) -> Vec<TypedRecord> {
        let partition_size = self.partition_size;
        self.pool.install(|| {
            records
                .par_iter()
                .with_min_len(partition_size)
                .map(|record| caster.cast(record))
                .collect()
        })
    }

    fn write_data(&self, descriptor: &DatasetDescriptor, records: &[TypedRecord]) -> Result<usize> {
        let dataset = descriptor.name();
        let dir = self.data_location(descriptor);
        std::fs::create_dir_all(&dir).map_err(|e| IngestError::data_write(dataset, e))?;

        let schema = sink::arrow_schema(descriptor.columns());
        self.check_existing_schema(descriptor, &schema)?;

        let parts = self
            .part_files(descriptor)
            .map_err(|e| IngestError::data_write(dataset, e))?;
        let run = parts
            .iter()
            .filter_map(|p| part_key(p))
            .map(|(run, _)| run + 1)
            .max()
            .unwrap_or(0);
        let partitions: Vec<(usize, &[TypedRecord])> =
            records.chunks(self.partition_size).enumerate().collect();

        // Stage every part in parallel, then publish them together
        let staged: Vec<std::result::Result<(PathBuf, PathBuf), String>> = self.pool.install(|| {
            partitions
                .par_iter()
                .map(|(index, chunk)| -> std::result::Result<(PathBuf, PathBuf), String> {
                    let target = dir.join(part_name(run, *index));
                    let temp = sink::temp_path_for(&target);
                    let batch = sink::to_record_batch(descriptor.columns(), chunk)
                        .map_err(|e| e.to_string())?;
                    sink::write_parquet_file(&temp, schema.clone(), &[batch]).map_err(|e| {
                        let _ = std::fs::remove_file(&temp);
                        e.to_string()
                    })?;
                    Ok((temp, target))
                })
                .collect()
        });

        let mut ready = Vec::with_capacity(staged.len());
        let mut failure = None;
        for outcome in staged {
            match outcome {
                Ok(pair) => ready.push(pair),
                Err(reason) => failure = failure.or(Some(reason)),
            }
        }
        if let Some(reason) = failure {
            for (temp, _) in &ready {
                let _ = std::fs::remove_file(temp);
            }
            return Err(IngestError::data_write(dataset, reason));
        }

        for (published, (temp, target)) in ready.iter().enumerate() {
            if let Err(e) = std::fs::rename(temp, target) {
                warn!(dataset, published, error = %e, "Part publish failed");
                for (temp, _) in &ready[published..] {
                    let _ = std::fs::remove_file(temp);
                }
                return Err(IngestError::data_write(dataset, e));
            }
        }

        debug!(dataset, run, parts = ready.len(), rows = records.len(), "Wrote part files");
        Ok(records.len())
    }

    fn data_location(&self, descriptor: &DatasetDescriptor) -> PathBuf {
        self.output_dir.join(descriptor.name())
    }

    fn data_files(&self, descriptor: &DatasetDescriptor) -> Result<Vec<PathBuf>> {
        self.part_files(descriptor)
            .map_err(|e| IngestError::data_write(descriptor.name(), e))
    }

    fn persisted_rows(&self, descriptor: &DatasetDescriptor) -> Result<usize> {
        let dataset = descriptor.name();
        let mut total = 0;
        for part in self.data_files(descriptor)? {
            total += sink::parquet_row_count(&part)
                .map_err(|e| IngestError::data_write(dataset, e))?;
        }
        Ok(total)
    }
}
