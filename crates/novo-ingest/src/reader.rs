//! CSV raw-record reader
//!
//! Produces [`RawRecord`]s with every field kept as text. Empty fields are
//! nulls, header names are taken literally, and ragged rows are tolerated.

use crate::error::{IngestError, Result};
use novo_common::types::RawRecord;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Records read from one source plus the rows that had to be skipped
#[derive(Debug, Clone, Default)]
pub struct RawBatch {
    /// Header row as found in the source, duplicates included
    pub headers: Vec<String>,
    pub records: Vec<RawRecord>,
    pub malformed: usize,
}

impl RawBatch {
    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Read a CSV file with a header row
pub fn read_csv_file(dataset: &str, path: &Path) -> Result<RawBatch> {
    let file = std::fs::File::open(path)
        .map_err(|e| IngestError::read(dataset, format!("{}: {}", path.display(), e)))?;
    let batch = read_csv(dataset, file)?;
    debug!(
        dataset,
        path = %path.display(),
        records = batch.len(),
        malformed = batch.malformed,
        "Read raw records"
    );
    Ok(batch)
}

/// Read CSV from any byte source
pub fn read_csv<R: io::Read>(dataset: &str, source: R) -> Result<RawBatch> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(source);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| IngestError::read(dataset, format!("invalid header row: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut batch = RawBatch {
        headers,
        ..RawBatch::default()
    };
    for row in reader.records() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                batch.malformed += 1;
                warn!(dataset, error = %e, "Skipping malformed row");
                continue;
            },
        };

        let mut record = RawRecord::new();
        for (index, column) in batch.headers.iter().enumerate() {
            // First occurrence of a repeated header wins
            if record.contains_column(column) {
                continue;
            }
            let value = row
                .get(index)
                .filter(|field| !field.is_empty())
                .map(str::to_string);
            record.insert(column.as_str(), value);
        }
        batch.records.push(record);
    }

    Ok(batch)
}
