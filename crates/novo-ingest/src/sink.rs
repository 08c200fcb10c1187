//! Columnar persistence of typed records
//!
//! Typed records become Arrow record batches and are stored as Parquet. Every
//! file is written under a temporary name in its final directory, synced and
//! then renamed, so readers only ever see complete files.

use arrow::array::{ArrayRef, Date32Builder, Float64Builder, Int64Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use novo_common::types::{ColumnSpec, ColumnType, TypedRecord, TypedValue};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Days between 0001-01-01 and 1970-01-01
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Arrow type used to persist a declared column type
pub fn arrow_type(column_type: ColumnType) -> DataType {
    match column_type {
        ColumnType::Date => DataType::Date32,
        ColumnType::Integer => DataType::Int64,
        ColumnType::Float => DataType::Float64,
        ColumnType::String => DataType::Utf8,
    }
}

/// Persisted schema for a dataset; every column is nullable and keeps its
/// declared name verbatim
pub fn arrow_schema(columns: &[ColumnSpec]) -> SchemaRef {
    Arc::new(Schema::new(
        columns
            .iter()
            .map(|c| Field::new(c.name.as_str(), arrow_type(c.column_type), true))
            .collect::<Vec<_>>(),
    ))
}

pub fn days_since_epoch(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

/// Build one record batch from records cast against `columns`
pub fn to_record_batch(
    columns: &[ColumnSpec],
    records: &[TypedRecord],
) -> std::result::Result<RecordBatch, ArrowError> {
    let arrays = columns
        .iter()
        .enumerate()
        .map(|(index, column)| column_array(column.column_type, index, records))
        .collect::<Vec<_>>();
    RecordBatch::try_new(arrow_schema(columns), arrays)
}

fn column_array(column_type: ColumnType, index: usize, records: &[TypedRecord]) -> ArrayRef {
    let values = records.iter().map(|r| r.value(index));
    match column_type {
        ColumnType::Date => {
            let mut builder = Date32Builder::with_capacity(records.len());
            for value in values {
                match value {
                    Some(TypedValue::Date(date)) => builder.append_value(days_since_epoch(*date)),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        },
        ColumnType::Integer => {
            let mut builder = Int64Builder::with_capacity(records.len());
            for value in values {
                match value {
                    Some(TypedValue::Integer(v)) => builder.append_value(*v),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        },
        ColumnType::Float => {
            let mut builder = Float64Builder::with_capacity(records.len());
            for value in values {
                match value {
                    Some(TypedValue::Float(v)) => builder.append_value(*v),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        },
        ColumnType::String => {
            let mut builder = StringBuilder::new();
            for value in values {
                match value {
                    Some(TypedValue::String(v)) => builder.append_value(v),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        },
    }
}

/// Hidden sibling of `path` used while a file is being written
pub fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()))
}

/// Write `batches` to `path`, replacing any existing file atomically
pub fn write_parquet_atomically(
    path: &Path,
    schema: SchemaRef,
    batches: &[RecordBatch],
) -> std::result::Result<(), ParquetError> {
    let temp = temp_path_for(path);
    let result = write_parquet_file(&temp, schema, batches)
        .and_then(|()| std::fs::rename(&temp, path).map_err(ParquetError::from));
    if result.is_err() {
        let _ = std::fs::remove_file(&temp);
    }
    result
}

/// Write and fsync a Parquet file in place
pub fn write_parquet_file(
    path: &Path,
    schema: SchemaRef,
    batches: &[RecordBatch],
) -> std::result::Result<(), ParquetError> {
    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    for batch in batches {
        writer.write(batch)?;
    }
    let file = writer.into_inner()?;
    file.sync_all()?;
    Ok(())
}

/// Read a whole Parquet file back into memory
pub fn read_parquet(
    path: &Path,
) -> std::result::Result<(SchemaRef, Vec<RecordBatch>), ParquetError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
    let schema = builder.schema().clone();
    let batches = builder
        .build()?
        .collect::<std::result::Result<Vec<_>, ArrowError>>()?;
    Ok((schema, batches))
}

/// Row count from the file footer, without decoding data pages
pub fn parquet_row_count(path: &Path) -> std::result::Result<usize, ParquetError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
    Ok(builder.metadata().file_metadata().num_rows().max(0) as usize)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{Date32Type, Int64Type};
    use tempfile::TempDir;

    fn columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("Last Update", ColumnType::Date),
            ColumnSpec::new("cases", ColumnType::Integer),
            ColumnSpec::new("rate", ColumnType::Float),
            ColumnSpec::new("Country/Region", ColumnType::String),
        ]
    }

    fn records() -> Vec<TypedRecord> {
        vec![
            TypedRecord::new(vec![
                Some(TypedValue::Date(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap())),
                Some(TypedValue::Integer(1234)),
                Some(TypedValue::Float(0.5)),
                Some(TypedValue::String("X".to_string())),
            ]),
            TypedRecord::new(vec![None, None, None, None]),
        ]
    }

    #[test]
    fn test_schema_keeps_literal_names() {
        let schema = arrow_schema(&columns());
        assert_eq!(schema.field(0).name(), "Last Update");
        assert_eq!(schema.field(3).name(), "Country/Region");
        assert!(schema.fields().iter().all(|f| f.is_nullable()));
        assert_eq!(schema.field(1).data_type(), &DataType::Int64);
    }

    #[test]
    fn test_record_batch_values_and_nulls() {
        let batch = to_record_batch(&columns(), &records()).unwrap();
        assert_eq!(batch.num_rows(), 2);

        let dates = batch.column(0).as_primitive::<Date32Type>();
        assert_eq!(dates.value(0), 1);
        assert!(dates.is_null(1));

        let cases = batch.column(1).as_primitive::<Int64Type>();
        assert_eq!(cases.value(0), 1234);
        assert!(cases.is_null(1));
    }

    #[test]
    fn test_epoch_offset() {
        assert_eq!(days_since_epoch(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), 0);
        assert_eq!(days_since_epoch(NaiveDate::from_ymd_opt(1969, 12, 31).unwrap()), -1);
    }

    #[test]
    fn test_write_read_and_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cases.parquet");
        let batch = to_record_batch(&columns(), &records()).unwrap();

        write_parquet_atomically(&path, batch.schema(), &[batch.clone()]).unwrap();

        assert_eq!(parquet_row_count(&path).unwrap(), 2);
        let (schema, batches) = read_parquet(&path).unwrap();
        assert_eq!(schema.fields(), batch.schema().fields());
        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 2);

        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
