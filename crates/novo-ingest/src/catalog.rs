//! Dataset catalog
//!
//! The catalog is the static list of datasets a deployment ingests, kept in a
//! TOML file:
//!
//! ```toml
//! [[datasets]]
//! name = "confirmed"
//! key_columns = ["Province/State", "Country/Region", "Date"]
//! source = "time_series_confirmed.csv"   # optional, defaults to <name>.csv
//! date_format = "%m/%d/%y"               # optional, defaults to %Y-%m-%d
//! columns = [
//!     { name = "Province/State", type = "string" },
//!     { name = "Country/Region", type = "string" },
//!     { name = "Date", type = "date" },
//!     { name = "Confirmed", type = "integer" },
//! ]
//! ```

use crate::error::{IngestError, Result};
use crate::ingestor::DatasetJob;
use novo_common::types::{ColumnSpec, ColumnType, DatasetDescriptor};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    datasets: Vec<DatasetEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DatasetEntry {
    name: String,
    key_columns: Vec<String>,
    #[serde(default)]
    source: Option<PathBuf>,
    #[serde(default)]
    date_format: Option<String>,
    columns: Vec<ColumnEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ColumnEntry {
    name: String,
    #[serde(rename = "type")]
    column_type: String,
}

/// One catalog entry: a validated descriptor plus where its raw input lives
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogDataset {
    pub descriptor: DatasetDescriptor,
    source: Option<PathBuf>,
}

impl CatalogDataset {
    /// Raw input location, resolved against `input_dir` when relative
    pub fn source_path(&self, input_dir: &Path) -> PathBuf {
        match &self.source {
            Some(source) => input_dir.join(source),
            None => input_dir.join(format!("{}.csv", self.descriptor.name())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetCatalog {
    datasets: Vec<CatalogDataset>,
}

impl DatasetCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            IngestError::configuration(format!("cannot read catalog {}: {}", path.display(), e))
        })?;
        let catalog = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), datasets = catalog.len(), "Loaded dataset catalog");
        Ok(catalog)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)
            .map_err(|e| IngestError::configuration(format!("invalid catalog: {}", e)))?;

        let mut seen = HashSet::new();
        let mut datasets = Vec::with_capacity(file.datasets.len());
        for entry in file.datasets {
            if !seen.insert(entry.name.clone()) {
                return Err(IngestError::configuration(format!(
                    "dataset '{}' is declared more than once",
                    entry.name
                )));
            }
            datasets.push(entry.into_dataset()?);
        }

        Ok(Self { datasets })
    }

    pub fn datasets(&self) -> &[CatalogDataset] {
        &self.datasets
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&CatalogDataset> {
        self.datasets.iter().find(|d| d.descriptor.name() == name)
    }

    /// Entries named in `names`, or every entry when `names` is empty
    pub fn select(&self, names: &[String]) -> Result<Vec<&CatalogDataset>> {
        if names.is_empty() {
            return Ok(self.datasets.iter().collect());
        }

        let mut seen = HashSet::new();
        names
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .map(|name| {
                self.get(name).ok_or_else(|| {
                    IngestError::configuration(format!("dataset '{}' is not in the catalog", name))
                })
            })
            .collect()
    }

    /// Runnable jobs for the selected datasets
    pub fn jobs(&self, names: &[String], input_dir: &Path) -> Result<Vec<DatasetJob>> {
        Ok(self
            .select(names)?
            .into_iter()
            .map(|dataset| {
                DatasetJob::new(dataset.descriptor.clone(), dataset.source_path(input_dir))
            })
            .collect())
    }
}

impl DatasetEntry {
    fn into_dataset(self) -> Result<CatalogDataset> {
        let columns = self
            .columns
            .into_iter()
            .map(|column| {
                let column_type: ColumnType = column.column_type.parse().map_err(|_| {
                    IngestError::configuration(format!(
                        "dataset '{}': column '{}' has unknown type '{}'",
                        self.name, column.name, column.column_type
                    ))
                })?;
                Ok(ColumnSpec::new(column.name, column_type))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut descriptor = DatasetDescriptor::new(self.name, self.key_columns, columns)?;
        if let Some(date_format) = self.date_format {
            descriptor = descriptor.with_date_format(date_format)?;
        }

        Ok(CatalogDataset {
            descriptor,
            source: self.source,
        })
    }
}
