//! Common types used across Novo

use crate::error::{NovoError, Result};
use crate::identity::Identity;
use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Date representation expected in raw input unless a dataset overrides it.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Dataset Descriptors
// ============================================================================

/// Target type of a persisted column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Date,
    Integer,
    Float,
    String,
}

impl std::str::FromStr for ColumnType {
    type Err = NovoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "date" => Ok(ColumnType::Date),
            "integer" => Ok(ColumnType::Integer),
            "float" => Ok(ColumnType::Float),
            "string" => Ok(ColumnType::String),
            other => Err(NovoError::config(format!("unknown target type '{}'", other))),
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Date => write!(f, "date"),
            ColumnType::Integer => write!(f, "integer"),
            ColumnType::Float => write!(f, "float"),
            ColumnType::String => write!(f, "string"),
        }
    }
}

/// One column of a dataset's target schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name, kept literally (may contain spaces, slashes, punctuation)
    pub name: String,

    /// Declared target type
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Static description of one dataset: its name, composite key and target schema.
///
/// Descriptors are validated on construction and immutable afterwards, so any
/// descriptor reaching the engine is known to have a non-empty key and a
/// well-formed schema.
///
/// # Examples
///
/// ```rust
/// use novo_common::types::{ColumnSpec, ColumnType, DatasetDescriptor};
///
/// let err = DatasetDescriptor::new("empty-key", vec![], vec![
///     ColumnSpec::new("value", ColumnType::Float),
/// ]);
/// assert!(err.is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetDescriptor {
    name: String,
    key_columns: Vec<String>,
    columns: Vec<ColumnSpec>,
    date_format: String,
}

impl DatasetDescriptor {
    /// Create a validated descriptor using [`DEFAULT_DATE_FORMAT`]
    pub fn new(
        name: impl Into<String>,
        key_columns: Vec<String>,
        columns: Vec<ColumnSpec>,
    ) -> Result<Self> {
        let descriptor = Self {
            name: name.into(),
            key_columns,
            columns,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Override the date representation used for `date` columns
    pub fn with_date_format(mut self, date_format: impl Into<String>) -> Result<Self> {
        self.date_format = date_format.into();
        validate_date_format(&self.date_format)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    fn validate(&self) -> Result<()> {
        validate_dataset_name(&self.name)?;

        if self.key_columns.is_empty() {
            return Err(NovoError::config(format!(
                "dataset '{}' declares no key columns",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for key in &self.key_columns {
            if !seen.insert(key.as_str()) {
                return Err(NovoError::config(format!(
                    "dataset '{}' repeats key column '{}'",
                    self.name, key
                )));
            }
        }

        if self.columns.is_empty() {
            return Err(NovoError::config(format!(
                "dataset '{}' declares an empty target schema",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if column.name.is_empty() {
                return Err(NovoError::config(format!(
                    "dataset '{}' declares a column with an empty name",
                    self.name
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(NovoError::config(format!(
                    "dataset '{}' repeats schema column '{}'",
                    self.name, column.name
                )));
            }
        }

        validate_date_format(&self.date_format)
    }
}

/// Dataset names become file names in the state and data stores.
fn validate_dataset_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(NovoError::config("dataset name cannot be empty"));
    }

    let unsafe_char = name
        .chars()
        .find(|c| matches!(c, '/' | '\\' | ':' | '\0') || c.is_control());
    if let Some(c) = unsafe_char {
        return Err(NovoError::config(format!(
            "dataset name '{}' contains unsupported character {:?}",
            name, c
        )));
    }

    if name == "." || name == ".." || name.starts_with('.') {
        return Err(NovoError::config(format!(
            "dataset name '{}' cannot start with '.'",
            name
        )));
    }

    Ok(())
}

fn validate_date_format(format: &str) -> Result<()> {
    if format.is_empty() || StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(NovoError::config(format!("invalid date format '{}'", format)));
    }
    Ok(())
}

// ============================================================================
// Records
// ============================================================================

/// Untyped input row: column name to raw text, `None` meaning null.
///
/// A column missing from the map and a column mapped to `None` are the same
/// thing. `Some("")` is a genuine empty string and is never conflated with null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    fields: BTreeMap<String, Option<String>>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column value, replacing any previous one
    pub fn insert(&mut self, column: impl Into<String>, value: Option<String>) {
        self.fields.insert(column.into(), value);
    }

    /// Builder-style insert
    pub fn with(mut self, column: impl Into<String>, value: Option<&str>) -> Self {
        self.insert(column, value.map(str::to_string));
        self
    }

    /// Value of a column, `None` when null or absent
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).and_then(|v| v.as_deref())
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Option<String>)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, Option<String>)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// A single value after casting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum TypedValue {
    Date(NaiveDate),
    Integer(i64),
    Float(f64),
    String(String),
}

impl TypedValue {
    pub fn column_type(&self) -> ColumnType {
        match self {
            TypedValue::Date(_) => ColumnType::Date,
            TypedValue::Integer(_) => ColumnType::Integer,
            TypedValue::Float(_) => ColumnType::Float,
            TypedValue::String(_) => ColumnType::String,
        }
    }
}

/// Typed output row, positionally aligned with the target schema it was cast
/// against. `None` is an explicit null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedRecord {
    values: Vec<Option<TypedValue>>,
}

impl TypedRecord {
    pub fn new(values: Vec<Option<TypedValue>>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Option<TypedValue>] {
        &self.values
    }

    /// Value at a schema position
    pub fn value(&self, index: usize) -> Option<&TypedValue> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Value of a named column, resolved against the schema used for casting
    pub fn get<'a>(&'a self, schema: &[ColumnSpec], column: &str) -> Option<&'a TypedValue> {
        schema
            .iter()
            .position(|spec| spec.name == column)
            .and_then(|index| self.value(index))
    }
}

// ============================================================================
// State
// ============================================================================

/// Set of identities already processed for one dataset.
///
/// Ordered so that persisted state and test output are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    identities: BTreeSet<Identity>,
}

impl StateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.identities.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.identities.iter()
    }

    /// `self ∪ newly_seen` as a new snapshot
    pub fn merged_with<'a>(&self, newly_seen: impl IntoIterator<Item = &'a Identity>) -> Self {
        let mut identities = self.identities.clone();
        identities.extend(newly_seen.into_iter().copied());
        Self { identities }
    }

    pub fn is_superset(&self, other: &StateSnapshot) -> bool {
        self.identities.is_superset(&other.identities)
    }
}

impl FromIterator<Identity> for StateSnapshot {
    fn from_iter<I: IntoIterator<Item = Identity>>(iter: I) -> Self {
        Self {
            identities: iter.into_iter().collect(),
        }
    }
}
