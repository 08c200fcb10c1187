//! Novo Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared data model, error handling and logging for the Novo workspace.
//!
//! # Overview
//!
//! - **Types**: dataset descriptors, raw and typed records, state snapshots
//! - **Identity**: the fixed-width digest that names a record across runs
//! - **Error Handling**: the common error type and result alias
//! - **Logging**: tracing subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use novo_common::types::{ColumnSpec, ColumnType, DatasetDescriptor};
//!
//! let descriptor = DatasetDescriptor::new(
//!     "cases",
//!     vec!["country".to_string(), "date".to_string()],
//!     vec![
//!         ColumnSpec::new("country", ColumnType::String),
//!         ColumnSpec::new("date", ColumnType::Date),
//!         ColumnSpec::new("cases", ColumnType::Integer),
//!     ],
//! )?;
//! assert_eq!(descriptor.key_columns().len(), 2);
//! # Ok::<(), novo_common::NovoError>(())
//! ```

pub mod error;
pub mod identity;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{NovoError, Result};
pub use identity::Identity;
