//! Novo Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Deterministic incremental ingestion: every run persists exactly the records
//! not seen by an earlier run, typed against a strict schema.
//!
//! # Pipeline
//!
//! - **Identity**: [`hasher`] digests the key columns of each raw record
//! - **State**: [`state`] keeps the set of identities already ingested
//! - **Novelty**: [`novelty`] drops records whose identity is known
//! - **Casting**: [`caster`] types the survivors just before persistence
//! - **Engines**: [`engine`] runs the work sequentially or partition-parallel
//! - **Orchestration**: [`ingestor`] ties the phases together per dataset
//!
//! # Example
//!
//! ```no_run
//! use novo_ingest::engine::LocalEngine;
//! use novo_ingest::ingestor::{DatasetJob, Ingestor};
//! use novo_ingest::state::ParquetStateStore;
//! use novo_common::types::{ColumnSpec, ColumnType, DatasetDescriptor};
//! use std::sync::Arc;
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
//!
//! let ingestor = Ingestor::new(
//!     Arc::new(LocalEngine::new("./data/typed")),
//!     Arc::new(ParquetStateStore::new("./data/state")),
//! );
//! let summary = ingestor.run(&DatasetJob::new(descriptor, "./data/raw/cases.csv"))?;
//! println!("{} novel of {}", summary.total_novel, summary.total_read);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod caster;
pub mod catalog;
pub mod cli;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod ingestor;
pub mod novelty;
pub mod reader;
pub mod settings;
pub mod sink;
pub mod state;

pub use engine::{Engine, EngineKind};
pub use error::{IngestError, Result};
pub use hasher::IdentityHasher;
pub use ingestor::{run_all, DatasetJob, DatasetOutcome, Ingestor, RunSummary};
pub use state::{ParquetStateStore, StateStore};
