//! Ingestion error types
//!
//! Every variant names the dataset it belongs to so that a batch of runs can
//! report failures per dataset without losing context.

use novo_common::NovoError;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors that abort a dataset run
#[derive(Error, Debug)]
pub enum IngestError {
    /// Invalid dataset declaration or settings; raised before any I/O
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// State resource exists but cannot be interpreted
    #[error("State for dataset '{dataset}' is corrupt: {reason}")]
    StateCorrupt { dataset: String, reason: String },

    /// State resource could not be read for a reason other than absence
    #[error("Failed to read state for dataset '{dataset}': {source}")]
    StateIo {
        dataset: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read raw records for dataset '{dataset}': {reason}")]
    Read { dataset: String, reason: String },

    #[error("Failed to write data for dataset '{dataset}': {reason}")]
    DataWrite { dataset: String, reason: String },

    #[error("Failed to write state for dataset '{dataset}': {reason}")]
    StateWrite { dataset: String, reason: String },

    /// The worker running the dataset died before reporting a result
    #[error("Worker for dataset '{dataset}' failed: {reason}")]
    Worker { dataset: String, reason: String },

    /// Shared data-model error that is not about configuration
    #[error(transparent)]
    Common(NovoError),
}

impl IngestError {
    pub fn configuration(message: impl Into<String>) -> Self {
        IngestError::Configuration(message.into())
    }

    pub fn read(dataset: &str, reason: impl std::fmt::Display) -> Self {
        IngestError::Read {
            dataset: dataset.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn data_write(dataset: &str, reason: impl std::fmt::Display) -> Self {
        IngestError::DataWrite {
            dataset: dataset.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn state_write(dataset: &str, reason: impl std::fmt::Display) -> Self {
        IngestError::StateWrite {
            dataset: dataset.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn state_corrupt(dataset: &str, reason: impl std::fmt::Display) -> Self {
        IngestError::StateCorrupt {
            dataset: dataset.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Errors raised before the run touched any resource
    pub fn is_fatal_config(&self) -> bool {
        matches!(self, IngestError::Configuration(_))
    }
}

impl From<NovoError> for IngestError {
    fn from(err: NovoError) -> Self {
        match err {
            NovoError::Config(message) => IngestError::Configuration(message),
            other => IngestError::Common(other),
        }
    }
}
