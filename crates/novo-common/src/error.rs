//! Error types for Novo

use thiserror::Error;

/// Result type alias for Novo operations
pub type Result<T> = std::result::Result<T, NovoError>;

/// Main error type for the shared data model
#[derive(Error, Debug)]
pub enum NovoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl NovoError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        NovoError::Config(message.into())
    }
}
