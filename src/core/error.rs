//! Error types for the vigil library.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using vigil's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading data or computing reports.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found.
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The data source failed while paging records.
    #[error("Data source error on {table}: {message}")]
    Source { table: String, message: String },

    /// Paging did not reach a short page within the configured budget.
    #[error("Page budget exhausted for {table} after {pages} pages")]
    PageBudget { table: String, pages: usize },

    /// Service registry could not be loaded.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Create a new data source error.
    pub fn source(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a new config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new registry error.
    pub fn registry(message: impl Into<String>) -> Self {
        Self::Registry(message.into())
    }
}
