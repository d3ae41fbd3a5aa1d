// Library error types
// Store, import and configuration failures, each with its own enum

use thiserror::Error;

/// Errors raised by the relational store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[cfg(feature = "server")]
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

impl StoreError {
    pub fn not_found(message: impl Into<String>) -> Self {
        StoreError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        StoreError::Conflict(message.into())
    }
}

/// Errors that abort a whole CSV import. Bad rows never land here, they
/// are reported as skipped.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to read CSV input: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to open CSV file: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::Store(StoreError::Sqlite(err))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}
