use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error type returned by pipeline stages and stores.
///
/// This is a single error enum shared by the registry, the sanitizer, the stores and the
/// orchestrator. Rows with the wrong field count are never reported through it: they are
/// dropped and counted instead (see [`crate::ingestion::sanitize::SanitizeStats`]).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The registry was asked for an unknown table, or a table definition is inconsistent.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The raw snapshot file for a table does not exist.
    #[error("missing input for table '{table}': {}", .path.display())]
    MissingInput { table: String, path: PathBuf },

    /// Underlying I/O error while reading a snapshot or writing a cleaned artifact.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised by the delimited-record reader/writer.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// PostgreSQL driver error (connection, DDL, count query or COPY).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Store-level failure not originating from the PostgreSQL driver.
    #[error("store error on table '{table}': {message}")]
    Store { table: String, message: String },
}

impl PipelineError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn store(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            table: table.into(),
            message: message.into(),
        }
    }
}
