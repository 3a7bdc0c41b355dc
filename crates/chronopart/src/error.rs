//! Error and Result types for partition maintenance operations.

use thiserror::Error;

/// A convenience `Result` type for chronopart operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for partition maintenance operations.
///
/// Configuration-shaped errors are recoverable values the orchestrator
/// inspects per table; only [`Error::Connect`] aborts a whole run.
#[derive(Debug, Error)]
pub enum Error {
    /// Retention string did not match `<digits><unit>` with unit in h/d/w/m/y.
    #[error("invalid retention string {value:?}: expected <digits><unit> with unit h, d, w, m or y")]
    InvalidRetention {
        /// The rejected retention string.
        value: String,
    },

    /// The same table is configured under more than one granularity.
    #[error("table `{table}` is configured more than once")]
    DuplicateTable {
        /// Name of the duplicated table.
        table: String,
    },

    /// A table was requested that is not part of the configured set.
    #[error("table `{table}` is not in the configured table set")]
    UnconfiguredTable {
        /// Name of the unknown table.
        table: String,
    },

    /// A configured table does not exist in the target schema.
    #[error("table `{table}` does not exist in the target schema")]
    TableNotFound {
        /// Name of the missing table.
        table: String,
    },

    /// Calendar arithmetic left the representable date range.
    #[error("date arithmetic out of range: {0}")]
    DateOutOfRange(String),

    /// Failed to establish the database connection. Always fatal.
    #[error("database connection failed: {0}")]
    Connect(#[source] mysql::Error),

    /// A statement failed against an open connection.
    #[error("statement failed: {source} (statement: {statement})")]
    Statement {
        /// The statement that failed.
        statement: String,
        /// The underlying driver error.
        #[source]
        source: mysql::Error,
    },
}

impl Error {
    /// Returns true for errors raised by the database layer, as opposed to
    /// configuration-shaped errors.
    pub fn is_database(&self) -> bool {
        matches!(self, Error::Connect(_) | Error::Statement { .. })
    }

    /// Returns true if the error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Connect(_))
    }
}
