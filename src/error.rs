//! Error types for the onion-index library.
//!
//! Every fallible operation returns [`Result`], whose error side is the single
//! [`OnionIndexError`] enum. Each variant corresponds to one failure kind an
//! operator has to tell apart: lifecycle misuse, lock contention, schema or
//! query mistakes, an unreadable index, a malformed URL, or an underlying
//! storage failure.
//!
//! # Examples
//!
//! ```
//! use onion_index::error::{OnionIndexError, Result};
//!
//! fn parse_limit(raw: &str) -> Result<usize> {
//!     raw.parse()
//!         .map_err(|e| OnionIndexError::query_syntax(format!("invalid limit {raw:?}: {e}")))
//! }
//!
//! assert!(parse_limit("ten").is_err());
//! ```

use std::io;

use thiserror::Error;

/// The main error type for onion-index operations.
#[derive(Error, Debug)]
pub enum OnionIndexError {
    /// `init` was called on a manager that is already open.
    #[error("Already initialized: {0}")]
    AlreadyInitialized(String),

    /// An operation needed an open index and none was available.
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    /// Another process (or handle) holds the index directory lock.
    #[error("Lock contention: {0}")]
    LockContention(String),

    /// A value did not fit the field it was assigned to.
    #[error("Schema error: {0}")]
    Schema(String),

    /// The query text could not be parsed.
    #[error("Query syntax error: {0}")]
    QuerySyntax(String),

    /// The committed index could not be opened or read.
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// A URL could not be parsed or has no host component.
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),

    /// I/O failure from the index directory or the datastore.
    #[error("Storage I/O error: {0}")]
    StorageIo(String),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for operations that may fail with [`OnionIndexError`].
pub type Result<T> = std::result::Result<T, OnionIndexError>;

impl OnionIndexError {
    /// Create a new already-initialized error.
    pub fn already_initialized<S: Into<String>>(msg: S) -> Self {
        OnionIndexError::AlreadyInitialized(msg.into())
    }

    /// Create a new not-initialized error.
    pub fn not_initialized<S: Into<String>>(msg: S) -> Self {
        OnionIndexError::NotInitialized(msg.into())
    }

    /// Create a new lock contention error.
    pub fn lock_contention<S: Into<String>>(msg: S) -> Self {
        OnionIndexError::LockContention(msg.into())
    }

    /// Create a new schema error.
    pub fn schema<S: Into<String>>(msg: S) -> Self {
        OnionIndexError::Schema(msg.into())
    }

    /// Create a new query syntax error.
    pub fn query_syntax<S: Into<String>>(msg: S) -> Self {
        OnionIndexError::QuerySyntax(msg.into())
    }

    /// Create a new index-unavailable error.
    pub fn index_unavailable<S: Into<String>>(msg: S) -> Self {
        OnionIndexError::IndexUnavailable(msg.into())
    }

    /// Create a new malformed URL error.
    pub fn malformed_url<S: Into<String>>(msg: S) -> Self {
        OnionIndexError::MalformedUrl(msg.into())
    }

    /// Create a new storage I/O error.
    pub fn storage_io<S: Into<String>>(msg: S) -> Self {
        OnionIndexError::StorageIo(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        OnionIndexError::Config(msg.into())
    }

    /// Prefix the message with the name of the operation that failed,
    /// keeping the variant intact.
    pub fn during(self, operation: &str) -> Self {
        use OnionIndexError::*;
        match self {
            AlreadyInitialized(m) => AlreadyInitialized(format!("{operation}: {m}")),
            NotInitialized(m) => NotInitialized(format!("{operation}: {m}")),
            LockContention(m) => LockContention(format!("{operation}: {m}")),
            Schema(m) => Schema(format!("{operation}: {m}")),
            QuerySyntax(m) => QuerySyntax(format!("{operation}: {m}")),
            IndexUnavailable(m) => IndexUnavailable(format!("{operation}: {m}")),
            MalformedUrl(m) => MalformedUrl(format!("{operation}: {m}")),
            StorageIo(m) => StorageIo(format!("{operation}: {m}")),
            Config(m) => Config(format!("{operation}: {m}")),
        }
    }
}

impl From<io::Error> for OnionIndexError {
    fn from(err: io::Error) -> Self {
        OnionIndexError::StorageIo(err.to_string())
    }
}

impl From<bincode::Error> for OnionIndexError {
    fn from(err: bincode::Error) -> Self {
        OnionIndexError::StorageIo(format!("segment encoding: {err}"))
    }
}

impl From<serde_json::Error> for OnionIndexError {
    fn from(err: serde_json::Error) -> Self {
        OnionIndexError::StorageIo(format!("commit point encoding: {err}"))
    }
}

impl From<sqlx::Error> for OnionIndexError {
    fn from(err: sqlx::Error) -> Self {
        OnionIndexError::StorageIo(format!("datastore: {err}"))
    }
}

impl From<toml::de::Error> for OnionIndexError {
    fn from(err: toml::de::Error) -> Self {
        OnionIndexError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = OnionIndexError::schema("Test schema error");
        assert_eq!(error.to_string(), "Schema error: Test schema error");

        let error = OnionIndexError::lock_contention("index held elsewhere");
        assert_eq!(error.to_string(), "Lock contention: index held elsewhere");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = OnionIndexError::from(io_error);

        match error {
            OnionIndexError::StorageIo(msg) => assert!(msg.contains("File not found")),
            _ => panic!("Expected StorageIo variant"),
        }
    }

    #[test]
    fn test_during_keeps_variant() {
        let error = OnionIndexError::storage_io("disk full").during("persist");
        match error {
            OnionIndexError::StorageIo(msg) => assert_eq!(msg, "persist: disk full"),
            _ => panic!("Expected StorageIo variant"),
        }
    }
}
