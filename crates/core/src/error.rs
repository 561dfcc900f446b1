//! Error types for ShardDB
//!
//! This module defines the single error type used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ShardDB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for ShardDB
#[derive(Debug, Error)]
pub enum Error {
    /// Database header or other required file not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// More than one database header in the same directory
    #[error("Ambiguous database header: {} candidates in {}", .candidates.len(), .dir.display())]
    AmbiguousHeader {
        /// Directory that was scanned
        dir: PathBuf,
        /// Every matching header file, sorted
        candidates: Vec<PathBuf>,
    },

    /// On-disk version is too far from the running version
    #[error("Incompatible database version {found} (running {running})")]
    VersionIncompatible {
        /// Version recorded in the header
        found: i64,
        /// Version of the running code
        running: i64,
    },

    /// The `collections` directory is missing from the database root
    #[error("Collections directory does not exist: {0}")]
    MissingCollectionsDir(PathBuf),

    /// A collection's files are missing, inconsistent, or undecodable
    #[error("Corrupted collection '{collection}': {reason}")]
    CorruptedCollection {
        /// Collection name
        collection: String,
        /// What was wrong
        reason: String,
    },

    /// A collection with this name is already registered
    #[error("Collection already exists: {0}")]
    AlreadyExists(String),

    /// The registry has no collections
    #[error("Database has no collections")]
    EmptyRegistry,

    /// Collection name cannot be used as a directory name
    #[error("Invalid collection name: {0:?}")]
    InvalidName(String),

    /// A structure type was stored without being registered first
    #[error("Type not registered: {0}")]
    UnregisteredType(String),

    /// Configuration rejected by validation
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Database was written with a different codec than the configured one
    #[error("Codec mismatch: expected {expected}, got {actual}")]
    CodecMismatch {
        /// Codec recorded in the database header
        expected: String,
        /// Codec in the active configuration
        actual: String,
    },

    /// Compression codec error
    #[error("Codec error: {0}")]
    Codec(String),

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a corrupted-collection error
    pub fn corrupted(collection: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::CorruptedCollection {
            collection: collection.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error is a not-found condition
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_io() {
        let err = Error::Io(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        let msg = err.to_string();
        assert!(msg.contains("I/O error"));
    }

    #[test]
    fn test_error_display_version() {
        let err = Error::VersionIncompatible {
            found: 11,
            running: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("11"));
        assert!(msg.contains("running 1"));
    }

    #[test]
    fn test_error_display_corrupted() {
        let err = Error::corrupted("users", "expected 16 shards, found 3");
        let msg = err.to_string();
        assert!(msg.contains("Corrupted collection 'users'"));
        assert!(msg.contains("found 3"));
    }

    #[test]
    fn test_error_display_ambiguous_header() {
        let err = Error::AmbiguousHeader {
            dir: PathBuf::from("/data"),
            candidates: vec![PathBuf::from("/data/a.shardb"), PathBuf::from("/data/b.shardb")],
        };
        assert!(err.to_string().contains("2 candidates"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_from_bincode() {
        let invalid_data = vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let result: Result<String> = bincode::deserialize(&invalid_data).map_err(|e| e.into());
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_error_from_json() {
        let result: Result<u64> = serde_json::from_str("not json").map_err(|e| e.into());
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::NotFound("header".into()).is_not_found());
        assert!(Error::Io(io::Error::new(io::ErrorKind::NotFound, "x")).is_not_found());
        assert!(!Error::EmptyRegistry.is_not_found());
    }
}
