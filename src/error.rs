//! Error types for the media indexer

use std::path::PathBuf;
use thiserror::Error;

/// Error kinds that can occur while indexing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexErrorKind {
    /// Permission denied when accessing a file or directory
    PermissionDenied,
    /// File or directory not found
    NotFound,
    /// I/O error during file operations
    Io,
    /// Catalog store operation failed
    Database,
    /// Metadata resolution failed
    Metadata,
    /// Invalid path encoding
    InvalidPath,
    /// Unknown error
    Unknown,
}

/// Represents an error that occurred while indexing
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message} (path: {path:?})")]
pub struct IndexError {
    /// The kind of error
    pub kind: IndexErrorKind,
    /// The path where the error occurred
    pub path: Option<PathBuf>,
    /// Human-readable error message
    pub message: String,
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    /// Create a new error
    pub fn new(kind: IndexErrorKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(path: PathBuf) -> Self {
        Self::new(
            IndexErrorKind::NotFound,
            Some(path.clone()),
            format!("Not found: {:?}", path),
        )
    }

    /// Create an I/O error
    pub fn io_error(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(IndexErrorKind::Io, path, message)
    }

    /// Create a database error
    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(IndexErrorKind::Database, None, message)
    }

    /// Create a metadata resolution error
    pub fn metadata_error(path: PathBuf, message: impl Into<String>) -> Self {
        Self::new(IndexErrorKind::Metadata, Some(path), message)
    }

    /// Create an invalid path error
    pub fn invalid_path(path: PathBuf) -> Self {
        Self::new(
            IndexErrorKind::InvalidPath,
            Some(path.clone()),
            format!("Path is not valid UTF-8: {:?}", path),
        )
    }

    /// Attach a path to an error that does not carry one yet
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        if self.path.is_none() {
            self.path = Some(path.into());
        }
        self
    }
}

impl From<std::io::Error> for IndexError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::PermissionDenied => IndexErrorKind::PermissionDenied,
            std::io::ErrorKind::NotFound => IndexErrorKind::NotFound,
            _ => IndexErrorKind::Io,
        };
        Self::new(kind, None, err.to_string())
    }
}

impl From<rusqlite::Error> for IndexError {
    fn from(err: rusqlite::Error) -> Self {
        Self::database_error(err.to_string())
    }
}

impl From<walkdir::Error> for IndexError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf());
        let kind = match err.io_error().map(|e| e.kind()) {
            Some(std::io::ErrorKind::PermissionDenied) => IndexErrorKind::PermissionDenied,
            Some(std::io::ErrorKind::NotFound) => IndexErrorKind::NotFound,
            Some(_) => IndexErrorKind::Io,
            None => IndexErrorKind::Unknown,
        };
        Self::new(kind, path, err.to_string())
    }
}
