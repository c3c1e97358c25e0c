//! Error types for the fallible seams around the engine.
//!
//! The binding and audit config operations themselves are total; errors only
//! arise when reading or writing policies.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while loading, storing or updating policies.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A policy document could not be parsed or serialized.
    #[error("Invalid policy JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A file system operation failed.
    #[error("Failed to {operation} '{}': {source}", path.display())]
    FileSystem {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The policy changed since it was read; the write was rejected.
    #[error("Concurrent policy change on {resource}: expected etag {expected:?}, found {found:?}")]
    Conflict {
        resource: String,
        expected: String,
        found: String,
    },
}

impl ReconcileError {
    /// Create a file system error with operation context
    pub fn file_system(
        operation: impl Into<String>,
        path: impl AsRef<Path>,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystem {
            operation: operation.into(),
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether the error reports a concurrent modification
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result alias for policy I/O
pub type Result<T> = std::result::Result<T, ReconcileError>;
