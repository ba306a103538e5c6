//! Error types for the task store.

use payslip_core::ValidationError;
use payslip_security::SecurityError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in task store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No task with the given id exists
    #[error("task not found: {id}")]
    NotFound {
        /// The id that was looked up
        id: String,
    },

    /// The store file exists but cannot be trusted. Never repaired automatically.
    #[error("corrupted task store {}: {reason}", path.display())]
    Corrupted {
        /// Path of the store file
        path: PathBuf,
        /// What failed to parse or validate
        reason: String,
    },

    /// Reading the store or its lock file failed
    #[error("I/O error on {} while {action}: {source}", path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// What the store was doing
        action: &'static str,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Writing the store file failed
    #[error("failed to write task store: {0}")]
    Write(#[source] SecurityError),

    /// Another process held the store lock for too long
    #[error("timed out after {waited:?} waiting for lock on {}", path.display())]
    LockTimeout {
        /// Lock file path
        path: PathBuf,
        /// How long we waited
        waited: Duration,
    },

    /// Rejected input (schedule expression or sender address)
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Coarse classification of [`StoreError`] for callers deciding how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Normal failure result: the task does not exist
    NotFound,
    /// Fatal: the store must be inspected by a human
    Corrupted,
    /// Disk or lock failure, surfaced with context
    IoFailure,
    /// The caller supplied invalid input
    Validation,
}

impl StoreError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            Self::NotFound { .. } => StoreErrorKind::NotFound,
            Self::Corrupted { .. } => StoreErrorKind::Corrupted,
            Self::Io { .. } | Self::Write(_) | Self::LockTimeout { .. } => {
                StoreErrorKind::IoFailure
            }
            Self::Validation(_) => StoreErrorKind::Validation,
        }
    }

    pub(crate) fn not_found(id: &str) -> Self {
        Self::NotFound { id: id.to_string() }
    }
}

/// Result type for task store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
