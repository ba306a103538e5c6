//! Error types for the security module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by security checks and hardened file operations.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// A joined path resolved outside of its intended root.
    #[error("path traversal detected: {} is outside {}", path.display(), root.display())]
    PathTraversal {
        /// The offending path
        path: PathBuf,
        /// The root it must stay within
        root: PathBuf,
    },

    /// A sensitive file is readable or writable by group/other.
    #[error("insecure permissions on {}: mode {mode:o}", path.display())]
    InsecurePermissions {
        /// The offending file
        path: PathBuf,
        /// Its permission bits
        mode: u32,
    },

    /// Filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being operated on
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl SecurityError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for security operations.
pub type Result<T> = std::result::Result<T, SecurityError>;
