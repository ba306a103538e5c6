//! Core error types for the payslip downloader.
//!
//! Validation and configuration errors shared by every payslip crate.

use std::path::PathBuf;
use thiserror::Error;

/// Input that failed a syntactic or content check.
///
/// Validation failures are always surfaced to the caller and never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Schedule expression does not have exactly five fields
    #[error("invalid schedule format: expected 5 fields, got {found} (format: 'minute hour day month weekday')")]
    FieldCount {
        /// Number of whitespace-separated fields found
        found: usize,
    },

    /// A schedule field is out of range or not numeric
    #[error("invalid {field} value '{value}': must be '*' or {min}-{max}")]
    Field {
        /// Field name (minute, hour, day, month, weekday)
        field: &'static str,
        /// Offending token
        value: String,
        /// Lowest accepted value
        min: u32,
        /// Highest accepted value
        max: u32,
    },

    /// Email address is malformed
    #[error("invalid email address '{address}': {reason}")]
    Email {
        /// The rejected address
        address: String,
        /// What was wrong with it
        reason: &'static str,
    },

    /// A downloaded payload does not carry the PDF signature
    #[error("downloaded file is not a valid PDF: {}", path.display())]
    NotAPdf {
        /// Destination the payload was meant for (left untouched)
        path: PathBuf,
    },

    /// Any other rejected input value
    #[error("invalid {field}: {reason}")]
    Value {
        /// Name of the input
        field: &'static str,
        /// Reason for rejection
        reason: String,
    },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
