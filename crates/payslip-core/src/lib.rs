//! Payslip Core - Foundation crate for the payslip downloader.
//!
//! This crate provides shared types, error handling and configuration
//! management that all other payslip crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Shared validation and configuration errors
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes (`TaskId`) and timestamp helpers
//!
//! # Example
//!
//! ```rust
//! use payslip_core::AppConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! config.validate()?;
//! assert_eq!(config.gmail.days_back, 30);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, GeneralConfig, GmailConfig, PathsConfig, MAX_DAYS_BACK};
pub use error::{ConfigError, ConfigResult, ValidationError};
pub use types::{format_timestamp, parse_timestamp, TaskId};
