//! Payslip Security - hardened filesystem primitives.
//!
//! Everything that touches disk with sensitive or untrusted data goes
//! through this crate:
//!
//! - Owner-only (0600), atomic file writes for the task store and tokens
//! - Permission checks for credential files
//! - Filename sanitization and root-confined path joins for attachments
//! - PDF signature checks for downloaded content
//! - Credential redaction for log output
//!
//! # Example
//!
//! ```no_run
//! use payslip_security::{secure_join, write_secure, verify_secure_permissions};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let target = secure_join(Path::new("/home/me/Payslips/2025"), &["Nov payslip.pdf"])?;
//! write_secure(&target, b"%PDF-1.7 ...")?;
//! assert!(verify_secure_permissions(&target));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod file;
pub mod path;
pub mod redact;

pub use error::{Result, SecurityError};
pub use file::{
    is_pdf, require_secure_permissions, verify_secure_permissions, write_secure, PDF_SIGNATURE,
};
pub use path::{sanitize_filename, secure_join, MAX_FILENAME_BYTES, PLACEHOLDER_NAME};
pub use redact::{redact, RedactingWriter};
