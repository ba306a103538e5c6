//! Access tokens for the Gmail API.
//!
//! Obtaining and refreshing OAuth tokens is done by an external setup tool;
//! this module only reads what it left on disk.

use crate::error::ApiError;
use payslip_security::require_secure_permissions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Supplies the bearer token for each API request.
pub trait TokenSource: Send + Sync {
    /// Current access token.
    fn access_token(&self) -> Result<Zeroizing<String>, ApiError>;
}

/// A fixed token, for tests and short-lived tools.
pub struct StaticToken(Zeroizing<String>);

impl StaticToken {
    /// Wrap `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

impl TokenSource for StaticToken {
    fn access_token(&self) -> Result<Zeroizing<String>, ApiError> {
        Ok(self.0.clone())
    }
}

#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
struct StoredCredentials {
    #[serde(alias = "token")]
    access_token: String,
}

/// Token read from a JSON credentials file on every request, so an
/// external refresher can rotate it between calls.
///
/// The file must not be readable by group or others.
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    /// Source backed by the file at `path`. Nothing is read until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the credentials file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenSource for TokenFile {
    fn access_token(&self) -> Result<Zeroizing<String>, ApiError> {
        require_secure_permissions(&self.path).map_err(|e| ApiError::Auth(e.to_string()))?;

        let raw = Zeroizing::new(std::fs::read_to_string(&self.path).map_err(|e| {
            ApiError::Auth(format!("cannot read {}: {e}", self.path.display()))
        })?);
        let creds: StoredCredentials = serde_json::from_str(&raw).map_err(|e| {
            ApiError::Auth(format!("malformed token file {}: {e}", self.path.display()))
        })?;

        if creds.access_token.is_empty() {
            return Err(ApiError::Auth(format!(
                "token file {} has an empty access token",
                self.path.display()
            )));
        }
        Ok(Zeroizing::new(creds.access_token.clone()))
    }
}
