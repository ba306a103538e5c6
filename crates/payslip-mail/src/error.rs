//! Error types for the mail subsystem.

use payslip_core::ValidationError;
use payslip_security::SecurityError;
use thiserror::Error;

/// Outcome of a remote call that went through retry handling.
#[derive(Error, Debug)]
pub enum RemoteError<E> {
    /// Non-retryable failure, returned on first occurrence
    #[error("remote call failed: {0}")]
    Fatal(#[source] E),

    /// Every attempt failed with a retryable error
    #[error("remote call failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error from the final attempt
        #[source]
        last: E,
    },
}

impl<E> RemoteError<E> {
    /// True for [`RemoteError::Fatal`].
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// The underlying call error.
    pub fn inner(&self) -> &E {
        match self {
            Self::Fatal(e) | Self::RetriesExhausted { last: e, .. } => e,
        }
    }
}

/// Errors returned by a [`MailApi`](crate::MailApi) call.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-success HTTP status
    #[error("Gmail API returned status {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Transport failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("failed to decode Gmail response: {0}")]
    Decode(String),

    /// No usable access token
    #[error("authentication unavailable: {0}")]
    Auth(String),
}

impl ApiError {
    /// Whether the call is worth repeating: throttling, transient server
    /// errors, timeouts and connection failures.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => matches!(status, 429 | 500 | 503),
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Decode(_) | Self::Auth(_) => false,
        }
    }
}

/// Errors from search and download operations.
#[derive(Error, Debug)]
pub enum MailError {
    /// Remote call failed
    #[error(transparent)]
    Remote(#[from] RemoteError<ApiError>),

    /// Downloaded content was rejected
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Secure write or path check failed
    #[error(transparent)]
    Security(#[from] SecurityError),

    /// Attachment payload was not valid base64
    #[error("invalid attachment payload for message {message_id}: {reason}")]
    Payload {
        /// Message the attachment belongs to
        message_id: String,
        /// Decoder error
        reason: String,
    },
}

impl MailError {
    /// True when a remote call failed in a way retrying cannot fix.
    #[must_use]
    pub fn is_fatal_remote(&self) -> bool {
        matches!(self, Self::Remote(e) if e.is_fatal())
    }
}

/// Result type for mail operations.
pub type Result<T> = std::result::Result<T, MailError>;
