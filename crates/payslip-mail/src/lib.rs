//! Payslip Mail - mailbox search and attachment download.
//!
//! Finds messages from a sender that carry PDF attachments and downloads
//! those attachments safely.
//!
//! # Features
//!
//! - **Pagination**: follows result pages until the listing is exhausted
//! - **Rate Limiting**: independent budgets for search and download calls
//! - **Retries**: exponential backoff with jitter for throttling and
//!   transient server errors; permanent errors surface immediately
//! - **Safe Writes**: owner-only atomic files, rejected unless they carry
//!   the PDF signature
//!
//! # Example
//!
//! ```no_run
//! use payslip_core::GmailConfig;
//! use payslip_mail::{GmailApi, SearchClient, TokenFile};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GmailConfig::default();
//! let api = GmailApi::new(&config, TokenFile::new("/home/me/.local/share/payslip/credentials/token.json"))?;
//! let client = SearchClient::from_config(api, &config);
//!
//! for message in client.search("payroll@company.com", Some("payslip"), 30).await? {
//!     for attachment in &message.attachments {
//!         let target = Path::new("/tmp").join(&attachment.filename);
//!         client
//!             .download_attachment(&message.message_id, &attachment.attachment_id, &target)
//!             .await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod api;
pub mod auth;
pub mod client;
pub mod error;
pub mod rate_limit;
pub mod retry;

pub use api::{
    AttachmentBody, GmailApi, Header, MailApi, Message, MessagePage, MessagePart, MessageRef,
    PartBody,
};
pub use auth::{StaticToken, TokenFile, TokenSource};
pub use client::{build_query, parse_message_date, AttachmentInfo, SearchClient, SearchResult};
pub use error::{ApiError, MailError, RemoteError, Result};
pub use rate_limit::{CallClass, RateLimiter};
pub use retry::{Classification, RetryExecutor, RetryPolicy, Sleeper, TokioSleeper};
