//! Mailbox search and attachment download.

use crate::api::{MailApi, MessagePart};
use crate::error::{ApiError, MailError, RemoteError, Result};
use crate::rate_limit::{CallClass, RateLimiter};
use crate::retry::{Classification, RetryExecutor, RetryPolicy};
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate, Utc};
use payslip_core::{GmailConfig, ValidationError};
use payslip_security::{write_secure, PDF_SIGNATURE};
use std::path::{Path, PathBuf};

/// Gmail emits URL-safe base64, with or without padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A PDF attachment found in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentInfo {
    /// Filename as sent, not yet sanitized
    pub filename: String,
    /// Size in bytes as reported by the server
    pub size: u64,
    /// Id for [`SearchClient::download_attachment`]
    pub attachment_id: String,
}

/// A message with at least one PDF attachment.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Message id
    pub message_id: String,
    /// `From` header, `Unknown` when missing
    pub sender: String,
    /// `Subject` header, `No Subject` when missing
    pub subject: String,
    /// Message date, or the time of the search if the header was unusable
    pub date: DateTime<Utc>,
    /// PDF attachments, never empty
    pub attachments: Vec<AttachmentInfo>,
}

/// Build the remote query for PDF mail from `sender` received after `after`.
#[must_use]
pub fn build_query(sender: &str, keywords: Option<&str>, after: NaiveDate) -> String {
    let mut query = format!(
        "from:{sender} has:attachment after:{} filename:pdf",
        after.format("%Y/%m/%d")
    );
    if let Some(keywords) = keywords.map(str::trim).filter(|k| !k.is_empty()) {
        query.push_str(" subject:");
        query.push_str(keywords);
    }
    query
}

/// Parse an RFC 2822 `Date` header, tolerating a trailing `(zone)` comment.
#[must_use]
pub fn parse_message_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let value = match value.rfind(" (") {
        Some(idx) if value.ends_with(')') => &value[..idx],
        _ => value,
    };
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn collect_pdf_parts(part: &MessagePart, out: &mut Vec<AttachmentInfo>) {
    if part.filename.to_lowercase().ends_with(".pdf") {
        match &part.body.attachment_id {
            Some(id) => out.push(AttachmentInfo {
                filename: part.filename.clone(),
                size: part.body.size,
                attachment_id: id.clone(),
            }),
            None => tracing::debug!("Skipping inline PDF part without attachment id"),
        }
    }
    for child in &part.parts {
        collect_pdf_parts(child, out);
    }
}

fn classify(err: &ApiError) -> Classification {
    if err.is_retryable() {
        Classification::Retryable
    } else {
        Classification::Fatal
    }
}

/// Rate-limited, retrying search and download over a [`MailApi`].
pub struct SearchClient<A> {
    api: A,
    limiter: RateLimiter,
    retry: RetryExecutor,
    search_class: CallClass,
    download_class: CallClass,
    page_size: u32,
}

impl<A: MailApi> SearchClient<A> {
    /// Client with default rates (5 searches/s, 3 downloads/s), 5 attempts
    /// per call and 100 ids per page.
    pub fn new(api: A) -> Self {
        Self {
            api,
            limiter: RateLimiter::new(),
            retry: RetryExecutor::default(),
            search_class: CallClass::SEARCH,
            download_class: CallClass::DOWNLOAD,
            page_size: 100,
        }
    }

    /// Client with rates, attempts and page size from `config`.
    pub fn from_config(api: A, config: &GmailConfig) -> Self {
        Self {
            retry: RetryExecutor::new(RetryPolicy::with_max_attempts(config.max_attempts)),
            search_class: CallClass::per_second("search", config.search_calls_per_second),
            download_class: CallClass::per_second("download", config.download_calls_per_second),
            page_size: config.page_size,
            ..Self::new(api)
        }
    }

    /// Replace the retry executor.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }

    /// The underlying API.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// PDF-bearing messages from `sender` in the last `days_back` days.
    ///
    /// Messages whose details cannot be fetched after retrying are skipped;
    /// a fatal error aborts the whole search. A `days_back` reaching past the
    /// supported calendar fails with [`ValidationError::Value`].
    pub async fn search(
        &self,
        sender: &str,
        keywords: Option<&str>,
        days_back: u32,
    ) -> Result<Vec<SearchResult>> {
        let after = ChronoDuration::try_days(i64::from(days_back))
            .and_then(|window| Local::now().checked_sub_signed(window))
            .ok_or_else(|| ValidationError::Value {
                field: "days_back",
                reason: format!("{days_back} days reaches before the earliest supported date"),
            })?
            .date_naive();
        let query = build_query(sender, keywords, after);
        tracing::info!(%sender, days_back, "Searching mailbox");
        tracing::debug!(%query, "Search query");

        let ids = self.list_all(&query).await?;
        tracing::info!(count = ids.len(), "Found matching messages");

        let mut results = Vec::new();
        for id in &ids {
            match self.fetch_details(id).await {
                Ok(Some(result)) => results.push(result),
                Ok(None) => tracing::debug!(message_id = %id, "No PDF attachments"),
                Err(e @ RemoteError::RetriesExhausted { .. }) => {
                    tracing::warn!(message_id = %id, "Skipping message: {}", e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(count = results.len(), "Messages with PDF attachments");
        Ok(results)
    }

    async fn list_all(&self, query: &str) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = page_token.as_deref();
            let page = self
                .retry
                .execute(
                    "messages.list",
                    move || {
                        self.limiter.throttle(self.search_class, move || {
                            self.api.list_messages(query, token, self.page_size)
                        })
                    },
                    classify,
                )
                .await?;

            ids.extend(page.messages.into_iter().map(|m| m.id));
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(ids)
    }

    async fn fetch_details(
        &self,
        message_id: &str,
    ) -> std::result::Result<Option<SearchResult>, RemoteError<ApiError>> {
        let message = self
            .retry
            .execute(
                "messages.get",
                move || {
                    self.limiter
                        .throttle(self.search_class, move || self.api.get_message(message_id))
                },
                classify,
            )
            .await?;

        let Some(payload) = message.payload else {
            return Ok(None);
        };

        let mut attachments = Vec::new();
        collect_pdf_parts(&payload, &mut attachments);
        if attachments.is_empty() {
            return Ok(None);
        }

        let date = payload
            .header("Date")
            .and_then(parse_message_date)
            .unwrap_or_else(Utc::now);

        Ok(Some(SearchResult {
            message_id: message_id.to_string(),
            sender: payload.header("From").unwrap_or("Unknown").to_string(),
            subject: payload.header("Subject").unwrap_or("No Subject").to_string(),
            date,
            attachments,
        }))
    }

    /// Download one attachment to `destination`.
    ///
    /// The payload must start with the PDF signature; anything else is
    /// rejected before touching `destination`. Accepted files are written
    /// owner-only.
    pub async fn download_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
        destination: &Path,
    ) -> Result<PathBuf> {
        tracing::info!(%message_id, "Downloading attachment");

        let body = self
            .retry
            .execute(
                "attachments.get",
                move || {
                    self.limiter.throttle(self.download_class, move || {
                        self.api.get_attachment(message_id, attachment_id)
                    })
                },
                classify,
            )
            .await?;

        let bytes = URL_SAFE_LENIENT
            .decode(body.data.as_bytes())
            .map_err(|e| MailError::Payload {
                message_id: message_id.to_string(),
                reason: e.to_string(),
            })?;

        if !bytes.starts_with(PDF_SIGNATURE) {
            tracing::warn!(path = %destination.display(), "Rejected non-PDF attachment");
            return Err(ValidationError::NotAPdf {
                path: destination.to_path_buf(),
            }
            .into());
        }

        write_secure(destination, &bytes)?;

        tracing::info!(
            path = %destination.display(),
            bytes = bytes.len(),
            "Downloaded attachment"
        );
        Ok(destination.to_path_buf())
    }
}

impl<A> std::fmt::Debug for SearchClient<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchClient")
            .field("search_class", &self.search_class)
            .field("download_class", &self.download_class)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}
