//! Gmail REST API access.
//!
//! [`MailApi`] is the seam between the search client and the network:
//! [`GmailApi`] talks to the real service over `reqwest`, tests substitute
//! their own implementation.

use crate::auth::TokenSource;
use crate::error::ApiError;
use async_trait::async_trait;
use payslip_core::GmailConfig;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// One page of message ids matching a query.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    /// Matching messages; absent in the response when there are none
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    /// Token for the next page, absent on the last one
    pub next_page_token: Option<String>,
}

/// Message id as returned by a listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    /// Message id
    pub id: String,
    /// Thread the message belongs to
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// Full message as returned by `messages.get?format=full`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message id
    pub id: String,
    /// Root MIME part
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

/// A MIME part, possibly containing nested parts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    /// Attachment filename, empty for non-attachment parts
    #[serde(default)]
    pub filename: String,
    /// MIME type of the part
    #[serde(default)]
    pub mime_type: String,
    /// Headers; the root part carries the message headers
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Body reference
    #[serde(default)]
    pub body: PartBody,
    /// Child parts of a multipart container
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl MessagePart {
    /// Value of the first header named `name` (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// A single message header.
#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    /// Header name
    pub name: String,
    /// Header value
    pub value: String,
}

/// Body of a part: either inline data or a reference to an attachment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    /// Id for fetching the attachment content
    #[serde(default)]
    pub attachment_id: Option<String>,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
}

/// Attachment content as returned by `attachments.get`.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentBody {
    /// URL-safe base64 content
    #[serde(default)]
    pub data: String,
    /// Decoded size in bytes
    #[serde(default)]
    pub size: u64,
}

/// The three remote calls the search client needs.
#[async_trait]
pub trait MailApi: Send + Sync {
    /// One page of ids for `query`, continuing from `page_token`.
    async fn list_messages(
        &self,
        query: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<MessagePage, ApiError>;

    /// Full message including headers and MIME structure.
    async fn get_message(&self, message_id: &str) -> Result<Message, ApiError>;

    /// Content of one attachment.
    async fn get_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<AttachmentBody, ApiError>;
}

/// [`MailApi`] over the Gmail REST API.
pub struct GmailApi {
    client: Client,
    base_url: String,
    user_id: String,
    tokens: Box<dyn TokenSource>,
}

impl GmailApi {
    /// Create a client for the API described by `config`.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: &GmailConfig, tokens: impl TokenSource + 'static) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            user_id: config.user_id.clone(),
            tokens: Box::new(tokens),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/users/{}/{path}", self.base_url, self.user_id)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let token = self.tokens.access_token()?;
        let response = request.bearer_auth(token.as_str()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

impl std::fmt::Debug for GmailApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GmailApi")
            .field("base_url", &self.base_url)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MailApi for GmailApi {
    async fn list_messages(
        &self,
        query: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<MessagePage, ApiError> {
        let mut params = vec![("q", query.to_string()), ("maxResults", page_size.to_string())];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let request = self.client.get(self.url("messages")).query(&params);
        self.send(request).await
    }

    async fn get_message(&self, message_id: &str) -> Result<Message, ApiError> {
        let request = self
            .client
            .get(self.url(&format!("messages/{message_id}")))
            .query(&[("format", "full")]);
        self.send(request).await
    }

    async fn get_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<AttachmentBody, ApiError> {
        let request = self.client.get(self.url(&format!(
            "messages/{message_id}/attachments/{attachment_id}"
        )));
        self.send(request).await
    }
}
