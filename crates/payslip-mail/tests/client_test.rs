use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use payslip_core::ValidationError;
use payslip_mail::{
    ApiError, AttachmentBody, MailApi, MailError, Message, MessagePage, RemoteError, SearchClient,
};
use payslip_security::verify_secure_permissions;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Default)]
struct FakeMailbox {
    pages: Vec<MessagePage>,
    messages: HashMap<String, Message>,
    failing: HashMap<String, u16>,
    attachments: HashMap<String, String>,
    list_calls: Mutex<Vec<(String, Option<String>)>>,
    detail_calls: Mutex<Vec<String>>,
}

impl FakeMailbox {
    fn page(ids: &[&str], next: Option<&str>) -> MessagePage {
        serde_json::from_value(json!({
            "messages": ids.iter().map(|id| json!({"id": id, "threadId": id})).collect::<Vec<_>>(),
            "nextPageToken": next,
        }))
        .expect("valid page")
    }

    fn with_message(mut self, id: &str, payload: serde_json::Value) -> Self {
        let message = serde_json::from_value(json!({"id": id, "payload": payload}))
            .expect("valid message");
        self.messages.insert(id.to_string(), message);
        self
    }

    fn with_attachment(mut self, id: &str, content: &[u8]) -> Self {
        self.attachments
            .insert(id.to_string(), URL_SAFE.encode(content));
        self
    }

    fn detail_calls(&self) -> Vec<String> {
        self.detail_calls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl MailApi for FakeMailbox {
    async fn list_messages(
        &self,
        query: &str,
        page_token: Option<&str>,
        _page_size: u32,
    ) -> Result<MessagePage, ApiError> {
        self.list_calls
            .lock()
            .expect("lock")
            .push((query.to_string(), page_token.map(str::to_string)));
        let index = match page_token {
            None => 0,
            Some(token) => token
                .trim_start_matches("page-")
                .parse::<usize>()
                .expect("page token"),
        };
        Ok(self.pages.get(index).cloned().unwrap_or_default())
    }

    async fn get_message(&self, message_id: &str) -> Result<Message, ApiError> {
        self.detail_calls
            .lock()
            .expect("lock")
            .push(message_id.to_string());
        if let Some(status) = self.failing.get(message_id) {
            return Err(ApiError::Status {
                status: *status,
                message: "simulated".to_string(),
            });
        }
        self.messages
            .get(message_id)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                message: "not found".to_string(),
            })
    }

    async fn get_attachment(
        &self,
        _message_id: &str,
        attachment_id: &str,
    ) -> Result<AttachmentBody, ApiError> {
        self.attachments
            .get(attachment_id)
            .map(|data| AttachmentBody {
                data: data.clone(),
                size: 0,
            })
            .ok_or_else(|| ApiError::Status {
                status: 404,
                message: "not found".to_string(),
            })
    }
}

fn pdf_message(filename: &str, attachment_id: &str) -> serde_json::Value {
    json!({
        "mimeType": "multipart/mixed",
        "headers": [
            {"name": "From", "value": "Payroll <payroll@company.com>"},
            {"name": "Subject", "value": "Your payslip"},
            {"name": "Date", "value": "Tue, 11 Nov 2025 09:15:00 +0000"}
        ],
        "parts": [
            {"mimeType": "text/plain", "filename": "", "body": {"size": 5}},
            {"mimeType": "application/pdf", "filename": filename,
             "body": {"attachmentId": attachment_id, "size": 1024}}
        ]
    })
}

fn mailbox() -> FakeMailbox {
    let mut mailbox = FakeMailbox::default()
        .with_message("m1", pdf_message("Nov.pdf", "a1"))
        .with_message(
            "m2",
            json!({
                "headers": [{"name": "From", "value": "payroll@company.com"}],
                "parts": [{"mimeType": "text/plain", "filename": "notes.txt", "body": {"attachmentId": "t1"}}]
            }),
        )
        .with_message(
            "m3",
            json!({
                "headers": [],
                "parts": [{
                    "mimeType": "multipart/mixed",
                    "parts": [{"filename": "Dec.PDF", "body": {"attachmentId": "a3", "size": 2048}}]
                }]
            }),
        );
    mailbox.pages = vec![
        FakeMailbox::page(&["m1", "m2"], Some("page-1")),
        FakeMailbox::page(&["m3"], None),
    ];
    mailbox
}

#[tokio::test(start_paused = true)]
async fn test_search_follows_pages_and_filters_pdfs() {
    let client = SearchClient::new(mailbox());

    let results = client
        .search("payroll@company.com", Some("payslip"), 30)
        .await
        .expect("search");

    let ids: Vec<&str> = results.iter().map(|r| r.message_id.as_str()).collect();
    assert_eq!(ids, ["m1", "m3"]);

    let first = &results[0];
    assert_eq!(first.sender, "Payroll <payroll@company.com>");
    assert_eq!(first.subject, "Your payslip");
    assert_eq!(first.date.to_rfc3339(), "2025-11-11T09:15:00+00:00");
    assert_eq!(first.attachments[0].filename, "Nov.pdf");
    assert_eq!(first.attachments[0].attachment_id, "a1");
    assert_eq!(first.attachments[0].size, 1024);

    let nested = &results[1];
    assert_eq!(nested.sender, "Unknown");
    assert_eq!(nested.subject, "No Subject");
    assert_eq!(nested.attachments[0].filename, "Dec.PDF");

    let calls = client.api().list_calls.lock().expect("lock").clone();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1, None);
    assert_eq!(calls[1].1.as_deref(), Some("page-1"));
    assert!(calls[0].0.starts_with("from:payroll@company.com has:attachment after:"));
    assert!(calls[0].0.ends_with("filename:pdf subject:payslip"));
}

#[tokio::test(start_paused = true)]
async fn test_search_calls_are_rate_limited() {
    let client = SearchClient::new(mailbox());
    let start = Instant::now();

    client
        .search("payroll@company.com", None, 30)
        .await
        .expect("search");

    // 2 list pages + 3 detail fetches share the 200ms search budget
    assert!(start.elapsed() >= Duration::from_millis(800));
}

#[tokio::test(start_paused = true)]
async fn test_search_rejects_window_past_calendar() {
    let client = SearchClient::new(mailbox());

    let err = client
        .search("payroll@company.com", None, 100_000_000)
        .await
        .expect_err("window too large");

    assert!(matches!(
        err,
        MailError::Validation(ValidationError::Value { field: "days_back", .. })
    ));
    assert!(client.api().list_calls.lock().expect("lock").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_search_skips_message_when_retries_exhausted() {
    let mut mailbox = mailbox();
    mailbox.failing.insert("m1".to_string(), 503);
    let client = SearchClient::new(mailbox);

    let results = client
        .search("payroll@company.com", None, 30)
        .await
        .expect("search continues");

    let ids: Vec<&str> = results.iter().map(|r| r.message_id.as_str()).collect();
    assert_eq!(ids, ["m3"]);
    let attempts = client
        .api()
        .detail_calls()
        .iter()
        .filter(|id| id.as_str() == "m1")
        .count();
    assert_eq!(attempts, 5);
}

#[tokio::test(start_paused = true)]
async fn test_search_aborts_on_fatal_error() {
    let mut mailbox = mailbox();
    mailbox.failing.insert("m2".to_string(), 401);
    let client = SearchClient::new(mailbox);

    let err = client
        .search("payroll@company.com", None, 30)
        .await
        .expect_err("fatal");

    assert!(err.is_fatal_remote());
    assert!(matches!(
        err,
        MailError::Remote(RemoteError::Fatal(ApiError::Status { status: 401, .. }))
    ));
    // m3 never fetched, m2 tried exactly once
    assert_eq!(client.api().detail_calls(), ["m1", "m2"]);
}

#[tokio::test(start_paused = true)]
async fn test_download_writes_owner_only_pdf() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("2025").join("Nov.pdf");
    let client = SearchClient::new(mailbox().with_attachment("a1", b"%PDF-1.7\n%test"));

    let path = client
        .download_attachment("m1", "a1", &target)
        .await
        .expect("download");

    assert_eq!(path, target);
    assert_eq!(std::fs::read(&target).expect("read"), b"%PDF-1.7\n%test");
    assert!(verify_secure_permissions(&target));
}

#[tokio::test(start_paused = true)]
async fn test_download_rejects_non_pdf() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("fake.pdf");
    let client = SearchClient::new(mailbox().with_attachment("a1", b"<html>phish</html>"));

    let err = client
        .download_attachment("m1", "a1", &target)
        .await
        .expect_err("not a pdf");

    assert!(matches!(
        err,
        MailError::Validation(ValidationError::NotAPdf { .. })
    ));
    assert!(!target.exists());
}

#[tokio::test(start_paused = true)]
async fn test_download_rejection_keeps_existing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("Nov.pdf");
    std::fs::write(&target, b"%PDF-1.4\n%original").expect("seed");
    let client = SearchClient::new(mailbox().with_attachment("a1", b"<html>phish</html>"));

    let err = client
        .download_attachment("m1", "a1", &target)
        .await
        .expect_err("not a pdf");

    assert!(matches!(
        err,
        MailError::Validation(ValidationError::NotAPdf { .. })
    ));
    assert_eq!(std::fs::read(&target).expect("read"), b"%PDF-1.4\n%original");
}

#[tokio::test(start_paused = true)]
async fn test_downloads_use_download_rate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let client = SearchClient::new(
        mailbox()
            .with_attachment("a1", b"%PDF-1.7\n%one")
            .with_attachment("a2", b"%PDF-1.7\n%two"),
    );

    let start = Instant::now();
    client
        .download_attachment("m1", "a1", &dir.path().join("one.pdf"))
        .await
        .expect("first download");
    let first_done = start.elapsed();
    client
        .download_attachment("m1", "a2", &dir.path().join("two.pdf"))
        .await
        .expect("second download");

    // 3 downloads per second, stricter than the 200ms search interval
    assert!(start.elapsed() - first_done >= Duration::from_millis(334));
}

#[tokio::test(start_paused = true)]
async fn test_download_rejects_bad_payload() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("broken.pdf");
    let mut mailbox = mailbox();
    mailbox
        .attachments
        .insert("a1".to_string(), "!!not base64!!".to_string());
    let client = SearchClient::new(mailbox);

    let err = client
        .download_attachment("m1", "a1", &target)
        .await
        .expect_err("bad payload");

    assert!(matches!(err, MailError::Payload { .. }));
    assert!(!target.exists());
}

#[tokio::test(start_paused = true)]
async fn test_download_missing_attachment_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("missing.pdf");
    let client = SearchClient::new(mailbox());

    let err = client
        .download_attachment("m1", "nope", &target)
        .await
        .expect_err("missing");

    assert!(err.is_fatal_remote());
    assert!(!target.exists());
}
