//! Credential redaction for log output.
//!
//! Log lines pass through [`redact`] before they reach the console or the
//! log file, so tokens and secrets never land on disk.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::io::{self, Write};

/// Redaction rules: pattern and replacement, applied in order.
static PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (
            r#"(?i)bearer\s+[a-z0-9._~+/=-]+"#,
            "Bearer ***REDACTED***",
        ),
        (
            r#"(?i)(access_token|refresh_token|token)["\s:=]+["']?[a-z0-9._~+/-]+["']?"#,
            r#"$1="***REDACTED***""#,
        ),
        (
            r#"(?i)password["\s:=]+["']?[^\s"']+["']?"#,
            r#"password="***REDACTED***""#,
        ),
        (
            r#"(?i)client_secret["\s:=]+["']?[^\s"']+["']?"#,
            r#"client_secret="***REDACTED***""#,
        ),
        (
            r#"(?i)api[_-]?key["\s:=]+["']?[^\s"']+["']?"#,
            r#"api_key="***REDACTED***""#,
        ),
        (
            r"[A-Za-z0-9._%+-]+@([A-Za-z0-9.-]+\.[A-Za-z]{2,})",
            "***@$1",
        ),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("redaction regex is hardcoded and valid"),
            replacement,
        )
    })
    .collect()
});

/// Mask credentials and email local parts in `message`.
///
/// Returns the input unchanged (borrowed) when nothing matched.
#[must_use]
pub fn redact(message: &str) -> Cow<'_, str> {
    let mut out = Cow::Borrowed(message);
    for (regex, replacement) in PATTERNS.iter() {
        if regex.is_match(&out) {
            out = Cow::Owned(regex.replace_all(&out, *replacement).into_owned());
        }
    }
    out
}

/// `Write` adapter that redacts every chunk before forwarding it.
///
/// Formatting layers emit one complete line per write, which is what the
/// patterns operate on.
#[derive(Debug)]
pub struct RedactingWriter<W> {
    inner: W,
}

impl<W: Write> RedactingWriter<W> {
    /// Wrap `inner`.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        self.inner.write_all(redact(&text).as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
