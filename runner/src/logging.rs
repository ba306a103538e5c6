//! Tracing setup: console plus an owner-only log file, both redacted.

use anyhow::{Context, Result};
use payslip_core::AppConfig;
use payslip_security::RedactingWriter;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

/// Name of the log file inside the log directory.
pub const LOG_FILE_NAME: &str = "app.log";

/// Append handle shared by every log event.
#[derive(Debug, Clone)]
struct SharedFile(Arc<File>);

impl Write for SharedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self.0).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self.0).flush()
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let file = options.open(path)?;
    // tighten a file left behind with looser permissions
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(file)
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. The log directory must exist
/// (see [`AppConfig::ensure_directories`]).
pub fn init_tracing(config: &AppConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));

    let log_path = config.log_dir()?.join(LOG_FILE_NAME);
    let file = SharedFile(Arc::new(
        open_log_file(&log_path)
            .with_context(|| format!("failed to open log file {}", log_path.display()))?,
    ));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(|| RedactingWriter::new(io::stderr())))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(move || RedactingWriter::new(file.clone())),
        )
        .with(filter)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(())
}
