//! Advisory locking on the store's sidecar lock file.

use crate::error::{Result, StoreError};
use fs2::FileExt;
use std::fs::{DirBuilder, File, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;
use std::time::{Duration, Instant};

const INITIAL_POLL: Duration = Duration::from_millis(10);
const MAX_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy)]
enum Mode {
    Shared,
    Exclusive,
}

/// Held lock; released when dropped.
#[derive(Debug)]
pub(crate) struct StoreLock {
    file: File,
}

impl StoreLock {
    pub(crate) fn shared(path: &Path, timeout: Duration) -> Result<Self> {
        Self::acquire(path, timeout, Mode::Shared)
    }

    pub(crate) fn exclusive(path: &Path, timeout: Duration) -> Result<Self> {
        Self::acquire(path, timeout, Mode::Exclusive)
    }

    fn acquire(path: &Path, timeout: Duration, mode: Mode) -> Result<Self> {
        let io_err = |action, source| StoreError::Io {
            path: path.to_path_buf(),
            action,
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let mut builder = DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::DirBuilderExt;
                builder.mode(0o700);
            }
            builder
                .create(parent)
                .map_err(|e| io_err("creating store directory", e))?;
        }

        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(false);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options
            .open(path)
            .map_err(|e| io_err("opening lock file", e))?;

        let contended = fs2::lock_contended_error().raw_os_error();
        let started = Instant::now();
        let mut delay = INITIAL_POLL;

        loop {
            // UFCS: newer std has inherent File lock methods with other signatures
            let attempt = match mode {
                Mode::Shared => FileExt::try_lock_shared(&file),
                Mode::Exclusive => FileExt::try_lock_exclusive(&file),
            };
            match attempt {
                Ok(()) => {
                    tracing::trace!(path = %path.display(), ?mode, "Store lock acquired");
                    return Ok(Self { file });
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.raw_os_error() == contended => {
                    let waited = started.elapsed();
                    if waited >= timeout {
                        return Err(StoreError::LockTimeout {
                            path: path.to_path_buf(),
                            waited,
                        });
                    }
                    std::thread::sleep(delay.min(timeout - waited));
                    delay = (delay * 2).min(MAX_POLL);
                }
                Err(e) => return Err(io_err("locking store", e)),
            }
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release store lock: {}", e);
        }
    }
}
