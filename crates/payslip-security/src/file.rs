//! Owner-only, atomic file writes and file content checks.

use crate::error::{Result, SecurityError};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

/// Leading bytes of every PDF document.
pub const PDF_SIGNATURE: &[u8; 5] = b"%PDF-";

/// Permission bits for files written by [`write_secure`].
const FILE_MODE: u32 = 0o600;

/// Permission bits for directories created by [`write_secure`].
const DIR_MODE: u32 = 0o700;

/// Write `content` to `path` with owner-only permissions, atomically.
///
/// Missing parent directories are created owner-only (0700); existing ones
/// are left alone. The content goes to a temporary file in the same
/// directory whose creation mode is already 0600, is flushed to disk, and is
/// then renamed over `path`, so no reader ever sees a partial file and the
/// content is never exposed with broader permissions.
pub fn write_secure(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    create_private_dir(parent)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".payslip-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| SecurityError::io(parent, e))?;

    set_owner_only(tmp.as_file(), tmp.path())?;
    tmp.write_all(content)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| SecurityError::io(tmp.path(), e))?;

    tmp.persist(path)
        .map_err(|e| SecurityError::io(path, e.error))?;
    sync_dir(parent);

    tracing::debug!(path = %path.display(), bytes = content.len(), "wrote owner-only file");
    Ok(())
}

/// True iff the file exists and grants no permissions to group or other.
#[must_use]
pub fn verify_secure_permissions(path: &Path) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            tracing::warn!("Insecure permissions on {}: {:o}", path.display(), mode & 0o777);
            return false;
        }
    }
    #[cfg(not(unix))]
    let _ = metadata;

    true
}

/// Fail with [`SecurityError::InsecurePermissions`] unless `path` is owner-only.
pub fn require_secure_permissions(path: &Path) -> Result<()> {
    if verify_secure_permissions(path) {
        return Ok(());
    }
    let metadata = fs::metadata(path).map_err(|e| SecurityError::io(path, e))?;
    Err(SecurityError::InsecurePermissions {
        path: path.to_path_buf(),
        mode: permission_bits(&metadata),
    })
}

/// True iff the file begins with the PDF signature.
#[must_use]
pub fn is_pdf(path: &Path) -> bool {
    let Ok(mut file) = File::open(path) else {
        return false;
    };
    let mut header = [0u8; 5];
    match file.read_exact(&mut header) {
        Ok(()) => &header == PDF_SIGNATURE,
        Err(_) => false,
    }
}

fn create_private_dir(dir: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder.create(dir).map_err(|e| SecurityError::io(dir, e))
}

fn set_owner_only(file: &File, path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(FILE_MODE))
            .map_err(|e| SecurityError::io(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = (file, path);
    Ok(())
}

fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    {
        if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
            tracing::debug!("could not fsync {}: {}", dir.display(), e);
        }
    }
    #[cfg(not(unix))]
    let _ = dir;
}

fn permission_bits(metadata: &fs::Metadata) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o777
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        0
    }
}
