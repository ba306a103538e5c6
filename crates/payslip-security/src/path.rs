//! Filename sanitization and root-confined path joining.
//!
//! Every filename that comes from a remote mailbox goes through
//! [`sanitize_filename`] before it touches the filesystem.

use crate::error::{Result, SecurityError};
use std::path::{Component, Path, PathBuf};

/// Name used when sanitization leaves nothing usable.
pub const PLACEHOLDER_NAME: &str = "unnamed_file";

/// Maximum length of a sanitized filename, in bytes.
pub const MAX_FILENAME_BYTES: usize = 255;

/// Reduce an untrusted filename to a safe, single path component.
///
/// - embedded NUL bytes are removed
/// - `/` and `\` become `_`
/// - leading dots are stripped; a remaining name gets a `_` prefix (unless it
///   already starts with one) so it cannot become a hidden file, and an
///   all-dot name becomes [`PLACEHOLDER_NAME`]
/// - anything outside `[A-Za-z0-9._-]` becomes `_`
/// - the result is cut to 255 bytes, keeping the extension
///
/// ```
/// use payslip_security::sanitize_filename;
///
/// assert_eq!(sanitize_filename("normal_file.pdf"), "normal_file.pdf");
/// assert_eq!(sanitize_filename("../../../etc/passwd"), "_.._.._etc_passwd");
/// assert_eq!(sanitize_filename("..hidden"), "_hidden");
/// ```
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    let mut name: String = filename
        .chars()
        .filter(|&c| c != '\0')
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();

    if name.starts_with('.') {
        let rest = name.trim_start_matches('.');
        if rest.is_empty() {
            return PLACEHOLDER_NAME.to_string();
        }
        name = if rest.starts_with('_') {
            rest.to_string()
        } else {
            format!("_{rest}")
        };
    }

    let mut name: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    // Only ASCII remains, so byte and char boundaries coincide.
    if name.len() > MAX_FILENAME_BYTES {
        match name.rfind('.').filter(|&i| i > 0) {
            Some(dot) if name.len() - dot < MAX_FILENAME_BYTES => {
                let ext = name.split_off(dot);
                name.truncate(MAX_FILENAME_BYTES - ext.len());
                name.push_str(&ext);
            }
            _ => name.truncate(MAX_FILENAME_BYTES),
        }
    }

    if name.is_empty() {
        return PLACEHOLDER_NAME.to_string();
    }
    name
}

/// Join sanitized `parts` onto `root`, refusing results outside of `root`.
///
/// Besides the lexical check, if the deepest existing ancestor resolves
/// (through symlinks) outside of the resolved root, the join is rejected.
pub fn secure_join(root: &Path, parts: &[&str]) -> Result<PathBuf> {
    let mut path = root.to_path_buf();
    for part in parts {
        path.push(sanitize_filename(part));
    }

    let lexically_inside = path.strip_prefix(root).is_ok_and(|rel| {
        rel.components()
            .all(|c| matches!(c, Component::Normal(_)))
    });
    if !lexically_inside {
        return Err(traversal(&path, root));
    }

    if let Ok(resolved_root) = root.canonicalize() {
        let existing = path.ancestors().find(|p| p.exists());
        if let Some(resolved) = existing.and_then(|p| p.canonicalize().ok()) {
            if !resolved.starts_with(&resolved_root) {
                return Err(traversal(&resolved, &resolved_root));
            }
        }
    }

    Ok(path)
}

fn traversal(path: &Path, root: &Path) -> SecurityError {
    tracing::warn!(path = %path.display(), root = %root.display(), "rejected path outside root");
    SecurityError::PathTraversal {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normal_filename_unchanged() {
        assert_eq!(sanitize_filename("normal_file.pdf"), "normal_file.pdf");
        assert_eq!(sanitize_filename("Payslip-2025.11.pdf"), "Payslip-2025.11.pdf");
    }

    #[test]
    fn test_path_traversal_neutralized() {
        let sanitized = sanitize_filename("../../../etc/passwd");
        assert!(!sanitized.contains('/'));
        assert!(!sanitized.starts_with('.'));
        assert_eq!(sanitized, "_.._.._etc_passwd");

        let windows = sanitize_filename("..\\..\\boot.ini");
        assert!(!windows.contains('\\'));
        assert!(!windows.starts_with('.'));
    }

    #[test]
    fn test_leading_dots() {
        assert_eq!(sanitize_filename(".hidden"), "_hidden");
        assert_eq!(sanitize_filename("..."), PLACEHOLDER_NAME);
        assert_eq!(sanitize_filename("._x"), "_x");
    }

    #[test]
    fn test_null_bytes_and_unsafe_chars() {
        assert_eq!(sanitize_filename("pay\0slip.pdf"), "payslip.pdf");
        assert_eq!(sanitize_filename("my payslip (Nov).pdf"), "my_payslip__Nov_.pdf");
        assert_eq!(
            sanitize_filename("tlush_\u{5de}\u{5e9}\u{5db}\u{5d5}\u{5e8}\u{5ea}.pdf"),
            format!("tlush_{}.pdf", "_".repeat(6))
        );
    }

    #[test]
    fn test_empty_becomes_placeholder() {
        assert_eq!(sanitize_filename(""), PLACEHOLDER_NAME);
        assert_eq!(sanitize_filename("\0"), PLACEHOLDER_NAME);
    }

    #[test]
    fn test_truncation_preserves_extension() {
        let long = format!("{}.pdf", "a".repeat(400));
        let sanitized = sanitize_filename(&long);
        assert_eq!(sanitized.len(), MAX_FILENAME_BYTES);
        assert!(sanitized.ends_with(".pdf"));

        let no_ext = "b".repeat(300);
        assert_eq!(sanitize_filename(&no_ext).len(), MAX_FILENAME_BYTES);
    }

    #[test]
    fn test_secure_join_stays_inside_root() {
        let tmp = TempDir::new().expect("create temp dir");
        let joined = secure_join(tmp.path(), &["2025", "../../../etc/passwd"]).expect("join");
        assert!(joined.starts_with(tmp.path()));
        assert_eq!(joined.file_name().and_then(|n| n.to_str()), Some("_.._.._etc_passwd"));

        let dots = secure_join(tmp.path(), &[".."]).expect("join");
        assert_eq!(dots, tmp.path().join(PLACEHOLDER_NAME));
    }

    #[cfg(unix)]
    #[test]
    fn test_secure_join_rejects_symlink_escape() {
        let root = TempDir::new().expect("create root");
        let outside = TempDir::new().expect("create outside dir");
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).expect("symlink");

        let result = secure_join(root.path(), &["link", "file.pdf"]);
        assert!(matches!(result, Err(SecurityError::PathTraversal { .. })));
    }
}
