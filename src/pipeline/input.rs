//! Input validation: make sure the document path points at a readable PDF.
//!
//! Checking existence, size and the `%PDF` magic up front gives callers a
//! meaningful error instead of a pdfium failure deep inside Stage 1.

use crate::error::MindmapError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate a local document path and return it as an owned `PathBuf`.
pub fn resolve_document(path: impl AsRef<Path>) -> Result<PathBuf, MindmapError> {
    let path = path.as_ref().to_path_buf();

    if !path.exists() {
        return Err(MindmapError::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(MindmapError::PermissionDenied { path });
        }
        Err(_) => return Err(MindmapError::FileNotFound { path }),
    };

    let len = file.metadata().map(|m| m.len()).unwrap_or(0);
    if len == 0 {
        return Err(MindmapError::EmptyFile { path });
    }

    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
        return Err(MindmapError::NotAPdf { path, magic });
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file() {
        let err = resolve_document("/definitely/not/a/real/deck.pdf").unwrap_err();
        assert!(matches!(err, MindmapError::FileNotFound { .. }));
    }

    #[test]
    fn empty_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let err = resolve_document(tmp.path()).unwrap_err();
        assert!(matches!(err, MindmapError::EmptyFile { .. }));
    }

    #[test]
    fn wrong_magic() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"PK\x03\x04 not a pdf").unwrap();
        let err = resolve_document(tmp.path()).unwrap_err();
        assert!(matches!(err, MindmapError::NotAPdf { magic, .. } if &magic == b"PK\x03\x04"));
    }

    #[test]
    fn pdf_magic_accepted() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.7\n").unwrap();
        assert_eq!(resolve_document(tmp.path()).unwrap(), tmp.path());
    }
}
