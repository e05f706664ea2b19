//! Path validation — confines attachment references to the upload root.
//!
//! An attachment is accepted only when its path, after resolving symlinks
//! and relative components, names an existing regular file strictly inside
//! the canonical upload root, its declared media type is `image/*`, and it
//! is no larger than the configured cap.

use std::path::{Component, Path, PathBuf};

/// Error returned when an attachment reference is rejected.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path '{path}' is outside the upload root")]
    OutsideRoot { path: String },

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Path '{path}' does not exist")]
    NotFound { path: String },

    #[error("Path '{path}' is not a regular file")]
    NotAFile { path: String },

    #[error("Media type '{media_type}' is not an image type")]
    UnsupportedMediaType { media_type: String },

    #[error("File '{path}' is {size} bytes, limit is {limit}")]
    TooLarge { path: String, size: u64, limit: u64 },

    #[error("Failed to canonicalize path '{path}': {reason}")]
    CanonicalizeFailed { path: String, reason: String },
}

/// An attachment that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAttachment {
    /// Canonical location of the file.
    pub path: PathBuf,
    pub media_type: String,
    pub size: u64,
}

/// Resolve `path` (relative to `root`) into an attachment that is safe to read.
pub fn resolve_attachment(
    root: &Path,
    path: &str,
    media_type: &str,
    max_bytes: u64,
) -> Result<ResolvedAttachment, PathValidationError> {
    let media_type = media_type.trim().to_ascii_lowercase();
    if !media_type.starts_with("image/") || media_type.len() == "image/".len() {
        return Err(PathValidationError::UnsupportedMediaType { media_type });
    }

    let relative = Path::new(path);
    if relative.is_absolute() || relative.has_root() {
        return Err(PathValidationError::OutsideRoot { path: path.into() });
    }
    if relative.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(PathValidationError::PathTraversal { path: path.into() });
    }

    let canonical_root = root
        .canonicalize()
        .map_err(|e| PathValidationError::CanonicalizeFailed {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;

    let candidate = canonical_root.join(relative);
    if !candidate.exists() {
        return Err(PathValidationError::NotFound { path: path.into() });
    }

    // symlinks may still point outside; check the resolved target
    let canonical = candidate
        .canonicalize()
        .map_err(|e| PathValidationError::CanonicalizeFailed {
            path: path.into(),
            reason: e.to_string(),
        })?;
    if canonical == canonical_root || !canonical.starts_with(&canonical_root) {
        return Err(PathValidationError::OutsideRoot { path: path.into() });
    }

    let metadata = std::fs::metadata(&canonical).map_err(|e| {
        PathValidationError::CanonicalizeFailed {
            path: path.into(),
            reason: e.to_string(),
        }
    })?;
    if !metadata.is_file() {
        return Err(PathValidationError::NotAFile { path: path.into() });
    }
    if metadata.len() > max_bytes {
        return Err(PathValidationError::TooLarge {
            path: path.into(),
            size: metadata.len(),
            limit: max_bytes,
        });
    }

    Ok(ResolvedAttachment {
        path: canonical,
        media_type,
        size: metadata.len(),
    })
}
