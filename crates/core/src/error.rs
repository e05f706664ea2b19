//! Error types for the Atlas domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Atlas operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Knowledge base errors ---
    #[error("Knowledge error: {0}")]
    Knowledge(#[from] KnowledgeError),

    // --- Reload pipeline errors ---
    #[error("Reload error: {0}")]
    Reload(#[from] ReloadError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone, Error)]
pub enum KnowledgeError {
    #[error("Invalid chunking parameters: size {size}, overlap {overlap} (need 0 < overlap < size)")]
    InvalidChunking { size: usize, overlap: usize },

    #[error("Invalid keyword pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("I/O failure at {path}: {reason}")]
    Io { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("Conversion command could not be started: {0}")]
    Spawn(String),

    #[error("Conversion command exited with status {code:?}")]
    ConversionFailed { code: Option<i32> },

    #[error("Conversion command timed out after {0}s")]
    ConversionTimeout(u64),

    #[error("Rebuild task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn chunking_error_names_both_parameters() {
        let err = Error::Knowledge(KnowledgeError::InvalidChunking {
            size: 100,
            overlap: 100,
        });
        let msg = err.to_string();
        assert!(msg.contains("size 100"));
        assert!(msg.contains("overlap 100"));
    }

    #[test]
    fn reload_error_wraps_knowledge_error() {
        let err: ReloadError = KnowledgeError::Io {
            path: "/corpus".into(),
            reason: "denied".into(),
        }
        .into();
        assert!(err.to_string().contains("/corpus"));
    }
}
