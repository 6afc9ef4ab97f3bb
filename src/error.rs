//! Error taxonomy for the retrieval engine.
//!
//! Only local-path failures are fatal. Remote-backend failures are never
//! surfaced through this type: the engine absorbs them by falling back to
//! local processing and logs them at warn level, so callers perceive degraded
//! ranking quality rather than an outright error.

use thiserror::Error;

/// Errors surfaced to callers of [`RetrievalEngine`](crate::engine::RetrievalEngine).
#[derive(Debug, Error)]
pub enum RelayError {
    /// The uploaded file's MIME type is not a supported document format.
    /// Returned before any side effect.
    #[error("unsupported document format: {mime}")]
    UnsupportedFormat { mime: String },

    /// The subject id contains characters outside ASCII alphanumerics,
    /// `-`, and `_`. Returned before any side effect.
    #[error("invalid subject id: {subject_id}")]
    InvalidSubject { subject_id: String },

    /// The upload exceeds the configured size cap. Returned before any
    /// side effect.
    #[error("file too large: {size} bytes (max {max})")]
    FileTooLarge { size: usize, max: usize },

    /// Both the remote and the local processing path failed. The raw file
    /// record remains durable in the local store; no chunks were written.
    #[error("document processing failed: {0}")]
    IngestFailed(#[source] anyhow::Error),

    /// The local store itself failed. There is no fallback below local
    /// persistence.
    #[error("local store error: {0}")]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
