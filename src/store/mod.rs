//! Storage abstraction for the retrieval engine.
//!
//! The [`Store`] trait defines every local-persistence operation the
//! ingestion and retrieval pipeline needs, enabling pluggable backends
//! (SQLite for production, in-memory for tests).
//!
//! The local store is the durability anchor: the raw uploaded file and the
//! document record are written here before any processing, so a crash or a
//! remote-backend outage never loses the upload.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, CorpusStats, Document};

/// Fields required to create a document record. The id is assigned by the
/// store.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub subject_id: String,
    pub filename: String,
    pub mime_type: String,
    /// SHA-256 of the raw bytes, hex encoded.
    pub content_hash: String,
    /// Upload time, unix seconds.
    pub uploaded_at: i64,
    /// Raw file bytes, persisted verbatim.
    pub data: Vec<u8>,
}

/// A persisted chunk, as returned to the scoring path.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: i64,
    pub document_id: i64,
    /// Denormalized from the parent document for citation display.
    pub filename: String,
    pub page: i64,
    pub header: Option<String>,
    pub text: String,
}

/// Abstract local storage backend.
///
/// All methods return `anyhow::Result`; the engine wraps failures into its
/// own error type at the boundary.
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist the raw file and its document record. Returns the new id.
    ///
    /// Called before any processing so the upload is durable even if both
    /// processing paths later fail.
    async fn insert_document(&self, doc: NewDocument) -> Result<i64>;

    /// Record a successful remote ingestion: counts reported by the remote
    /// backend plus the remote-assigned document id.
    async fn mark_remote_processed(
        &self,
        id: i64,
        remote_id: &str,
        page_count: i64,
        chunk_count: i64,
    ) -> Result<()>;

    /// Record a successful local ingestion.
    async fn mark_local_processed(&self, id: i64, page_count: i64, chunk_count: i64)
        -> Result<()>;

    /// Replace the stored chunks for a document.
    async fn replace_chunks(&self, document_id: i64, chunks: &[Chunk]) -> Result<()>;

    /// All chunks belonging to a subject, in insertion order. This is the
    /// corpus the local scorer ranks over.
    async fn chunks_for_subject(&self, subject_id: &str) -> Result<Vec<StoredChunk>>;

    /// The first `limit` chunks of one document, in insertion order.
    async fn chunks_for_document(&self, document_id: i64, limit: i64) -> Result<Vec<StoredChunk>>;

    async fn get_document(&self, id: i64) -> Result<Option<Document>>;

    /// Documents in a subject, most recent first.
    async fn list_documents(&self, subject_id: &str) -> Result<Vec<Document>>;

    /// Delete a document and its chunks. Returns the deleted record so the
    /// caller can clean up remote state; `None` means the id was unknown and
    /// nothing happened.
    async fn delete_document(&self, id: i64) -> Result<Option<Document>>;

    /// The raw uploaded bytes, for download/re-processing.
    async fn raw_file(&self, id: i64) -> Result<Option<Vec<u8>>>;

    /// Aggregate counts, optionally filtered to one subject.
    async fn stats(&self, subject_id: Option<&str>) -> Result<CorpusStats>;
}
