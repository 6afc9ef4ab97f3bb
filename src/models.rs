//! Core data models used throughout the retrieval engine.
//!
//! These types represent the documents, chunks, and scored results that flow
//! through the ingestion and retrieval pipeline.

use serde::Serialize;

/// A document record persisted in the local store.
///
/// The local record always exists, even when the document has also been
/// ingested by the remote backend; the local copy is authoritative for
/// offline access and for the user-visible document list.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    /// Locally-assigned id (SQLite rowid).
    pub id: i64,
    /// Owning subject/collection.
    pub subject_id: String,
    pub filename: String,
    pub byte_size: i64,
    pub mime_type: String,
    /// Upload time, unix seconds.
    pub uploaded_at: i64,
    /// Known after processing; 0 until then.
    pub page_count: i64,
    pub chunk_count: i64,
    /// True when the remote backend holds chunks/embeddings for this document.
    pub remote_processed: bool,
    /// Remote-assigned document id, once/if ingested remotely.
    pub remote_id: Option<String>,
}

/// A bounded span of text produced by the chunker, before storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    /// 1-based page number within the source document.
    pub page: i64,
    pub filename: String,
    /// Section label active when the chunk was emitted, without marker symbols.
    pub header: Option<String>,
    /// Character span within the source page text.
    pub char_start: i64,
    pub char_end: i64,
}

/// Which path produced a search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    /// Remote vector-similarity search.
    Remote,
    /// Local TF-IDF scoring.
    Local,
}

/// Query-time pairing of a chunk with a relevance score. Not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub text: String,
    pub page: i64,
    pub filename: String,
    pub score: f64,
    pub source: ScoreSource,
}

/// Which path served an ingestion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestPath {
    Remote,
    Local,
}

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResult {
    pub document_id: i64,
    pub filename: String,
    pub page_count: i64,
    pub chunk_count: i64,
    pub total_chars: i64,
    pub path: IngestPath,
}

/// Aggregate corpus statistics for a subject (or the whole store).
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorpusStats {
    pub document_count: i64,
    pub page_count: i64,
    pub chunk_count: i64,
    pub total_bytes: i64,
}
