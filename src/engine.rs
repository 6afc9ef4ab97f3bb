//! Retrieval engine: the orchestrator behind ingest, search, and delete.
//!
//! Every operation follows the same shape: try the remote backend when the
//! availability monitor says it is up, and fall back to the fully-local path
//! when it is down or the call fails mid-flight. Remote failures are logged
//! and absorbed; the only errors callers see come from input validation or
//! the local store itself.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::chunker::Chunker;
use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::extract;
use crate::health::BackendMonitor;
use crate::models::{
    Chunk, CorpusStats, Document, IngestPath, IngestResult, ScoreSource, ScoredChunk,
};
use crate::remote::RemoteBackend;
use crate::scorer::{self, IdfCache, IdfTable};
use crate::store::{NewDocument, Store, StoredChunk};

pub struct RetrievalEngine {
    store: Arc<dyn Store>,
    remote: Arc<dyn RemoteBackend>,
    monitor: BackendMonitor,
    idf_cache: IdfCache,
    chunker: Chunker,
    default_limit: i64,
    max_upload_bytes: usize,
    request_timeout: Duration,
}

impl RetrievalEngine {
    pub fn new(store: Arc<dyn Store>, remote: Arc<dyn RemoteBackend>, config: &Config) -> Self {
        Self {
            store,
            remote,
            monitor: BackendMonitor::new(
                Duration::from_secs(config.remote.health_interval_secs),
                Duration::from_secs(config.remote.probe_timeout_secs),
            ),
            idf_cache: IdfCache::new(),
            chunker: Chunker::new(config.chunking.clone()),
            default_limit: config.retrieval.default_limit,
            max_upload_bytes: config.retrieval.max_upload_bytes,
            request_timeout: Duration::from_secs(config.remote.request_timeout_secs),
        }
    }

    /// Ingest an uploaded document into a subject's corpus.
    ///
    /// Validation happens before any side effect. The raw file is then
    /// persisted locally no matter which processing path runs, so the upload
    /// survives a remote outage or a processing failure.
    pub async fn ingest(
        &self,
        subject_id: &str,
        filename: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<IngestResult> {
        if !extract::is_supported_mime(mime_type) {
            return Err(RelayError::UnsupportedFormat {
                mime: mime_type.to_string(),
            });
        }
        if !is_valid_subject(subject_id) {
            return Err(RelayError::InvalidSubject {
                subject_id: subject_id.to_string(),
            });
        }
        if data.len() > self.max_upload_bytes {
            return Err(RelayError::FileTooLarge {
                size: data.len(),
                max: self.max_upload_bytes,
            });
        }

        let content_hash = hex_digest(&data);
        let document_id = self
            .store
            .insert_document(NewDocument {
                subject_id: subject_id.to_string(),
                filename: filename.to_string(),
                mime_type: mime_type.to_string(),
                content_hash,
                uploaded_at: chrono::Utc::now().timestamp(),
                data: data.clone(),
            })
            .await?;

        if self.monitor.is_available(self.remote.as_ref()).await {
            match self
                .bounded(self.remote.upload(subject_id, filename, &data))
                .await
            {
                Ok(remote) => {
                    self.store
                        .mark_remote_processed(
                            document_id,
                            &remote.document_id,
                            remote.page_count,
                            remote.chunk_count,
                        )
                        .await?;
                    tracing::info!(
                        document_id,
                        remote_id = %remote.document_id,
                        chunk_count = remote.chunk_count,
                        "document ingested remotely"
                    );
                    return Ok(IngestResult {
                        document_id,
                        filename: filename.to_string(),
                        page_count: remote.page_count,
                        chunk_count: remote.chunk_count,
                        total_chars: remote.total_chars,
                        path: IngestPath::Remote,
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        document_id,
                        error = %err,
                        "remote ingestion failed, falling back to local processing"
                    );
                }
            }
        }

        self.ingest_locally(document_id, subject_id, filename, mime_type, &data)
            .await
    }

    async fn ingest_locally(
        &self,
        document_id: i64,
        subject_id: &str,
        filename: &str,
        mime_type: &str,
        data: &[u8],
    ) -> Result<IngestResult> {
        let pages =
            extract::extract_pages(data, mime_type).map_err(RelayError::IngestFailed)?;

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut total_chars: i64 = 0;
        for (page, text) in &pages {
            total_chars += text.chars().count() as i64;
            chunks.extend(self.chunker.chunk_page(text, *page, filename));
        }

        self.store.replace_chunks(document_id, &chunks).await?;
        self.store
            .mark_local_processed(document_id, pages.len() as i64, chunks.len() as i64)
            .await?;
        self.idf_cache.invalidate();

        tracing::info!(
            document_id,
            subject_id,
            page_count = pages.len(),
            chunk_count = chunks.len(),
            "document ingested locally"
        );

        Ok(IngestResult {
            document_id,
            filename: filename.to_string(),
            page_count: pages.len() as i64,
            chunk_count: chunks.len() as i64,
            total_chars,
            path: IngestPath::Local,
        })
    }

    /// Search a subject's corpus for chunks relevant to `query`.
    ///
    /// A non-positive `limit` means "use the configured default". Results
    /// are sorted by descending score; zero-score chunks are dropped, so an
    /// empty corpus or an unmatched query yields an empty list rather than
    /// an error.
    pub async fn retrieve(
        &self,
        subject_id: &str,
        query: &str,
        limit: i64,
    ) -> Result<Vec<ScoredChunk>> {
        let limit = if limit > 0 { limit } else { self.default_limit };

        if self.monitor.is_available(self.remote.as_ref()).await {
            match self
                .bounded(self.remote.search(subject_id, query, limit))
                .await
            {
                Ok(chunks) => {
                    return Ok(chunks
                        .into_iter()
                        .map(|c| ScoredChunk {
                            text: c.text,
                            page: c.page,
                            filename: c.filename,
                            score: c.score,
                            source: ScoreSource::Remote,
                        })
                        .collect());
                }
                Err(err) => {
                    tracing::warn!(
                        subject_id,
                        error = %err,
                        "remote search failed, falling back to local scoring"
                    );
                }
            }
        }

        self.retrieve_locally(subject_id, query, limit).await
    }

    async fn retrieve_locally(
        &self,
        subject_id: &str,
        query: &str,
        limit: i64,
    ) -> Result<Vec<ScoredChunk>> {
        let chunks = self.store.chunks_for_subject(subject_id).await?;
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(subject_id, corpus = chunks.len(), "scoring local corpus");

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let idf = self
            .idf_cache
            .get_or_build(subject_id, || IdfTable::build(&texts));
        let scores = scorer::score_chunks(query, &texts, &idf);

        let mut scored: Vec<ScoredChunk> = chunks
            .into_iter()
            .zip(scores)
            .filter(|(_, score)| *score > 0.0)
            .map(|(chunk, score): (StoredChunk, f64)| ScoredChunk {
                text: chunk.text,
                page: chunk.page,
                filename: chunk.filename,
                score,
                source: ScoreSource::Local,
            })
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit as usize);
        Ok(scored)
    }

    /// Delete a document locally and, best-effort, remotely.
    ///
    /// Local removal is unconditional and idempotent. If the document was
    /// remotely ingested, a remote delete is attempted regardless of the
    /// availability cache; a failure there is logged and swallowed because
    /// the local state is already consistent.
    pub async fn delete(&self, document_id: i64) -> Result<()> {
        let Some(doc) = self.store.delete_document(document_id).await? else {
            tracing::debug!(document_id, "delete of unknown document, no-op");
            return Ok(());
        };
        self.idf_cache.invalidate();
        tracing::info!(document_id, filename = %doc.filename, "document deleted locally");

        if let Some(remote_id) = doc.remote_id {
            if let Err(err) = self.bounded(self.remote.delete(&remote_id)).await {
                tracing::warn!(
                    document_id,
                    remote_id = %remote_id,
                    error = %err,
                    "remote delete failed, remote copy may be orphaned"
                );
            }
        }
        Ok(())
    }

    pub async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        Ok(self.store.get_document(id).await?)
    }

    pub async fn list_documents(&self, subject_id: &str) -> Result<Vec<Document>> {
        Ok(self.store.list_documents(subject_id).await?)
    }

    /// The first `limit` chunks of a document, for preview display.
    pub async fn preview(&self, document_id: i64, limit: i64) -> Result<Vec<StoredChunk>> {
        let limit = if limit > 0 { limit } else { self.default_limit };
        Ok(self.store.chunks_for_document(document_id, limit).await?)
    }

    /// The raw uploaded bytes, for download.
    pub async fn raw_file(&self, document_id: i64) -> Result<Option<Vec<u8>>> {
        Ok(self.store.raw_file(document_id).await?)
    }

    pub async fn stats(&self, subject_id: Option<&str>) -> Result<CorpusStats> {
        Ok(self.store.stats(subject_id).await?)
    }

    /// Cap a remote call so a hung backend cannot stall the request.
    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!(
                "remote call timed out after {}s",
                self.request_timeout.as_secs()
            ),
        }
    }
}

/// Subject ids become part of storage keys and remote requests, so only
/// ASCII alphanumerics, `-`, and `_` are allowed.
fn is_valid_subject(subject_id: &str) -> bool {
    !subject_id.is_empty()
        && subject_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn hex_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_validation() {
        assert!(is_valid_subject("networks-101"));
        assert!(is_valid_subject("bio_2"));
        assert!(!is_valid_subject(""));
        assert!(!is_valid_subject("net works"));
        assert!(!is_valid_subject("net/works"));
        assert!(!is_valid_subject("café"));
    }

    #[test]
    fn test_hex_digest_is_sha256() {
        assert_eq!(
            hex_digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
