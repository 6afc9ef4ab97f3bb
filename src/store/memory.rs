//! In-memory [`Store`] implementation for tests.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`; every future is
//! immediately ready. Behavior mirrors [`SqliteStore`](super::sqlite::SqliteStore)
//! so engine tests exercise the same contract.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, CorpusStats, Document};

use super::{NewDocument, Store, StoredChunk};

struct StoredDoc {
    doc: Document,
    data: Vec<u8>,
}

struct ChunkRecord {
    id: i64,
    document_id: i64,
    chunk: Chunk,
}

#[derive(Default)]
struct Inner {
    next_doc_id: i64,
    next_chunk_id: i64,
    docs: HashMap<i64, StoredDoc>,
    chunks: Vec<ChunkRecord>,
}

/// In-memory store for tests.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_document(&self, doc: NewDocument) -> Result<i64> {
        let mut inner = self.inner.write().unwrap();
        inner.next_doc_id += 1;
        let id = inner.next_doc_id;

        inner.docs.insert(
            id,
            StoredDoc {
                doc: Document {
                    id,
                    subject_id: doc.subject_id,
                    filename: doc.filename,
                    byte_size: doc.data.len() as i64,
                    mime_type: doc.mime_type,
                    uploaded_at: doc.uploaded_at,
                    page_count: 0,
                    chunk_count: 0,
                    remote_processed: false,
                    remote_id: None,
                },
                data: doc.data,
            },
        );
        Ok(id)
    }

    async fn mark_remote_processed(
        &self,
        id: i64,
        remote_id: &str,
        page_count: i64,
        chunk_count: i64,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(stored) = inner.docs.get_mut(&id) {
            stored.doc.remote_processed = true;
            stored.doc.remote_id = Some(remote_id.to_string());
            stored.doc.page_count = page_count;
            stored.doc.chunk_count = chunk_count;
        }
        Ok(())
    }

    async fn mark_local_processed(
        &self,
        id: i64,
        page_count: i64,
        chunk_count: i64,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(stored) = inner.docs.get_mut(&id) {
            stored.doc.page_count = page_count;
            stored.doc.chunk_count = chunk_count;
        }
        Ok(())
    }

    async fn replace_chunks(&self, document_id: i64, chunks: &[Chunk]) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.chunks.retain(|rec| rec.document_id != document_id);
        for chunk in chunks {
            inner.next_chunk_id += 1;
            let id = inner.next_chunk_id;
            inner.chunks.push(ChunkRecord {
                id,
                document_id,
                chunk: chunk.clone(),
            });
        }
        Ok(())
    }

    async fn chunks_for_subject(&self, subject_id: &str) -> Result<Vec<StoredChunk>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .chunks
            .iter()
            .filter_map(|rec| {
                let stored = inner.docs.get(&rec.document_id)?;
                if stored.doc.subject_id != subject_id {
                    return None;
                }
                Some(StoredChunk {
                    id: rec.id,
                    document_id: rec.document_id,
                    filename: stored.doc.filename.clone(),
                    page: rec.chunk.page,
                    header: rec.chunk.header.clone(),
                    text: rec.chunk.text.clone(),
                })
            })
            .collect())
    }

    async fn chunks_for_document(&self, document_id: i64, limit: i64) -> Result<Vec<StoredChunk>> {
        let inner = self.inner.read().unwrap();
        let filename = match inner.docs.get(&document_id) {
            Some(stored) => stored.doc.filename.clone(),
            None => return Ok(Vec::new()),
        };
        Ok(inner
            .chunks
            .iter()
            .filter(|rec| rec.document_id == document_id)
            .take(limit.max(0) as usize)
            .map(|rec| StoredChunk {
                id: rec.id,
                document_id,
                filename: filename.clone(),
                page: rec.chunk.page,
                header: rec.chunk.header.clone(),
                text: rec.chunk.text.clone(),
            })
            .collect())
    }

    async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.docs.get(&id).map(|stored| stored.doc.clone()))
    }

    async fn list_documents(&self, subject_id: &str) -> Result<Vec<Document>> {
        let inner = self.inner.read().unwrap();
        let mut docs: Vec<Document> = inner
            .docs
            .values()
            .filter(|stored| stored.doc.subject_id == subject_id)
            .map(|stored| stored.doc.clone())
            .collect();
        docs.sort_by(|a, b| (b.uploaded_at, b.id).cmp(&(a.uploaded_at, a.id)));
        Ok(docs)
    }

    async fn delete_document(&self, id: i64) -> Result<Option<Document>> {
        let mut inner = self.inner.write().unwrap();
        let Some(stored) = inner.docs.remove(&id) else {
            return Ok(None);
        };
        inner.chunks.retain(|rec| rec.document_id != id);
        Ok(Some(stored.doc))
    }

    async fn raw_file(&self, id: i64) -> Result<Option<Vec<u8>>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.docs.get(&id).map(|stored| stored.data.clone()))
    }

    async fn stats(&self, subject_id: Option<&str>) -> Result<CorpusStats> {
        let inner = self.inner.read().unwrap();
        let mut stats = CorpusStats::default();
        for stored in inner.docs.values() {
            if let Some(subject) = subject_id {
                if stored.doc.subject_id != subject {
                    continue;
                }
            }
            stats.document_count += 1;
            stats.page_count += stored.doc.page_count;
            stats.chunk_count += stored.doc.chunk_count;
            stats.total_bytes += stored.doc.byte_size;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replace_chunks_is_idempotent() {
        let store = InMemoryStore::new();
        let id = store
            .insert_document(NewDocument {
                subject_id: "net".to_string(),
                filename: "a.txt".to_string(),
                mime_type: "text/plain".to_string(),
                content_hash: "00".to_string(),
                uploaded_at: 0,
                data: Vec::new(),
            })
            .await
            .unwrap();

        let chunk = Chunk {
            text: "routing tables".to_string(),
            page: 1,
            filename: "a.txt".to_string(),
            header: None,
            char_start: 0,
            char_end: 14,
        };

        store.replace_chunks(id, &[chunk.clone(), chunk.clone()]).await.unwrap();
        store.replace_chunks(id, &[chunk]).await.unwrap();

        assert_eq!(store.chunks_for_subject("net").await.unwrap().len(), 1);
    }
}
