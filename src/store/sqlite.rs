//! SQLite-backed [`Store`] implementation.
//!
//! One database file holds documents (including the raw uploaded bytes) and
//! their chunks. WAL mode keeps concurrent reads cheap while ingestion
//! writes. Migrations are idempotent and run on connect.

use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::models::{Chunk, CorpusStats, Document};

use super::{NewDocument, Store, StoredChunk};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and run migrations.
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                byte_size INTEGER NOT NULL,
                mime_type TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                uploaded_at INTEGER NOT NULL,
                page_count INTEGER NOT NULL DEFAULT 0,
                chunk_count INTEGER NOT NULL DEFAULT 0,
                remote_processed INTEGER NOT NULL DEFAULT 0,
                remote_id TEXT,
                data BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id INTEGER NOT NULL,
                page INTEGER NOT NULL,
                header TEXT,
                char_start INTEGER NOT NULL,
                char_end INTEGER NOT NULL,
                text TEXT NOT NULL,
                FOREIGN KEY (document_id) REFERENCES documents(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_subject ON documents(subject_id)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn row_to_document(row: &SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        subject_id: row.get("subject_id"),
        filename: row.get("filename"),
        byte_size: row.get("byte_size"),
        mime_type: row.get("mime_type"),
        uploaded_at: row.get("uploaded_at"),
        page_count: row.get("page_count"),
        chunk_count: row.get("chunk_count"),
        remote_processed: row.get::<i64, _>("remote_processed") != 0,
        remote_id: row.get("remote_id"),
    }
}

fn row_to_stored_chunk(row: &SqliteRow) -> StoredChunk {
    StoredChunk {
        id: row.get("id"),
        document_id: row.get("document_id"),
        filename: row.get("filename"),
        page: row.get("page"),
        header: row.get("header"),
        text: row.get("text"),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_document(&self, doc: NewDocument) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO documents
                (subject_id, filename, byte_size, mime_type, content_hash, uploaded_at, data)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.subject_id)
        .bind(&doc.filename)
        .bind(doc.data.len() as i64)
        .bind(&doc.mime_type)
        .bind(&doc.content_hash)
        .bind(doc.uploaded_at)
        .bind(&doc.data)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn mark_remote_processed(
        &self,
        id: i64,
        remote_id: &str,
        page_count: i64,
        chunk_count: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE documents
            SET remote_processed = 1, remote_id = ?, page_count = ?, chunk_count = ?
            WHERE id = ?
            "#,
        )
        .bind(remote_id)
        .bind(page_count)
        .bind(chunk_count)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_local_processed(
        &self,
        id: i64,
        page_count: i64,
        chunk_count: i64,
    ) -> Result<()> {
        sqlx::query("UPDATE documents SET page_count = ?, chunk_count = ? WHERE id = ?")
            .bind(page_count)
            .bind(chunk_count)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_chunks(&self, document_id: i64, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (document_id, page, header, char_start, char_end, text)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(document_id)
            .bind(chunk.page)
            .bind(&chunk.header)
            .bind(chunk.char_start)
            .bind(chunk.char_end)
            .bind(&chunk.text)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn chunks_for_subject(&self, subject_id: &str) -> Result<Vec<StoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.document_id, d.filename, c.page, c.header, c.text
            FROM chunks c
            JOIN documents d ON d.id = c.document_id
            WHERE d.subject_id = ?
            ORDER BY c.id
            "#,
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_stored_chunk).collect())
    }

    async fn chunks_for_document(&self, document_id: i64, limit: i64) -> Result<Vec<StoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.document_id, d.filename, c.page, c.header, c.text
            FROM chunks c
            JOIN documents d ON d.id = c.document_id
            WHERE c.document_id = ?
            ORDER BY c.id
            LIMIT ?
            "#,
        )
        .bind(document_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_stored_chunk).collect())
    }

    async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let row = sqlx::query(
            r#"
            SELECT id, subject_id, filename, byte_size, mime_type, uploaded_at,
                   page_count, chunk_count, remote_processed, remote_id
            FROM documents WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_document))
    }

    async fn list_documents(&self, subject_id: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT id, subject_id, filename, byte_size, mime_type, uploaded_at,
                   page_count, chunk_count, remote_processed, remote_id
            FROM documents
            WHERE subject_id = ?
            ORDER BY uploaded_at DESC, id DESC
            "#,
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_document).collect())
    }

    async fn delete_document(&self, id: i64) -> Result<Option<Document>> {
        let Some(doc) = self.get_document(id).await? else {
            return Ok(None);
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Some(doc))
    }

    async fn raw_file(&self, id: i64) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT data FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get("data")))
    }

    async fn stats(&self, subject_id: Option<&str>) -> Result<CorpusStats> {
        let row = match subject_id {
            Some(subject) => {
                sqlx::query(
                    r#"
                    SELECT COUNT(*) AS document_count,
                           COALESCE(SUM(page_count), 0) AS page_count,
                           COALESCE(SUM(chunk_count), 0) AS chunk_count,
                           COALESCE(SUM(byte_size), 0) AS total_bytes
                    FROM documents WHERE subject_id = ?
                    "#,
                )
                .bind(subject)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT COUNT(*) AS document_count,
                           COALESCE(SUM(page_count), 0) AS page_count,
                           COALESCE(SUM(chunk_count), 0) AS chunk_count,
                           COALESCE(SUM(byte_size), 0) AS total_bytes
                    FROM documents
                    "#,
                )
                .fetch_one(&self.pool)
                .await?
            }
        };

        Ok(CorpusStats {
            document_count: row.get("document_count"),
            page_count: row.get("page_count"),
            chunk_count: row.get("chunk_count"),
            total_bytes: row.get("total_bytes"),
        })
    }
}
