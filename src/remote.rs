//! Remote search backend client.
//!
//! The remote backend is an external HTTP service (vector database plus
//! embeddings) offering document ingestion, similarity search, and deletion.
//! It may be offline at any time; callers treat every error from this module
//! as a signal to fall back to the local path, never as a user-visible
//! failure.
//!
//! [`RemoteBackend`] is a trait so tests can inject scripted fakes instead of
//! relying on real network timeouts.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::RemoteConfig;

/// Response from `POST /documents/upload`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteIngest {
    pub document_id: String,
    pub page_count: i64,
    pub chunk_count: i64,
    pub total_chars: i64,
}

/// One scored chunk from `POST /search`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteChunk {
    pub text: String,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub filename: String,
    pub score: f64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    chunks: Vec<RemoteChunk>,
}

#[derive(serde::Serialize)]
struct SearchRequest<'a> {
    subject_id: &'a str,
    query: &'a str,
    limit: i64,
}

/// Contract the engine requires of the remote search backend.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Cheap liveness probe. Ok means reachable and ready.
    async fn health(&self) -> Result<()>;

    /// Upload a document for remote chunking and embedding.
    async fn upload(&self, subject_id: &str, filename: &str, data: &[u8]) -> Result<RemoteIngest>;

    /// Similarity search over the subject's remotely-ingested chunks.
    async fn search(&self, subject_id: &str, query: &str, limit: i64) -> Result<Vec<RemoteChunk>>;

    /// Delete a remotely-ingested document. Best-effort from the caller's
    /// perspective; any response is accepted.
    async fn delete(&self, remote_id: &str) -> Result<()>;
}

/// HTTP implementation of [`RemoteBackend`] over the backend's JSON API.
///
/// Health probes use a short timeout (default 2s); ingest/search/delete use
/// a longer one (default 10s). Timeouts are set per request so a hung
/// backend cannot stall the engine.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    probe_timeout: Duration,
    request_timeout: Duration,
}

impl HttpBackend {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl RemoteBackend for HttpBackend {
    async fn health(&self) -> Result<()> {
        let resp = self
            .client
            .get(self.url("/health"))
            .timeout(self.probe_timeout)
            .send()
            .await?;

        if !resp.status().is_success() {
            bail!("health probe returned {}", resp.status());
        }
        Ok(())
    }

    async fn upload(&self, subject_id: &str, filename: &str, data: &[u8]) -> Result<RemoteIngest> {
        let part = reqwest::multipart::Part::bytes(data.to_vec()).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("subject_id", subject_id.to_string());

        let resp = self
            .client
            .post(self.url("/documents/upload"))
            .timeout(self.request_timeout)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("remote upload failed with {}: {}", status, body);
        }

        Ok(resp.json::<RemoteIngest>().await?)
    }

    async fn search(&self, subject_id: &str, query: &str, limit: i64) -> Result<Vec<RemoteChunk>> {
        let resp = self
            .client
            .post(self.url("/search"))
            .timeout(self.request_timeout)
            .json(&SearchRequest {
                subject_id,
                query,
                limit,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("remote search failed with {}: {}", status, body);
        }

        Ok(resp.json::<SearchResponse>().await?.chunks)
    }

    async fn delete(&self, remote_id: &str) -> Result<()> {
        let resp = self
            .client
            .delete(self.url(&format!("/documents/{}", remote_id)))
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !resp.status().is_success() {
            bail!("remote delete returned {}", resp.status());
        }
        Ok(())
    }
}
