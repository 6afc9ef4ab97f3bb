use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/relay.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Trailing-overlap seed carried into the next chunk. 0 disables.
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
    /// Chunks shorter than this after trimming are discarded as noise.
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
            min_chars: default_min_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    500
}
fn default_overlap_chars() -> usize {
    50
}
fn default_min_chars() -> usize {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Result count used when the caller passes a non-positive limit.
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    /// Uploads larger than this are rejected before any I/O.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_limit() -> i64 {
    5
}
fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    /// Base URL of the remote search backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Liveness probe timeout, seconds.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// Timeout for upload/search/delete calls, seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// How long a health-check result is cached, seconds.
    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            probe_timeout_secs: default_probe_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            health_interval_secs: default_health_interval_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8765".to_string()
}
fn default_probe_timeout_secs() -> u64 {
    2
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_health_interval_secs() -> u64 {
    30
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;

    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }

    if config.chunking.overlap_chars >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap_chars must be < chunking.max_chars");
    }

    if config.chunking.min_chars >= config.chunking.max_chars {
        anyhow::bail!("chunking.min_chars must be < chunking.max_chars");
    }

    if config.retrieval.default_limit < 1 {
        anyhow::bail!("retrieval.default_limit must be >= 1");
    }

    if config.remote.base_url.is_empty() {
        anyhow::bail!("remote.base_url must not be empty");
    }

    if config.remote.probe_timeout_secs == 0 || config.remote.request_timeout_secs == 0 {
        anyhow::bail!("remote timeouts must be > 0");
    }

    Ok(())
}
