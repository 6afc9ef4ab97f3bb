//! # Retrieval Relay
//!
//! A hybrid document-retrieval engine with a remote-first, local-fallback
//! architecture.
//!
//! Documents are ingested per subject, chunked, and made searchable two
//! ways: through an external vector-search backend when it is reachable,
//! and through a fully-local TF-IDF path backed by SQLite when it is not.
//! The switch between paths is invisible to callers; remote failures
//! degrade ranking quality, never availability.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────┐   ┌────────────────┐
//! │  Upload  │──▶│  RetrievalEngine   │──▶│ Remote backend  │
//! │  Query   │   │ (monitor-gated)   │   │ (vector search) │
//! └──────────┘   └────────┬──────────┘   └────────────────┘
//!                         │ fallback
//!                         ▼
//!               ┌──────────────────┐
//!               │ SQLite + TF-IDF  │
//!               │ chunker / scorer │
//!               └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Caller-facing error taxonomy |
//! | [`extract`] | PDF/text page extraction |
//! | [`chunker`] | Structure-aware text chunking |
//! | [`scorer`] | TF-IDF lexical scoring and IDF caching |
//! | [`store`] | Local persistence (SQLite, in-memory) |
//! | [`remote`] | Remote backend HTTP client |
//! | [`health`] | Backend availability monitor |
//! | [`engine`] | Ingest/retrieve/delete orchestration |

pub mod chunker;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod health;
pub mod models;
pub mod remote;
pub mod scorer;
pub mod store;
