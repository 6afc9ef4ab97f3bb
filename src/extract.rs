//! Text extraction from uploaded documents.
//!
//! Supports PDF (via `pdf-extract`), plain text, and markdown. Extraction
//! yields per-page text; plain text and markdown count as a single page.

use anyhow::{Context, Result};
use regex::Regex;
use std::sync::OnceLock;

/// MIME types accepted for ingestion.
const SUPPORTED_MIMES: &[&str] = &["application/pdf", "text/plain", "text/markdown"];

pub fn is_supported_mime(mime: &str) -> bool {
    SUPPORTED_MIMES.contains(&mime)
}

/// Extract per-page text from the raw upload.
///
/// Pages are numbered from 1. Pages that are blank after cleanup are
/// dropped, but the remaining pages keep their original numbers so
/// citations stay correct.
pub fn extract_pages(data: &[u8], mime: &str) -> Result<Vec<(i64, String)>> {
    match mime {
        "application/pdf" => {
            let text = pdf_extract::extract_text_from_mem(data)
                .context("failed to extract text from PDF")?;
            Ok(paginate(&text))
        }
        "text/plain" | "text/markdown" => {
            let text = std::str::from_utf8(data).context("file is not valid UTF-8")?;
            let page = cleanup(text);
            Ok(if page.is_empty() {
                Vec::new()
            } else {
                vec![(1, page)]
            })
        }
        other => anyhow::bail!("unsupported document format: {}", other),
    }
}

/// Split extracted text on form feeds (pdf-extract's page separator) into
/// numbered pages. Pages that are blank after cleanup are dropped; the
/// surviving pages keep their original numbers.
fn paginate(text: &str) -> Vec<(i64, String)> {
    text.split('\x0c')
        .enumerate()
        .map(|(i, page)| (i as i64 + 1, cleanup(page)))
        .filter(|(_, page)| !page.is_empty())
        .collect()
}

/// Collapse extraction artifacts: runs of 3+ newlines become a paragraph
/// break, runs of spaces become one space.
fn cleanup(text: &str) -> String {
    static NEWLINES: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();

    let newlines = NEWLINES.get_or_init(|| Regex::new(r"\n{3,}").unwrap());
    let spaces = SPACES.get_or_init(|| Regex::new(r" {2,}").unwrap());

    let text = newlines.replace_all(text, "\n\n");
    let text = spaces.replace_all(&text, " ");
    text.trim().to_string()
}
