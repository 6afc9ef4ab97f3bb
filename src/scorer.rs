//! Lexical TF-IDF scoring for the local retrieval path.
//!
//! Ranks chunks against a query with no network dependency: term frequency
//! normalized by chunk length, smoothed inverse document frequency computed
//! over the current chunk corpus, and query-term weighting by normalized
//! frequency within the query. Phrase matches and header-like chunks receive
//! multiplicative boosts.
//!
//! The IDF table is expensive to rebuild, so it lives in an explicit,
//! injectable [`IdfCache`] keyed by subject. The engine invalidates the whole
//! cache on every corpus-mutating operation; a cleared entry is rebuilt
//! lazily from the full chunk set on the next scoring request.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::chunker::is_all_caps_label;

/// Raw score multiplier when the chunk contains the full query as a substring.
const PHRASE_BOOST: f64 = 1.5;
/// Raw score multiplier for chunks that read as section titles/definitions.
const HEADER_BOOST: f64 = 1.2;

/// Stop words dropped during tokenization.
const STOP_WORDS: &[&str] = &[
    "the", "and", "but", "for", "with", "from", "was", "are", "were", "been",
    "have", "has", "had", "does", "did", "will", "would", "could", "should",
    "may", "might", "must", "shall", "can", "need", "this", "that", "these",
    "those", "its", "they", "them", "their", "what", "which", "who", "whom",
    "when", "where", "why", "how", "all", "each", "every", "both", "few",
    "more", "most", "other", "some", "such", "nor", "not", "only", "own",
    "same", "than", "too", "very", "just", "also", "now", "here", "there",
    "about", "into", "over", "after", "below", "between", "under", "again",
    "then", "once", "during", "while", "before", "above", "being", "through",
    "further", "because", "until",
];

/// Lowercase, strip punctuation, split on whitespace, and drop stop words
/// and tokens of length <= 2.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 2 && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Immutable IDF table built from one chunk corpus.
#[derive(Debug)]
pub struct IdfTable {
    idf: HashMap<String, f64>,
    /// Smoothed floor for terms absent from the corpus (df = 0).
    default_idf: f64,
}

impl IdfTable {
    /// Build from the full current corpus of chunk texts.
    ///
    /// `idf(term) = ln((N + 1) / (df + 1)) + 1`; the smoothing keeps every
    /// value positive and defined even for unseen terms.
    pub fn build<S: AsRef<str>>(texts: &[S]) -> Self {
        let n = texts.len() as f64;
        let mut doc_freq: HashMap<String, u64> = HashMap::new();

        for text in texts {
            let mut seen: Vec<String> = tokenize(text.as_ref());
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let idf = doc_freq
            .into_iter()
            .map(|(term, df)| (term, ((n + 1.0) / (df as f64 + 1.0)).ln() + 1.0))
            .collect();

        Self {
            idf,
            default_idf: (n + 1.0).ln() + 1.0,
        }
    }

    pub fn idf(&self, term: &str) -> f64 {
        self.idf.get(term).copied().unwrap_or(self.default_idf)
    }
}

/// Process-wide IDF cache, keyed by subject id.
///
/// Modeled as an explicit stateful service rather than a hidden singleton so
/// tests can reset and seed it deterministically.
#[derive(Default)]
pub struct IdfCache {
    tables: RwLock<HashMap<String, Arc<IdfTable>>>,
}

impl IdfCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached table for `subject_id`, building it with `build`
    /// on a miss.
    pub fn get_or_build<F>(&self, subject_id: &str, build: F) -> Arc<IdfTable>
    where
        F: FnOnce() -> IdfTable,
    {
        if let Some(table) = self.tables.read().unwrap().get(subject_id) {
            return Arc::clone(table);
        }

        let table = Arc::new(build());
        self.tables
            .write()
            .unwrap()
            .entry(subject_id.to_string())
            .or_insert_with(|| Arc::clone(&table))
            .clone()
    }

    /// Drop every cached table. Called on any corpus mutation.
    pub fn invalidate(&self) {
        self.tables.write().unwrap().clear();
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.tables.read().unwrap().is_empty()
    }
}

/// Score every chunk text against `query`, in input order.
///
/// An empty or all-stop-word query yields 0.0 for every chunk; callers drop
/// zero scores from results.
pub fn score_chunks<S: AsRef<str>>(query: &str, texts: &[S], idf: &IdfTable) -> Vec<f64> {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return vec![0.0; texts.len()];
    }

    // Normalized frequency of each term within the query itself, so a
    // repeated query term counts proportionally more.
    let query_len = query_tokens.len() as f64;
    let mut query_weight: HashMap<&str, f64> = HashMap::new();
    for term in &query_tokens {
        *query_weight.entry(term.as_str()).or_insert(0.0) += 1.0 / query_len;
    }

    let query_lower = query.trim().to_lowercase();

    texts
        .iter()
        .map(|text| {
            let text = text.as_ref();
            let tokens = tokenize(text);
            if tokens.is_empty() {
                return 0.0;
            }

            let total = tokens.len() as f64;
            let mut tf: HashMap<&str, f64> = HashMap::new();
            for token in &tokens {
                *tf.entry(token.as_str()).or_insert(0.0) += 1.0 / total;
            }

            let mut score: f64 = query_weight
                .iter()
                .map(|(term, weight)| {
                    tf.get(term).copied().unwrap_or(0.0) * idf.idf(term) * weight
                })
                .sum();

            if score > 0.0 {
                if !query_lower.is_empty() && text.to_lowercase().contains(&query_lower) {
                    score *= PHRASE_BOOST;
                }
                if looks_header_like(text) {
                    score *= HEADER_BOOST;
                }
            }

            score
        })
        .collect()
}

/// Section titles and definition labels deserve a ranking bump: a chunk
/// whose first line is a markdown header or an ALL-CAPS label.
fn looks_header_like(text: &str) -> bool {
    let first_line = text.lines().next().unwrap_or("").trim();
    let hashes = first_line.chars().take_while(|&c| c == '#').count();
    if (1..=6).contains(&hashes) && first_line[hashes..].starts_with(' ') {
        return true;
    }
    is_all_caps_label(first_line)
}
