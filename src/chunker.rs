//! Structure-aware text chunker.
//!
//! Splits one page of extracted document text into [`Chunk`]s bounded by a
//! configurable maximum size. Lines are classified (header, list item, code,
//! paragraph) so chunks break on structural boundaries instead of
//! mid-sentence, and every chunk carries the section header that was active
//! when it was emitted plus its source filename and page number.
//!
//! # Algorithm
//!
//! 1. Classify each line; blank lines separate paragraphs. Header detection
//!    uses pattern priority: markdown `#` > ALL-CAPS label > numbered section
//!    > roman numeral, first match wins. Lines inside a ``` fence are never
//!    headers.
//! 2. Group lines into content blocks (paragraphs, list runs, code blocks)
//!    and header markers.
//! 3. Greedily pack blocks into chunks up to `max_chars`. A header marker
//!    closes the open chunk and becomes the new section label. When a block
//!    does not fit, the open chunk is emitted and the next one is seeded
//!    with a small trailing overlap for cross-boundary context.
//! 4. A single block larger than `max_chars` is emitted whole as an
//!    oversized chunk rather than truncated.
//! 5. Chunks shorter than `min_chars` after trimming are discarded as noise.

use regex::Regex;

use crate::config::ChunkingConfig;
use crate::models::Chunk;

/// What a classified line turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Header,
    List,
    Code,
    Blank,
    Text,
}

/// An intermediate unit between line classification and chunk packing.
#[derive(Debug)]
enum Block {
    /// Section header text, marker symbols already stripped.
    Header(String),
    /// A paragraph, list run, or code block with its char span.
    Content {
        text: String,
        start: usize,
        end: usize,
    },
}

pub struct Chunker {
    config: ChunkingConfig,
    numbered: Regex,
    roman: Regex,
    list: Regex,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self {
            config,
            numbered: Regex::new(r"^(\d+)\.\s+([A-Z].*)").expect("numbered header regex"),
            roman: Regex::new(r"^([IVXLCDM]+)\.\s+(.*)").expect("roman header regex"),
            list: Regex::new(r"^([-*+•]|\d+\))\s+").expect("list item regex"),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ChunkingConfig::default())
    }

    /// Split one page of text into chunks tagged with `filename` and `page`.
    ///
    /// Empty or sub-minimum input yields zero chunks.
    pub fn chunk_page(&self, text: &str, page: i64, filename: &str) -> Vec<Chunk> {
        if text.trim().chars().count() < self.config.min_chars {
            return Vec::new();
        }

        let blocks = self.split_blocks(text);
        self.pack_blocks(blocks, page, filename)
    }

    /// Detect a header line and return its text without marker symbols.
    ///
    /// Pattern priority, first match wins: markdown > ALL-CAPS > numbered >
    /// roman numeral.
    fn detect_header(&self, line: &str) -> Option<String> {
        let stripped = line.trim();

        if let Some(rest) = strip_markdown_marker(stripped) {
            return Some(rest.to_string());
        }

        if is_all_caps_label(stripped) {
            return Some(stripped.trim_end_matches(':').trim().to_string());
        }

        if let Some(caps) = self.numbered.captures(stripped) {
            return Some(caps[2].trim().to_string());
        }

        if let Some(caps) = self.roman.captures(stripped) {
            let text = caps[2].trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }

        None
    }

    fn classify(&self, line: &str, in_code_fence: bool) -> LineKind {
        if in_code_fence {
            return LineKind::Code;
        }

        let stripped = line.trim();
        if stripped.is_empty() {
            return LineKind::Blank;
        }

        if is_code_fence(line) || is_indented_code(line) {
            return LineKind::Code;
        }

        if self.detect_header(line).is_some() {
            return LineKind::Header;
        }

        if self.list.is_match(stripped) {
            return LineKind::List;
        }

        LineKind::Text
    }

    /// Pass 1: classify lines and group them into blocks with char spans.
    fn split_blocks(&self, text: &str) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        let mut pending_kind = LineKind::Text;
        let mut pending_start = 0usize;
        let mut char_pos = 0usize;
        let mut in_code_fence = false;

        let flush =
            |pending: &mut Vec<&str>, blocks: &mut Vec<Block>, start: usize, end: usize| {
                if pending.is_empty() {
                    return;
                }
                let body = pending.join("\n");
                if !body.trim().is_empty() {
                    blocks.push(Block::Content {
                        text: body.trim_end().to_string(),
                        start,
                        end,
                    });
                }
                pending.clear();
            };

        for line in text.lines() {
            let line_len = line.chars().count() + 1;
            let kind = self.classify(line, in_code_fence);

            match kind {
                LineKind::Blank => {
                    flush(&mut pending, &mut blocks, pending_start, char_pos);
                }
                LineKind::Header => {
                    flush(&mut pending, &mut blocks, pending_start, char_pos);
                    if let Some(header) = self.detect_header(line) {
                        if !header.is_empty() {
                            blocks.push(Block::Header(header));
                        }
                    }
                }
                LineKind::Code | LineKind::List | LineKind::Text => {
                    // A kind change starts a new block so list runs and code
                    // blocks stay separate from surrounding prose.
                    if !pending.is_empty() && pending_kind != kind {
                        flush(&mut pending, &mut blocks, pending_start, char_pos);
                    }
                    if pending.is_empty() {
                        pending_start = char_pos;
                        pending_kind = kind;
                    }
                    pending.push(line);

                    if is_code_fence(line) {
                        if in_code_fence {
                            in_code_fence = false;
                            flush(&mut pending, &mut blocks, pending_start, char_pos + line_len);
                        } else {
                            in_code_fence = true;
                        }
                    }
                }
            }

            char_pos += line_len;
        }

        flush(&mut pending, &mut blocks, pending_start, char_pos);
        blocks
    }

    /// Pass 2: greedily pack blocks into bounded chunks.
    fn pack_blocks(&self, blocks: Vec<Block>, page: i64, filename: &str) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut current_header: Option<String> = None;
        let mut buf = String::new();
        let mut buf_start = 0usize;
        let mut buf_end = 0usize;
        let mut last_body: Option<String> = None;

        let mut emit = |buf: &mut String,
                        start: usize,
                        end: usize,
                        header: &Option<String>,
                        last_body: &mut Option<String>| {
            let body = buf.trim().to_string();
            buf.clear();
            if body.chars().count() < self.config.min_chars {
                return;
            }
            let text = match header {
                Some(h) => format!("## {}\n\n{}", h, body),
                None => body.clone(),
            };
            *last_body = Some(body);
            chunks.push(Chunk {
                text,
                page,
                filename: filename.to_string(),
                header: header.clone(),
                char_start: start as i64,
                char_end: end as i64,
            });
        };

        for block in blocks {
            match block {
                Block::Header(header) => {
                    emit(&mut buf, buf_start, buf_end, &current_header, &mut last_body);
                    current_header = Some(header);
                }
                Block::Content { text, start, end } => {
                    let block_len = text.chars().count();
                    let buf_len = buf.chars().count();

                    if !buf.is_empty() && buf_len + 1 + block_len > self.config.max_chars {
                        emit(&mut buf, buf_start, buf_end, &current_header, &mut last_body);
                        if self.config.overlap_chars > 0 {
                            if let Some(seed) = last_body
                                .as_deref()
                                .and_then(|b| overlap_tail(b, self.config.overlap_chars))
                            {
                                buf.push_str(seed);
                            }
                        }
                        // The seed belongs to the previous span; the new
                        // chunk's span starts at this block.
                        buf_start = start;
                    }

                    if buf.is_empty() {
                        buf_start = start;
                    }
                    if !buf.is_empty() {
                        buf.push('\n');
                    }
                    buf.push_str(&text);
                    buf_end = end;
                }
            }
        }

        emit(&mut buf, buf_start, buf_end, &current_header, &mut last_body);
        chunks
    }
}

/// Strip a markdown header marker (`#` .. `######` followed by a space).
fn strip_markdown_marker(line: &str) -> Option<&str> {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if (1..=6).contains(&hashes) {
        let rest = &line[hashes..];
        if let Some(text) = rest.strip_prefix(' ') {
            let text = text.trim();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// A short line of only uppercase letters and spaces, optionally ending
/// with a colon, reads as a section label.
pub(crate) fn is_all_caps_label(line: &str) -> bool {
    let body = line.trim_end_matches(':').trim_end();
    if body.len() < 3 || body.len() > 60 {
        return false;
    }
    if !body.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
        return false;
    }
    body.chars()
        .all(|c| c.is_ascii_uppercase() || c == ' ')
}

fn is_code_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

fn is_indented_code(line: &str) -> bool {
    let ws: String = line.chars().take_while(|c| c.is_whitespace()).collect();
    let indent = ws.chars().map(|c| if c == '\t' { 4 } else { 1 }).sum::<usize>();
    indent >= 4 && !line.trim().is_empty()
}

/// Take the trailing `max` characters of `body`, snapped forward to the next
/// word start so the seed never begins mid-word.
fn overlap_tail(body: &str, max: usize) -> Option<&str> {
    let total = body.chars().count();
    if total <= max {
        return None;
    }
    let skip = total - max;
    let byte_start = body
        .char_indices()
        .nth(skip)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    let tail = &body[byte_start..];
    // Advance past the matched separator by its encoded width; whitespace
    // like U+00A0 is more than one byte.
    let word_start = tail
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let seed = tail[word_start..].trim_start();
    if seed.is_empty() {
        None
    } else {
        Some(seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(max: usize, overlap: usize, min: usize) -> Chunker {
        Chunker::new(ChunkingConfig {
            max_chars: max,
            overlap_chars: overlap,
            min_chars: min,
        })
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let c = Chunker::with_defaults();
        assert!(c.chunk_page("", 1, "a.pdf").is_empty());
        assert!(c.chunk_page("   \n\n  ", 1, "a.pdf").is_empty());
    }

    #[test]
    fn test_sub_minimum_input_yields_no_chunks() {
        let c = Chunker::with_defaults();
        assert!(c.chunk_page("too short", 1, "a.pdf").is_empty());
    }

    #[test]
    fn test_single_paragraph_single_chunk() {
        let c = Chunker::with_defaults();
        let text = "Routing protocols exchange reachability information between \
                    neighboring routers so each node can build a forwarding table.";
        let chunks = c.chunk_page(text, 3, "net.pdf");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page, 3);
        assert_eq!(chunks[0].filename, "net.pdf");
        assert!(chunks[0].header.is_none());
    }

    #[test]
    fn test_header_labels_following_chunks() {
        let c = chunker(200, 0, 10);
        let text = "## Routing\n\nDistance vector protocols converge slowly.\n\n\
                    Link state protocols flood topology information.";
        let chunks = c.chunk_page(text, 1, "net.pdf");
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert_eq!(chunk.header.as_deref(), Some("Routing"));
            assert!(chunk.text.starts_with("## Routing\n\n"));
        }
    }

    #[test]
    fn test_header_replaces_previous_header() {
        let c = chunker(200, 0, 10);
        let text = "# First\n\nContent under the first section.\n\n\
                    # Second\n\nContent under the second section.";
        let chunks = c.chunk_page(text, 1, "a.pdf");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].header.as_deref(), Some("First"));
        assert_eq!(chunks[1].header.as_deref(), Some("Second"));
    }

    #[test]
    fn test_chunk_size_bound_holds() {
        let max = 120;
        let c = chunker(max, 20, 10);
        let paragraphs: Vec<String> = (0..8)
            .map(|i| format!("Paragraph number {} talks about packet forwarding rules.", i))
            .collect();
        let text = paragraphs.join("\n\n");
        let chunks = c.chunk_page(&text, 1, "a.pdf");
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            // Bound applies to the body; allow the overlap seed and the
            // header prefix on top.
            assert!(
                chunk.text.chars().count() <= max + 20 + 1,
                "chunk too large: {} chars",
                chunk.text.chars().count()
            );
        }
    }

    #[test]
    fn test_oversized_block_emitted_whole() {
        let c = chunker(100, 0, 10);
        let long_line = "x".repeat(400);
        let chunks = c.chunk_page(&long_line, 1, "a.pdf");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text.chars().count(), 400);
    }

    #[test]
    fn test_order_preserved() {
        let c = chunker(80, 0, 5);
        let text = "alpha one two three.\n\nbravo four five six.\n\n\
                    charlie seven eight nine.\n\ndelta ten eleven twelve.";
        let chunks = c.chunk_page(text, 1, "a.pdf");
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        let alpha = joined.find("alpha").unwrap();
        let bravo = joined.find("bravo").unwrap();
        let charlie = joined.find("charlie").unwrap();
        let delta = joined.find("delta").unwrap();
        assert!(alpha < bravo && bravo < charlie && charlie < delta);
    }

    #[test]
    fn test_small_trailing_chunk_discarded() {
        let c = chunker(60, 0, 30);
        let text = "This opening paragraph is comfortably over the minimum chunk size.\n\nok.";
        let chunks = c.chunk_page(text, 1, "a.pdf");
        assert_eq!(chunks.len(), 1);
        assert!(!chunks[0].text.ends_with("ok."));
    }

    #[test]
    fn test_header_priority_markdown_over_caps() {
        let c = Chunker::with_defaults();
        assert_eq!(c.detect_header("## NETWORK LAYERS").as_deref(), Some("NETWORK LAYERS"));
        assert_eq!(c.detect_header("NETWORK LAYERS:").as_deref(), Some("NETWORK LAYERS"));
        assert_eq!(c.detect_header("3. Transport Layer").as_deref(), Some("Transport Layer"));
        assert_eq!(c.detect_header("IV. Session Layer").as_deref(), Some("Session Layer"));
        assert_eq!(c.detect_header("plain prose line"), None);
        assert_eq!(c.detect_header("3. lowercase is not a section"), None);
    }

    #[test]
    fn test_code_fence_contents_not_headers() {
        let c = chunker(300, 0, 10);
        let text = "Intro paragraph before the code.\n\n```\n# not a header\nTELNET\n```\n\nAfter.";
        let chunks = c.chunk_page(text, 1, "a.pdf");
        for chunk in &chunks {
            assert!(chunk.header.is_none(), "fence content treated as header");
        }
        assert!(chunks.iter().any(|c| c.text.contains("# not a header")));
    }

    #[test]
    fn test_overlap_seeds_next_chunk() {
        let c = chunker(90, 30, 5);
        let text = "first paragraph ends with anchor words.\n\n\
                    second paragraph continues the discussion at length here.";
        let chunks = c.chunk_page(text, 1, "a.pdf");
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].text.contains("anchor words."));
        assert!(chunks[1].text.contains("second paragraph"));
    }

    #[test]
    fn test_overlap_tail_snaps_to_word() {
        let seed = overlap_tail("alpha bravo charlie delta", 10).unwrap();
        assert_eq!(seed, "delta");
        assert!(overlap_tail("short", 10).is_none());
    }

    #[test]
    fn test_overlap_tail_handles_nbsp_separator() {
        // First whitespace inside the tail window is a two-byte U+00A0.
        let seed = overlap_tail("aaaa\u{a0}bbbb cccc dddd eeee", 21).unwrap();
        assert_eq!(seed, "bbbb cccc dddd eeee");
    }

    #[test]
    fn test_nbsp_in_overlap_window_does_not_panic() {
        let c = chunker(60, 20, 5);
        let text = "first paragraph ends with anchor\u{a0}words right here.\n\n\
                    second paragraph continues the discussion at length afterwards.";
        let chunks = c.chunk_page(text, 1, "a.pdf");
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].text.contains("second paragraph"));
    }

    #[test]
    fn test_multibyte_text_does_not_panic() {
        let c = chunker(60, 20, 5);
        let text = "Überblick über die Architektur — сначала маршрутизация.\n\n\
                    Danach folgt die Beschreibung der Vermittlungsschicht im Detail.";
        let chunks = c.chunk_page(text, 1, "a.pdf");
        assert!(!chunks.is_empty());
    }
}
