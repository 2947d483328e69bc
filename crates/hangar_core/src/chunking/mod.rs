use tracing::debug;

use crate::domain::{Chunk, Page};
use crate::metadata::{extract, merge_chunk_metadata};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Split boundaries for maintenance manuals, highest priority first.
///
/// The final empty separator splits into single characters.
pub const MANUAL_SEPARATORS: &[&str] = &[
    "\n## ",
    "\n### ",
    "\nSTEP ",
    "\nNOTE:",
    "\nWARNING:",
    "\nCAUTION:",
    "\n\n",
    "\n",
    ". ",
    " ",
    "",
];

/// Recursive separator splitter. Lengths are measured in characters.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
            separators: MANUAL_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Chunk every page, tagging each chunk with merged page/chunk metadata.
    pub fn chunk(&self, pages: &[Page]) -> Vec<Chunk> {
        let mut out = Vec::new();
        for page in pages {
            out.extend(self.chunk_page(page));
        }
        out
    }

    pub fn chunk_page(&self, page: &Page) -> Vec<Chunk> {
        let page_tags = extract(&page.text, &page.metadata.source);
        let chunks: Vec<Chunk> = self
            .split_text(&page.text)
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let chunk_tags = extract(&text, &page.metadata.source);
                let metadata =
                    merge_chunk_metadata(&page.metadata, &page_tags, &chunk_tags, i as u32);
                Chunk { text, metadata }
            })
            .collect();
        debug!(
            source = %page.metadata.source,
            page = page.metadata.page,
            chunks = chunks.len(),
            "chunked page"
        );
        chunks
    }

    /// Split raw text into overlapping segments no longer than `chunk_size` where a boundary allows.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let seps: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        self.split_recursive(text, &seps)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut rest: &[&str] = &[];
        for (i, s) in separators.iter().enumerate() {
            if s.is_empty() {
                separator = s;
                break;
            }
            if text.contains(s) {
                separator = s;
                rest = &separators[i + 1..];
                break;
            }
        }

        let splits = split_keeping_separator(text, separator);
        let mut out = Vec::new();
        let mut good: Vec<String> = Vec::new();
        for s in splits {
            if char_len(&s) < self.chunk_size {
                good.push(s);
                continue;
            }
            if !good.is_empty() {
                out.extend(self.merge_splits(&good));
                good.clear();
            }
            if rest.is_empty() {
                out.push(s);
            } else {
                out.extend(self.split_recursive(&s, rest));
            }
        }
        if !good.is_empty() {
            out.extend(self.merge_splits(&good));
        }
        out
    }

    /// Greedily pack splits into segments, carrying up to `chunk_overlap` characters forward.
    fn merge_splits(&self, splits: &[String]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: std::collections::VecDeque<&str> = std::collections::VecDeque::new();
        let mut total = 0usize;

        for d in splits {
            let len = char_len(d);
            if total + len > self.chunk_size && !current.is_empty() {
                if let Some(doc) = join_segment(&current) {
                    docs.push(doc);
                }
                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    match current.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            current.push_back(d.as_str());
            total += len;
        }
        if let Some(doc) = join_segment(&current) {
            docs.push(doc);
        }
        docs
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join_segment(parts: &std::collections::VecDeque<&str>) -> Option<String> {
    let joined: String = parts.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Split on `separator`, attaching each separator to the start of the piece that follows it.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(|c| c.to_string()).collect();
    }
    let mut out = Vec::new();
    let mut start = 0usize;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            out.push(text[start..idx].to_string());
        }
        start = idx;
    }
    if start < text.len() {
        out.push(text[start..].to_string());
    }
    out.retain(|s| !s.is_empty());
    out
}
