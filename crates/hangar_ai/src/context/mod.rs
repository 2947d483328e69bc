use hangar_core::domain::ImageRecord;
use serde::{Deserialize, Serialize};

use crate::index::SearchHit;

pub const SOURCE_DELIMITER: &str = "\n\n---\n\n";
pub const DIAGRAM_SECTION_HEADER: &str = "\n\n--- DIAGRAM ANALYSIS ---\n\n";

/// Vision output for one diagram.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageAnalysis {
    pub filename: String,
    pub page: u32,
    pub analysis: String,
}

/// Display form of a retrieved chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRef {
    pub content: String,
    pub source: String,
    pub page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageRef {
    pub filename: String,
    pub path: String,
    pub page: u32,
    pub source: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl From<&ImageRecord> for ImageRef {
    fn from(img: &ImageRecord) -> Self {
        Self {
            filename: img.filename.clone(),
            path: img.path.clone(),
            page: img.page,
            source: img.source.clone(),
            width: img.width,
            height: img.height,
        }
    }
}

/// Render the prompt context: one tagged block per hit in rank order, then any diagram analyses.
///
/// Chunk text is never truncated here.
pub fn assemble(hits: &[SearchHit], analyses: &[ImageAnalysis]) -> String {
    let blocks: Vec<String> = hits
        .iter()
        .map(|h| {
            format!(
                "[Source {}: {}, Page {}]\n{}",
                h.rank, h.chunk.metadata.source, h.chunk.metadata.page, h.chunk.text
            )
        })
        .collect();
    let mut context = blocks.join(SOURCE_DELIMITER);

    if !analyses.is_empty() {
        context.push_str(DIAGRAM_SECTION_HEADER);
        for (i, a) in analyses.iter().enumerate() {
            context.push_str(&format!(
                "[Diagram {}: {}, Page {}]\n{}\n\n",
                i + 1,
                a.filename,
                a.page,
                a.analysis
            ));
        }
    }
    context
}

pub fn source_refs(hits: &[SearchHit], preview_chars: usize) -> Vec<SourceRef> {
    hits.iter()
        .map(|h| SourceRef {
            content: preview(&h.chunk.text, preview_chars),
            source: h.chunk.metadata.source.clone(),
            page: h.chunk.metadata.page,
        })
        .collect()
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
