use serde::{Deserialize, Serialize};

/// Provenance of one extracted page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageMetadata {
    pub source: String,
    pub page: u32,
}

/// One page as produced by extraction. Consumed by chunking, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    pub text: String,
    pub metadata: PageMetadata,
    #[serde(default)]
    pub images: Vec<ImageRecord>,
}

impl Page {
    pub fn new(source: impl Into<String>, page: u32, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: PageMetadata {
                source: source.into(),
                page,
            },
            images: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<ImageRecord>) -> Self {
        self.images = images;
        self
    }
}

/// Provenance plus aviation tags for a chunk.
///
/// Flags default to `false` so chunk files written without tags still load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub source: String,
    pub page: u32,
    pub chunk_index: u32,
    #[serde(default)]
    pub ata_chapter: Option<String>,
    #[serde(default)]
    pub aircraft_type: Option<String>,
    #[serde(default)]
    pub has_warning: bool,
    #[serde(default)]
    pub has_caution: bool,
    #[serde(default)]
    pub is_procedure: bool,
    #[serde(default)]
    pub has_diagram: bool,
}

impl ChunkMetadata {
    /// Provenance only; every tag unset.
    pub fn untagged(source: impl Into<String>, page: u32, chunk_index: u32) -> Self {
        Self {
            source: source.into(),
            page,
            chunk_index,
            ata_chapter: None,
            aircraft_type: None,
            has_warning: false,
            has_caution: false,
            is_procedure: false,
            has_diagram: false,
        }
    }
}

/// Identity of a chunk within one processing run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    pub source: String,
    pub page: u32,
    pub chunk_index: u32,
}

impl std::fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#p{}c{}", self.source, self.page, self.chunk_index)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn key(&self) -> ChunkKey {
        ChunkKey {
            source: self.metadata.source.clone(),
            page: self.metadata.page,
            chunk_index: self.metadata.chunk_index,
        }
    }
}

/// An extracted figure. The filesystem owns the bytes; this is only the reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageRecord {
    pub filename: String,
    pub path: String,
    #[serde(default)]
    pub ext: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    pub page: u32,
    pub source: String,
}

/// Diagnostic counters written after offline processing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessingStats {
    pub total_pdfs: u64,
    pub total_pages: u64,
    pub total_chunks: u64,
    pub total_images: u64,
    pub chunks_with_warnings: u64,
    pub chunks_with_procedures: u64,
    pub chunks_with_diagrams: u64,
}
