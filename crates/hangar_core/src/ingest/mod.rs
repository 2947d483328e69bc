use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::chunking::Chunker;
use crate::domain::{Chunk, ImageRecord, Page, ProcessingStats};
use crate::error::{codes, AppError};
use crate::images::associate;
use crate::store::{read_json, write_json_atomic};

pub const CHUNKS_FILE: &str = "processed_chunks.json";
pub const IMAGES_CATALOG_FILE: &str = "images_catalog.json";
pub const STATS_FILE: &str = "processing_stats.json";

/// Page separator emitted by `pdftotext`.
pub const PAGE_BREAK: char = '\x0c';

/// All pages of one manual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manual {
    pub source: String,
    pub pages: Vec<Page>,
}

/// Extraction boundary: anything that can hand over manuals as pages.
pub trait PageSource {
    fn manuals(&self) -> Result<Vec<Manual>, AppError>;
}

/// Reads `<stem>.txt` page dumps (form-feed separated) from a directory.
///
/// Each dump stands for `<stem>.pdf`. A `<stem>.images.json` sidecar, when present,
/// lists the images extracted from that manual.
#[derive(Debug, Clone)]
pub struct TextDirSource {
    dir: PathBuf,
}

impl TextDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn text_files(&self) -> Result<Vec<PathBuf>, AppError> {
        if !self.dir.is_dir() {
            return Err(AppError::new(codes::MANUAL_NOT_FOUND, "Manual directory not found")
                .with_details(format!("path={}", self.dir.display())));
        }
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            AppError::new(codes::INGEST_FAILED, "Failed to list manual directory")
                .with_details(format!("path={}; err={}", self.dir.display(), e))
        })?;
        let mut out: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("txt"))
            .collect();
        out.sort();
        Ok(out)
    }
}

impl PageSource for TextDirSource {
    fn manuals(&self) -> Result<Vec<Manual>, AppError> {
        let files = self.text_files()?;
        if files.is_empty() {
            return Err(AppError::new(codes::MANUAL_NOT_FOUND, "No manuals found to process")
                .with_details(format!("path={}", self.dir.display())));
        }

        let mut manuals = Vec::new();
        for path in files {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let source = format!("{stem}.pdf");
            let text = fs::read_to_string(&path).map_err(|e| {
                AppError::new(codes::INGEST_FAILED, "Failed to read manual text")
                    .with_details(format!("path={}; err={}", path.display(), e))
            })?;

            let sidecar = self.dir.join(format!("{stem}.images.json"));
            let images: Vec<ImageRecord> = if sidecar.exists() {
                read_json(&sidecar, codes::INGEST_FAILED, "image sidecar")?
            } else {
                Vec::new()
            };

            let pages = pages_from_text(&source, &text, &images);
            info!(source = %source, pages = pages.len(), images = images.len(), "loaded manual");
            manuals.push(Manual { source, pages });
        }
        Ok(manuals)
    }
}

/// Split a form-feed separated dump into 1-based pages, attaching images by page number.
///
/// Only images recorded for `source` are attached; the catalog is keyed by
/// `(source, page)`, so anything else could never be found at query time.
pub fn pages_from_text(source: &str, text: &str, images: &[ImageRecord]) -> Vec<Page> {
    let mut raw: Vec<&str> = text.split(PAGE_BREAK).collect();
    // pdftotext terminates the last page with a form feed as well.
    if raw.len() > 1 && raw.last().is_some_and(|p| p.trim().is_empty()) {
        raw.pop();
    }
    raw.into_iter()
        .enumerate()
        .map(|(i, body)| {
            let page_no = i as u32 + 1;
            let page_images = images
                .iter()
                .filter(|img| img.page == page_no && img.source == source)
                .cloned()
                .collect();
            Page::new(source, page_no, body).with_images(page_images)
        })
        .collect()
}

/// Everything produced by one offline processing run.
#[derive(Debug, Clone, Default)]
pub struct ProcessingOutput {
    pub chunks: Vec<Chunk>,
    pub images: Vec<ImageRecord>,
    pub stats: ProcessingStats,
}

pub fn process_manuals(manuals: &[Manual], chunker: &Chunker) -> ProcessingOutput {
    let mut out = ProcessingOutput::default();
    for manual in manuals {
        out.stats.total_pdfs += 1;
        out.stats.total_pages += manual.pages.len() as u64;
        for page in &manual.pages {
            out.images.extend(page.images.iter().cloned());
            out.stats.total_images += page.images.len() as u64;

            for chunk in chunker.chunk_page(page) {
                if chunk.metadata.has_warning {
                    out.stats.chunks_with_warnings += 1;
                }
                if chunk.metadata.is_procedure {
                    out.stats.chunks_with_procedures += 1;
                }
                if !associate(page, &chunk).is_empty() {
                    out.stats.chunks_with_diagrams += 1;
                }
                out.chunks.push(chunk);
            }
        }
    }
    out.stats.total_chunks = out.chunks.len() as u64;
    info!(
        pdfs = out.stats.total_pdfs,
        pages = out.stats.total_pages,
        chunks = out.stats.total_chunks,
        images = out.stats.total_images,
        "processing complete"
    );
    out
}

impl ProcessingOutput {
    /// Persist chunks, image catalog and stats under `dir`.
    pub fn write(&self, dir: &Path) -> Result<(), AppError> {
        write_json_atomic(&dir.join(CHUNKS_FILE), &self.chunks, codes::INGEST_FAILED, "chunk file")?;
        write_json_atomic(
            &dir.join(IMAGES_CATALOG_FILE),
            &self.images,
            codes::INGEST_FAILED,
            "image catalog",
        )?;
        write_json_atomic(&dir.join(STATS_FILE), &self.stats, codes::INGEST_FAILED, "processing stats")?;
        Ok(())
    }
}

/// Read the persisted chunk file. A missing file means nothing has been ingested yet.
pub fn read_chunks(path: &Path) -> Result<Vec<Chunk>, AppError> {
    if !path.exists() {
        return Err(AppError::new(
            codes::MANUAL_NOT_FOUND,
            "No processed manuals found; run processing first",
        )
        .with_details(format!("path={}", path.display())));
    }
    read_json(path, codes::INGEST_FAILED, "chunk file")
}
