use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use tracing::warn;

use crate::domain::{Chunk, ImageRecord, Page};
use crate::error::{codes, AppError};
use crate::metadata::has_figure_reference;

/// Images attached to `chunk` when it cites a figure or is tagged as a diagram chunk.
///
/// Matching is page-granular: every image on the page qualifies.
pub fn associate(page: &Page, chunk: &Chunk) -> Vec<ImageRecord> {
    if page.images.is_empty() {
        return Vec::new();
    }
    if has_figure_reference(&chunk.text) || chunk.metadata.has_diagram {
        page.images.clone()
    } else {
        Vec::new()
    }
}

/// Extracted images indexed by `(source, page)`.
#[derive(Debug, Clone, Default)]
pub struct ImageCatalog {
    by_page: BTreeMap<(String, u32), Vec<ImageRecord>>,
    total: usize,
}

impl ImageCatalog {
    pub fn from_records(records: Vec<ImageRecord>) -> Self {
        let mut by_page: BTreeMap<(String, u32), Vec<ImageRecord>> = BTreeMap::new();
        let total = records.len();
        for r in records {
            by_page
                .entry((r.source.clone(), r.page))
                .or_default()
                .push(r);
        }
        Self { by_page, total }
    }

    /// Read a JSON array catalog. A missing file is an empty catalog.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            warn!(path = %path.display(), "image catalog not found; diagrams disabled");
            return Ok(Self::default());
        }
        let bytes = fs::read(path).map_err(|e| {
            AppError::new(codes::CATALOG_FAILED, "Failed to read image catalog")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        let records: Vec<ImageRecord> = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::new(codes::CATALOG_FAILED, "Failed to decode image catalog")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        Ok(Self::from_records(records))
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn images_for(&self, source: &str, page: u32) -> &[ImageRecord] {
        self.by_page
            .get(&(source.to_string(), page))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Images for the given chunks in chunk order, each image path at most once.
    pub fn images_for_chunks<'a, I>(&self, chunks: I) -> Vec<ImageRecord>
    where
        I: IntoIterator<Item = &'a Chunk>,
    {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for c in chunks {
            for img in self.images_for(&c.metadata.source, c.metadata.page) {
                if seen.insert(img.path.clone()) {
                    out.push(img.clone());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChunkMetadata;

    fn img(source: &str, page: u32, name: &str) -> ImageRecord {
        ImageRecord {
            filename: name.to_string(),
            path: format!("/img/{name}"),
            ext: "png".to_string(),
            width: Some(10),
            height: Some(20),
            page,
            source: source.to_string(),
        }
    }

    fn chunk(text: &str, has_diagram: bool) -> Chunk {
        let mut metadata = ChunkMetadata::untagged("m.pdf", 3, 0);
        metadata.has_diagram = has_diagram;
        Chunk {
            text: text.to_string(),
            metadata,
        }
    }

    #[test]
    fn associates_all_page_images_on_figure_reference() {
        let page = Page::new("m.pdf", 3, "text").with_images(vec![img("m.pdf", 3, "a.png"), img("m.pdf", 3, "b.png")]);
        assert_eq!(associate(&page, &chunk("see Fig. 4", false)).len(), 2);
        assert_eq!(associate(&page, &chunk("plain", true)).len(), 2);
        assert!(associate(&page, &chunk("plain", false)).is_empty());
    }

    #[test]
    fn catalog_lookup_is_keyed_by_source_and_page() {
        let catalog = ImageCatalog::from_records(vec![
            img("m.pdf", 3, "a.png"),
            img("m.pdf", 4, "b.png"),
            img("other.pdf", 3, "c.png"),
        ]);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.images_for("m.pdf", 3).len(), 1);
        assert!(catalog.images_for("m.pdf", 9).is_empty());

        let c = chunk("x", false);
        let found = catalog.images_for_chunks([&c, &c]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].filename, "a.png");
    }
}
