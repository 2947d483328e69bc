use hangar_core::config::DEFAULT_MIN_RELEVANCE;
use hangar_core::error::{codes, AppError};
use tracing::debug;

use crate::index::{IndexManager, SearchHit};

/// Top-k retrieval with a relevance floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Retriever {
    pub top_k: usize,
    /// Hits scoring at or below this are treated as unrelated.
    pub min_relevance: f32,
}

impl Default for Retriever {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_relevance: DEFAULT_MIN_RELEVANCE,
        }
    }
}

impl Retriever {
    pub fn retrieve(&self, index: &IndexManager, query: &str) -> Result<Vec<SearchHit>, AppError> {
        let q = query.trim();
        if q.is_empty() {
            return Err(AppError::new(codes::RETRIEVAL_FAILED, "Query must not be empty"));
        }
        let top_k = self.top_k.clamp(1, 50);

        let hits = index.search(q, top_k)?;
        let found = hits.len();
        let kept: Vec<SearchHit> = hits
            .into_iter()
            .filter(|h| h.score > self.min_relevance)
            .enumerate()
            .map(|(i, mut h)| {
                h.rank = i + 1;
                h
            })
            .collect();
        debug!(found, kept = kept.len(), "retrieved chunks");
        Ok(kept)
    }
}
