//! Semantic index over manual chunks.
//!
//! Lifecycle: `IndexManager::new` starts uninitialized; `build` or `load`
//! installs a complete [`VectorIndex`]; a later `build`/`load` swaps in a new one.
//! Installed indexes are never mutated, so concurrent `search` calls only share
//! an `Arc` to read-only data.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use hangar_core::domain::Chunk;
use hangar_core::error::{codes, AppError};
use hangar_core::store::{read_json, write_json_atomic};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::embeddings::Embedder;

mod similarity;

pub use similarity::{cosine_similarity, l2_norm};

pub const STATUS_FILE: &str = "index_status.json";
pub const ENTRIES_FILE: &str = "index_entries.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStatus {
    pub ready: bool,
    pub model: Option<String>,
    pub dims: Option<u32>,
    pub chunk_count: u32,
    pub updated_at: Option<String>,
}

impl IndexStatus {
    fn not_ready() -> Self {
        Self {
            ready: false,
            model: None,
            dims: None,
            chunk_count: 0,
            updated_at: None,
        }
    }
}

/// One retrieved chunk. `rank` is 1-based, 1 being the most relevant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub rank: usize,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    chunk: Chunk,
    text_sha256: String,
    vector: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct IndexFile {
    model: String,
    dims: u32,
    updated_at: String,
    entries: Vec<IndexEntry>,
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    model: &'a str,
    dims: u32,
    updated_at: &'a str,
    entries: &'a [IndexEntry],
}

/// A complete, immutable index.
#[derive(Debug)]
pub struct VectorIndex {
    model: String,
    dims: u32,
    updated_at: String,
    entries: Vec<IndexEntry>,
    norms: Vec<f32>,
}

impl VectorIndex {
    fn new(model: String, dims: u32, updated_at: String, entries: Vec<IndexEntry>) -> Result<Self, AppError> {
        for e in &entries {
            if e.vector.len() as u32 != dims {
                return Err(AppError::new(codes::INDEX_LOAD_FAILED, "Index vector dims mismatch")
                    .with_details(format!(
                        "chunk={}; expected={}; got={}",
                        e.chunk.key(),
                        dims,
                        e.vector.len()
                    )));
            }
        }
        let norms = entries.iter().map(|e| l2_norm(&e.vector)).collect();
        Ok(Self {
            model,
            dims,
            updated_at,
            entries,
            norms,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> u32 {
        self.dims
    }

    pub fn status(&self) -> IndexStatus {
        IndexStatus {
            ready: true,
            model: Some(self.model.clone()),
            dims: Some(self.dims),
            chunk_count: self.entries.len() as u32,
            updated_at: Some(self.updated_at.clone()),
        }
    }

    /// Top `k` entries by cosine similarity; ties break on chunk identity.
    fn nearest(&self, query: &[f32], query_norm: f32, k: usize) -> Vec<SearchHit> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(i, _)| self.norms[*i] != 0.0)
            .map(|(i, e)| (i, cosine_similarity(query, &e.vector, query_norm, self.norms[i])))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| self.entries[a.0].chunk.key().cmp(&self.entries[b.0].chunk.key()))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .enumerate()
            .map(|(pos, (i, score))| SearchHit {
                chunk: self.entries[i].chunk.clone(),
                rank: pos + 1,
                score,
            })
            .collect()
    }
}

fn text_sha256(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

fn now_rfc3339_utc() -> Result<String, AppError> {
    OffsetDateTime::now_utc().format(&Rfc3339).map_err(|e| {
        AppError::new(codes::INDEX_BUILD_FAILED, "Failed to format index timestamp")
            .with_details(e.to_string())
    })
}

/// Owns the on-disk index directory and the currently installed index.
pub struct IndexManager {
    root: PathBuf,
    model: String,
    embedder: Arc<dyn Embedder + Send + Sync>,
    current: RwLock<Option<Arc<VectorIndex>>>,
}

impl IndexManager {
    pub fn new(root: PathBuf, model: impl Into<String>, embedder: Arc<dyn Embedder + Send + Sync>) -> Self {
        Self {
            root,
            model: model.into(),
            embedder,
            current: RwLock::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn status_path(&self) -> PathBuf {
        self.root.join(STATUS_FILE)
    }

    fn entries_path(&self) -> PathBuf {
        self.root.join(ENTRIES_FILE)
    }

    fn installed(&self) -> Option<Arc<VectorIndex>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn install(&self, index: Arc<VectorIndex>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(index);
    }

    fn require_installed(&self) -> Result<Arc<VectorIndex>, AppError> {
        self.installed().ok_or_else(|| {
            AppError::new(
                codes::INDEX_NOT_LOADED,
                "Index not loaded; build or load the index before searching",
            )
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.installed().is_some()
    }

    /// Status of the persisted index, without loading vectors.
    pub fn status(&self) -> Result<IndexStatus, AppError> {
        let path = self.status_path();
        if !path.exists() {
            return Ok(IndexStatus::not_ready());
        }
        read_json(&path, codes::INDEX_LOAD_FAILED, "index status")
    }

    /// Vectors that can be carried into a new build: same model, keyed by text hash.
    fn reusable_vectors(&self) -> HashMap<String, Vec<f32>> {
        let from_entries = |entries: &[IndexEntry]| {
            entries
                .iter()
                .map(|e| (e.text_sha256.clone(), e.vector.clone()))
                .collect::<HashMap<_, _>>()
        };

        if let Some(index) = self.installed() {
            if index.model == self.model {
                return from_entries(&index.entries);
            }
            return HashMap::new();
        }

        let path = self.entries_path();
        if !path.exists() {
            return HashMap::new();
        }
        match read_json::<IndexFile>(&path, codes::INDEX_LOAD_FAILED, "index entries") {
            Ok(file) if file.model == self.model => from_entries(&file.entries),
            Ok(_) => HashMap::new(),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable persisted index during rebuild");
                HashMap::new()
            }
        }
    }

    /// Embed every chunk and install the result as the current index.
    ///
    /// Nothing on disk changes here; the previous persisted index stays intact
    /// until [`IndexManager::persist`] succeeds.
    pub fn build(&self, chunks: &[Chunk]) -> Result<IndexStatus, AppError> {
        if chunks.is_empty() {
            return Err(AppError::new(
                codes::INDEX_BUILD_FAILED,
                "No chunks available; process manuals before building the index",
            ));
        }

        let mut vectors = self.reusable_vectors();
        let hashes: Vec<String> = chunks.iter().map(|c| text_sha256(&c.text)).collect();

        let mut seen = HashSet::new();
        let mut pending: Vec<(&str, &str)> = Vec::new();
        for (chunk, hash) in chunks.iter().zip(hashes.iter()) {
            if !vectors.contains_key(hash) && seen.insert(hash.as_str()) {
                pending.push((hash.as_str(), chunk.text.as_str()));
            }
        }

        debug!(
            chunks = chunks.len(),
            reused = chunks.len() - pending.len(),
            to_embed = pending.len(),
            "building index"
        );

        if !pending.is_empty() {
            let texts: Vec<&str> = pending.iter().map(|(_, t)| *t).collect();
            let fresh = self.embedder.embed_batch(&self.model, &texts).map_err(|e| {
                AppError::new(codes::INDEX_BUILD_FAILED, "Failed to compute embeddings")
                    .with_details(e.to_string())
                    .with_retryable(e.retryable)
            })?;
            if fresh.len() != texts.len() {
                return Err(AppError::new(
                    codes::INDEX_BUILD_FAILED,
                    "Embedder returned the wrong number of vectors",
                )
                .with_details(format!("expected={}; got={}", texts.len(), fresh.len())));
            }
            for ((hash, _), v) in pending.iter().zip(fresh) {
                vectors.insert((*hash).to_string(), v);
            }
        }

        let mut dims: Option<u32> = None;
        let mut entries = Vec::with_capacity(chunks.len());
        for (chunk, hash) in chunks.iter().zip(hashes) {
            let vector = vectors.get(&hash).cloned().unwrap_or_default();
            let this_dims = vector.len() as u32;
            if this_dims == 0 {
                return Err(AppError::new(codes::INDEX_BUILD_FAILED, "Embedding was empty")
                    .with_details(format!("chunk={}", chunk.key())));
            }
            match dims {
                Some(d) if d != this_dims => {
                    return Err(AppError::new(
                        codes::INDEX_BUILD_FAILED,
                        "Embedding dimension mismatch across chunks",
                    )
                    .with_details(format!("expected={}; got={}; chunk={}", d, this_dims, chunk.key())));
                }
                Some(_) => {}
                None => dims = Some(this_dims),
            }
            entries.push(IndexEntry {
                chunk: chunk.clone(),
                text_sha256: hash,
                vector,
            });
        }

        let index = VectorIndex::new(self.model.clone(), dims.unwrap_or(0), now_rfc3339_utc()?, entries)
            .map_err(|e| AppError::new(codes::INDEX_BUILD_FAILED, e.message).with_details(e.details.unwrap_or_default()))?;
        let status = index.status();
        self.install(Arc::new(index));
        info!(chunks = status.chunk_count, dims = ?status.dims, model = %self.model, "index built");
        Ok(status)
    }

    /// Write the installed index. Entries go first; the status file marks completion.
    pub fn persist(&self) -> Result<IndexStatus, AppError> {
        let index = self.require_installed()?;
        let file = IndexFileRef {
            model: &index.model,
            dims: index.dims,
            updated_at: &index.updated_at,
            entries: &index.entries,
        };
        write_json_atomic(&self.entries_path(), &file, codes::INDEX_PERSIST_FAILED, "index entries")?;
        let status = index.status();
        write_json_atomic(&self.status_path(), &status, codes::INDEX_PERSIST_FAILED, "index status")?;
        info!(path = %self.root.display(), chunks = status.chunk_count, "index persisted");
        Ok(status)
    }

    /// Read the persisted index and install it. On failure the installed index is untouched.
    pub fn load(&self) -> Result<IndexStatus, AppError> {
        let path = self.entries_path();
        if !path.exists() {
            return Err(AppError::new(
                codes::INDEX_LOAD_FAILED,
                "No index found; build the index first",
            )
            .with_details(format!("path={}", path.display())));
        }
        let file: IndexFile = read_json(&path, codes::INDEX_LOAD_FAILED, "index entries")?;
        if file.model != self.model {
            return Err(AppError::new(
                codes::INDEX_LOAD_FAILED,
                "Index was built with a different embedding model; rebuild the index",
            )
            .with_details(format!("index_model={}; configured={}", file.model, self.model)));
        }
        let index = VectorIndex::new(file.model, file.dims, file.updated_at, file.entries)?;
        let status = index.status();
        self.install(Arc::new(index));
        info!(chunks = status.chunk_count, "index loaded");
        Ok(status)
    }

    /// Load lazily on first use.
    pub fn ensure_loaded(&self) -> Result<(), AppError> {
        if self.is_loaded() {
            return Ok(());
        }
        self.load().map(|_| ())
    }

    /// The `k` nearest chunks to `query`, most relevant first.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, AppError> {
        let index = self.require_installed()?;
        if k == 0 {
            return Err(AppError::new(codes::RETRIEVAL_FAILED, "k must be positive"));
        }
        if index.is_empty() {
            return Ok(Vec::new());
        }

        let qv = self.embedder.embed(&self.model, query)?;
        if qv.len() as u32 != index.dims {
            return Err(AppError::new(
                codes::RETRIEVAL_FAILED,
                "Query embedding dims do not match index dims",
            )
            .with_details(format!("index_dims={}; query_dims={}", index.dims, qv.len())));
        }
        let qnorm = l2_norm(&qv);
        if qnorm == 0.0 {
            debug!("query embedding has zero norm; nothing is similar");
            return Ok(Vec::new());
        }
        Ok(index.nearest(&qv, qnorm, k))
    }
}
