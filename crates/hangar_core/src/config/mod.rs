//! Runtime configuration.
//!
//! Layers, lowest priority first: built-in defaults, `hangar.toml` (or an explicit
//! file), then `HANGAR_*` environment variables (e.g. `HANGAR_TOP_K=8`).

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::chunking::{Chunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::error::{codes, AppError};

pub const DEFAULT_CONFIG_FILE: &str = "hangar.toml";
pub const ENV_PREFIX: &str = "HANGAR_";

/// Cosine floor for retrieval hits. Sentence embedders score unrelated text well
/// above zero (typically 0.2 to 0.45 for nomic-embed-text), so the floor sits above that band.
pub const DEFAULT_MIN_RELEVANCE: f32 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HangarConfig {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub index_dir: PathBuf,

    pub ollama_url: String,
    pub embedding_model: String,
    pub llm_model: String,
    pub vision_model: Option<String>,

    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    /// Retrieval hits scoring at or below this cosine similarity are dropped.
    pub min_relevance: f32,
    pub min_answer_chars: usize,
    pub preview_chars: usize,
    pub max_vision_images: usize,
    pub generate_timeout_secs: u64,
    pub embed_timeout_secs: u64,
}

impl Default for HangarConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
            index_dir: PathBuf::from("vectorstore"),
            ollama_url: "http://127.0.0.1:11434".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            llm_model: "llama3.2".to_string(),
            vision_model: Some("llava".to_string()),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: 5,
            min_relevance: DEFAULT_MIN_RELEVANCE,
            min_answer_chars: 50,
            preview_chars: 300,
            max_vision_images: 3,
            generate_timeout_secs: 120,
            embed_timeout_secs: 30,
        }
    }
}

impl HangarConfig {
    /// Load from `hangar.toml` in the working directory plus the environment.
    pub fn load() -> Result<Self, AppError> {
        Self::from_figment(Self::figment(Path::new(DEFAULT_CONFIG_FILE)))
    }

    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Err(AppError::new(codes::CONFIG_INVALID, "Config file not found")
                .with_details(format!("path={}", path.display())));
        }
        Self::from_figment(Self::figment(path))
    }

    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(HangarConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, AppError> {
        let cfg: HangarConfig = figment.extract().map_err(|e| {
            AppError::new(codes::CONFIG_INVALID, "Failed to read configuration")
                .with_details(e.to_string())
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.chunk_size == 0 {
            return Err(AppError::new(codes::CONFIG_INVALID, "chunk_size must be positive"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(
                AppError::new(codes::CONFIG_INVALID, "chunk_overlap must be smaller than chunk_size")
                    .with_details(format!(
                        "chunk_size={}; chunk_overlap={}",
                        self.chunk_size, self.chunk_overlap
                    )),
            );
        }
        if self.top_k == 0 {
            return Err(AppError::new(codes::CONFIG_INVALID, "top_k must be positive"));
        }
        if !(-1.0..1.0).contains(&self.min_relevance) {
            return Err(
                AppError::new(codes::CONFIG_INVALID, "min_relevance must be in [-1.0, 1.0)")
                    .with_details(format!("min_relevance={}", self.min_relevance)),
            );
        }
        Ok(())
    }

    pub fn chunker(&self) -> Chunker {
        Chunker::new(self.chunk_size, self.chunk_overlap)
    }

    pub fn chunks_path(&self) -> PathBuf {
        self.processed_dir.join(crate::ingest::CHUNKS_FILE)
    }

    pub fn images_catalog_path(&self) -> PathBuf {
        self.processed_dir.join(crate::ingest::IMAGES_CATALOG_FILE)
    }

    pub fn stats_path(&self) -> PathBuf {
        self.processed_dir.join(crate::ingest::STATS_FILE)
    }
}
