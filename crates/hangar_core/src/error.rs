use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error codes shared by the offline processing path and the query pipeline.
pub mod codes {
    pub const INDEX_BUILD_FAILED: &str = "INDEX_BUILD_FAILED";
    pub const INDEX_PERSIST_FAILED: &str = "INDEX_PERSIST_FAILED";
    pub const INDEX_LOAD_FAILED: &str = "INDEX_LOAD_FAILED";
    pub const INDEX_NOT_LOADED: &str = "INDEX_NOT_LOADED";
    pub const MANUAL_NOT_FOUND: &str = "MANUAL_NOT_FOUND";
    pub const EMBEDDINGS_FAILED: &str = "EMBEDDINGS_FAILED";
    pub const GENERATION_FAILED: &str = "GENERATION_FAILED";
    pub const VISION_FAILED: &str = "VISION_FAILED";
    pub const RETRIEVAL_FAILED: &str = "RETRIEVAL_FAILED";
    pub const INGEST_FAILED: &str = "INGEST_FAILED";
    pub const CATALOG_FAILED: &str = "CATALOG_FAILED";
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
    pub const OLLAMA_REMOTE_NOT_ALLOWED: &str = "OLLAMA_REMOTE_NOT_ALLOWED";
    pub const OLLAMA_UNREACHABLE: &str = "OLLAMA_UNREACHABLE";
    pub const OLLAMA_UNHEALTHY: &str = "OLLAMA_UNHEALTHY";
    pub const PIPELINE_PANIC: &str = "PIPELINE_PANIC";
}

/// Single structured error shape used across the processing, index and query layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// True for index lifecycle faults that degrade to the "no manuals available" answer.
    pub fn is_index_unavailable(&self) -> bool {
        matches!(
            self.code.as_str(),
            codes::INDEX_BUILD_FAILED
                | codes::INDEX_LOAD_FAILED
                | codes::INDEX_NOT_LOADED
                | codes::MANUAL_NOT_FOUND
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(d) => write!(f, "[{}] {} ({})", self.code, self.message, d),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

impl std::error::Error for AppError {}
