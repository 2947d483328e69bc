//! Query orchestration: retrieve, assemble, generate, check.
//!
//! Every stage returns `Result<_, AppError>`; [`RagPipeline::query`] is the only
//! place that turns a fault (or a panic) into a [`QueryResult`].

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use hangar_core::config::HangarConfig;
use hangar_core::domain::ImageRecord;
use hangar_core::error::{codes, AppError};
use hangar_core::images::ImageCatalog;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::{assemble, source_refs, ImageAnalysis, ImageRef, SourceRef};
use crate::index::{IndexManager, SearchHit};
use crate::llm::{Llm, VisionModel};
use crate::prompts;
use crate::quality::{self, Confidence, QualityCheck, QualityReport, ISSUE_NO_SOURCES};
use crate::retrieve::Retriever;

pub const NO_MANUALS_ANSWER: &str =
    "⚠️ No maintenance manuals are available. Process manuals and build the index before asking questions.";
pub const NO_RELEVANT_ANSWER: &str = "⚠️ I cannot find relevant information in the loaded manuals.";

pub const DIAGRAM_KEYWORDS: &[&str] = &[
    "diagram",
    "figure",
    "illustration",
    "picture",
    "image",
    "drawing",
    "schematic",
    "show me",
    "what does it look like",
    "visual",
    "chart",
    "graph",
    "layout",
    "location",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStage {
    IndexUnavailable,
    IndexReady,
    Retrieving,
    Assembling,
    Generating,
    Checking,
    Done,
    Errored,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub images: Vec<ImageRef>,
    pub confidence: Confidence,
    pub quality_check: QualityCheck,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_analyses: Vec<ImageAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResult {
    fn no_sources(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            sources: Vec::new(),
            images: Vec::new(),
            confidence: Confidence::None,
            quality_check: QualityCheck::with_issues(vec![ISSUE_NO_SOURCES.to_string()]),
            image_analyses: Vec::new(),
            error: None,
        }
    }

    pub fn no_manuals() -> Self {
        Self::no_sources(NO_MANUALS_ANSWER)
    }

    pub fn no_relevant_information() -> Self {
        Self::no_sources(NO_RELEVANT_ANSWER)
    }

    pub fn from_error(err: &AppError) -> Self {
        Self {
            answer: format!(
                "⚠️ Error processing query: {}. Please try rephrasing your question or contact support.",
                err.message
            ),
            sources: Vec::new(),
            images: Vec::new(),
            confidence: Confidence::Error,
            quality_check: QualityCheck::with_issues(vec![err.message.clone()]),
            image_analyses: Vec::new(),
            error: Some(err.to_string()),
        }
    }
}

/// Knobs the orchestrator needs from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub llm_model: String,
    pub vision_model: Option<String>,
    pub retriever: Retriever,
    pub min_answer_chars: usize,
    pub preview_chars: usize,
    pub max_vision_images: usize,
    pub include_images: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&HangarConfig::default())
    }
}

impl From<&HangarConfig> for PipelineSettings {
    fn from(cfg: &HangarConfig) -> Self {
        Self {
            llm_model: cfg.llm_model.clone(),
            vision_model: cfg.vision_model.clone(),
            retriever: Retriever {
                top_k: cfg.top_k,
                min_relevance: cfg.min_relevance,
            },
            min_answer_chars: cfg.min_answer_chars,
            preview_chars: cfg.preview_chars,
            max_vision_images: cfg.max_vision_images,
            include_images: true,
        }
    }
}

pub fn detect_diagram_request(question: &str) -> bool {
    let q = question.to_lowercase();
    DIAGRAM_KEYWORDS.iter().any(|k| q.contains(k))
}

/// Unified confidence policy layered on the checker's high/low verdict.
pub fn resolve_confidence(report: &QualityReport, wants_diagrams: bool, images_attached: bool) -> Confidence {
    if report.confidence == Confidence::Low {
        return Confidence::Low;
    }
    if wants_diagrams && !images_attached {
        return Confidence::Medium;
    }
    Confidence::High
}

struct StageTracker {
    stage: QueryStage,
}

impl StageTracker {
    fn enter(&mut self, next: QueryStage) {
        debug!(from = ?self.stage, to = ?next, "query stage");
        self.stage = next;
    }
}

/// The query orchestrator. Borrows long-lived services; holds no per-query state.
pub struct RagPipeline<'a> {
    index: &'a IndexManager,
    llm: &'a dyn Llm,
    vision: Option<&'a dyn VisionModel>,
    catalog: &'a ImageCatalog,
    settings: PipelineSettings,
}

impl<'a> RagPipeline<'a> {
    pub fn new(
        index: &'a IndexManager,
        llm: &'a dyn Llm,
        catalog: &'a ImageCatalog,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            index,
            llm,
            vision: None,
            catalog,
            settings,
        }
    }

    pub fn with_vision(mut self, vision: &'a dyn VisionModel) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Answer `question`. Never returns an error and never panics outward.
    pub fn query(&self, question: &str) -> QueryResult {
        let mut tracker = StageTracker {
            stage: QueryStage::IndexUnavailable,
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(question, &mut tracker)));

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) if e.is_index_unavailable() => {
                warn!(stage = ?tracker.stage, error = %e, "index unavailable");
                QueryResult::no_manuals()
            }
            Ok(Err(e)) => {
                warn!(stage = ?tracker.stage, error = %e, "query failed");
                tracker.enter(QueryStage::Errored);
                QueryResult::from_error(&e)
            }
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(stage = ?tracker.stage, panic = %msg, "query panicked");
                tracker.enter(QueryStage::Errored);
                QueryResult::from_error(
                    &AppError::new(codes::PIPELINE_PANIC, "Internal error while answering")
                        .with_details(msg),
                )
            }
        }
    }

    fn run(&self, question: &str, tracker: &mut StageTracker) -> Result<QueryResult, AppError> {
        self.index.ensure_loaded()?;
        tracker.enter(QueryStage::IndexReady);

        tracker.enter(QueryStage::Retrieving);
        let hits = self.settings.retriever.retrieve(self.index, question)?;
        if hits.is_empty() {
            tracker.enter(QueryStage::Done);
            info!("no relevant chunks; skipping generation");
            return Ok(QueryResult::no_relevant_information());
        }

        tracker.enter(QueryStage::Assembling);
        let wants_diagrams = detect_diagram_request(question);
        let images = self.collect_images(&hits, wants_diagrams);
        let analyses = self.analyze_images(&images, question);
        let context = assemble(&hits, &analyses);
        let prompt = prompts::answer_prompt(&context, question, !analyses.is_empty());

        tracker.enter(QueryStage::Generating);
        let answer = self.llm.generate(&self.settings.llm_model, &prompt)?;

        tracker.enter(QueryStage::Checking);
        let sources = source_refs(&hits, self.settings.preview_chars);
        let report = quality::check(&answer, &sources, self.settings.min_answer_chars);
        let confidence = resolve_confidence(&report, wants_diagrams, !images.is_empty());

        tracker.enter(QueryStage::Done);
        Ok(QueryResult {
            answer,
            sources,
            images: images.iter().map(ImageRef::from).collect(),
            confidence,
            quality_check: report.check,
            image_analyses: analyses,
            error: None,
        })
    }

    fn collect_images(&self, hits: &[SearchHit], wants_diagrams: bool) -> Vec<ImageRecord> {
        if !self.settings.include_images {
            return Vec::new();
        }
        let any_diagram = hits.iter().any(|h| h.chunk.metadata.has_diagram);
        if !(wants_diagrams || any_diagram) {
            return Vec::new();
        }
        self.catalog.images_for_chunks(hits.iter().map(|h| &h.chunk))
    }

    /// Describe up to `max_vision_images` images that exist on disk. Failures degrade to a note.
    fn analyze_images(&self, images: &[ImageRecord], question: &str) -> Vec<ImageAnalysis> {
        let (Some(vision), Some(model)) = (self.vision, self.settings.vision_model.as_deref()) else {
            return Vec::new();
        };
        let prompt = prompts::vision_prompt(question);

        images
            .iter()
            .filter(|img| Path::new(&img.path).is_file())
            .take(self.settings.max_vision_images)
            .map(|img| {
                let analysis = fs::read(&img.path)
                    .map_err(|e| {
                        AppError::new(codes::VISION_FAILED, "Failed to read image")
                            .with_details(format!("path={}; err={}", img.path, e))
                    })
                    .and_then(|bytes| vision.analyze_image(model, &bytes, &prompt))
                    .unwrap_or_else(|e| {
                        warn!(image = %img.filename, error = %e, "diagram analysis failed");
                        format!("Could not analyze image: {}", e.message)
                    });
                ImageAnalysis {
                    filename: img.filename.clone(),
                    page: img.page,
                    analysis,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(confidence: Confidence) -> QualityReport {
        QualityReport {
            has_citations: true,
            is_uncertain: false,
            check: QualityCheck::default(),
            confidence,
        }
    }

    #[test]
    fn diagram_keywords_are_case_insensitive() {
        assert!(detect_diagram_request("Show me the APU bleed valve"));
        assert!(detect_diagram_request("Where is the hydraulic reservoir LOCATION?"));
        assert!(!detect_diagram_request("How do I start the APU?"));
    }

    #[test]
    fn confidence_policy() {
        assert_eq!(resolve_confidence(&report(Confidence::Low), true, false), Confidence::Low);
        assert_eq!(resolve_confidence(&report(Confidence::High), true, false), Confidence::Medium);
        assert_eq!(resolve_confidence(&report(Confidence::High), true, true), Confidence::High);
        assert_eq!(resolve_confidence(&report(Confidence::High), false, false), Confidence::High);
    }

    #[test]
    fn error_result_carries_message_and_no_sources() {
        let r = QueryResult::from_error(&AppError::new(codes::GENERATION_FAILED, "timed out"));
        assert_eq!(r.confidence, Confidence::Error);
        assert!(r.sources.is_empty());
        assert!(r.answer.contains("timed out"));
        assert_eq!(r.error.as_deref(), Some("[GENERATION_FAILED] timed out"));
    }
}
