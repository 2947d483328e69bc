//! Heuristic answer checks. These flag likely problems; they do not verify facts.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::context::SourceRef;

pub const DEFAULT_MIN_ANSWER_CHARS: usize = 50;

pub const ISSUE_MISSING_CITATIONS: &str = "Missing citations";
pub const ISSUE_TOO_BRIEF: &str = "Answer too brief";
pub const ISSUE_NO_SOURCES: &str = "No relevant sources found";

pub const HEDGING_PHRASES: &[&str] = &[
    "cannot find",
    "not available",
    "unclear",
    "insufficient information",
    "not sure",
    "unable to determine",
    "no information",
];

// "Source:", "Source 2:", "Page:", or a bracketed "[manual.pdf, Page 12]".
// A bare "page 3" in prose is not a citation.
static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bsource\s*\d*\s*:|\bpage\s*:|\[[^\]]*\bpage\s+\d+[^\]]*\]")
        .expect("citation regex")
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    None,
    Low,
    Medium,
    High,
    Error,
}

/// Caller-visible part of the check.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QualityCheck {
    pub has_issues: bool,
    pub issues: Vec<String>,
}

impl QualityCheck {
    pub fn with_issues(issues: Vec<String>) -> Self {
        Self {
            has_issues: !issues.is_empty(),
            issues,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityReport {
    pub has_citations: bool,
    pub is_uncertain: bool,
    pub check: QualityCheck,
    /// `High` or `Low` only.
    pub confidence: Confidence,
}

pub fn has_citations(answer: &str) -> bool {
    CITATION_RE.is_match(answer)
}

pub fn is_uncertain(answer: &str) -> bool {
    let lower = answer.to_lowercase();
    HEDGING_PHRASES.iter().any(|p| lower.contains(p))
}

pub fn check(answer: &str, sources: &[SourceRef], min_answer_chars: usize) -> QualityReport {
    let has_citations = has_citations(answer);
    let mut issues = Vec::new();
    if !has_citations {
        issues.push(ISSUE_MISSING_CITATIONS.to_string());
    }
    if answer.trim().chars().count() < min_answer_chars {
        issues.push(ISSUE_TOO_BRIEF.to_string());
    }
    if sources.is_empty() {
        issues.push(ISSUE_NO_SOURCES.to_string());
    }

    let is_uncertain = is_uncertain(answer);
    let check = QualityCheck::with_issues(issues);
    let confidence = if check.has_issues || is_uncertain {
        Confidence::Low
    } else {
        Confidence::High
    };

    QualityReport {
        has_citations,
        is_uncertain,
        check,
        confidence,
    }
}
