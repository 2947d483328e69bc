//! Aviation tags derived from a span of manual text.
//!
//! The ATA chapter and aircraft type patterns are loose heuristics: the ATA
//! pattern matches any leading pair of digits and the Boeing pattern matches any
//! three-digit number. They are kept as-is so existing chunk files stay comparable.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{ChunkMetadata, PageMetadata};

static PROCEDURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)STEP \d+|PROCEDURE").expect("procedure regex"));

static DIAGRAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)FIG(?:URE)?[\s.]?\d+|DIAGRAM|ILLUSTRATION").expect("diagram regex")
});

static FIGURE_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)FIG(?:URE)?[\s.]?(\d+)").expect("figure ref regex"));

static ATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:ATA[\s-]?)?(\d{2})-?(\d{2})?-?(\d{2})?").expect("ata regex")
});

// Priority order matters: first pattern with a match wins.
static AIRCRAFT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"A\d{3}(?:-\d{3})?",
        r"(Boeing\s+)?(\d{3}(?:-\d{1,3})?)",
        r"B\d{3}",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("aircraft regex"))
    .collect()
});

/// Tags extracted from one text span.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextTags {
    pub source: String,
    pub ata_chapter: Option<String>,
    pub aircraft_type: Option<String>,
    pub has_warning: bool,
    pub has_caution: bool,
    pub is_procedure: bool,
    pub has_diagram: bool,
}

pub fn extract(text: &str, source_filename: &str) -> TextTags {
    let upper = text.to_uppercase();
    TextTags {
        source: source_filename.to_string(),
        ata_chapter: ATA_RE.find(text).map(|m| m.as_str().to_string()),
        aircraft_type: AIRCRAFT_RES
            .iter()
            .find_map(|re| re.find(text))
            .map(|m| m.as_str().to_string()),
        has_warning: upper.contains("WARNING"),
        has_caution: upper.contains("CAUTION"),
        is_procedure: PROCEDURE_RE.is_match(text),
        has_diagram: DIAGRAM_RE.is_match(text),
    }
}

/// True when the text cites a numbered figure ("FIG 3", "Figure.12").
pub fn has_figure_reference(text: &str) -> bool {
    FIGURE_REF_RE.is_match(text)
}

/// Merge page-level tags with tags re-extracted from the chunk itself.
///
/// Chunk-level values win wherever they are present; `source` always comes from the page.
pub fn merge_chunk_metadata(
    page: &PageMetadata,
    page_tags: &TextTags,
    chunk_tags: &TextTags,
    chunk_index: u32,
) -> ChunkMetadata {
    ChunkMetadata {
        source: page.source.clone(),
        page: page.page,
        chunk_index,
        ata_chapter: chunk_tags
            .ata_chapter
            .clone()
            .or_else(|| page_tags.ata_chapter.clone()),
        aircraft_type: chunk_tags
            .aircraft_type
            .clone()
            .or_else(|| page_tags.aircraft_type.clone()),
        has_warning: chunk_tags.has_warning,
        has_caution: chunk_tags.has_caution,
        is_procedure: chunk_tags.is_procedure,
        has_diagram: chunk_tags.has_diagram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_case_insensitive() {
        let t = extract("warning: hot surface. Caution advised.", "m.pdf");
        assert!(t.has_warning);
        assert!(t.has_caution);
        assert!(!t.is_procedure);
        assert!(!t.has_diagram);
        assert_eq!(t.source, "m.pdf");
    }

    #[test]
    fn procedure_requires_step_number_or_keyword() {
        assert!(extract("Step 4 open the valve", "m").is_procedure);
        assert!(extract("APU start procedure", "m").is_procedure);
        assert!(!extract("the next step is simple", "m").is_procedure);
    }

    #[test]
    fn diagram_patterns() {
        assert!(extract("see FIG 3", "m").has_diagram);
        assert!(extract("refer to figure.12", "m").has_diagram);
        assert!(extract("wiring Diagram", "m").has_diagram);
        assert!(extract("ILLUSTRATION below", "m").has_diagram);
        assert!(!extract("figure it out", "m").has_diagram);
    }

    #[test]
    fn ata_chapter_takes_first_match() {
        assert_eq!(
            extract("Refer to ATA 49-10-00 for the APU", "m").ata_chapter.as_deref(),
            Some("ATA 49-10-00")
        );
        assert_eq!(extract("chapter 32-41", "m").ata_chapter.as_deref(), Some("32-41"));
        assert_eq!(extract("no digits here", "m").ata_chapter, None);
    }

    #[test]
    fn aircraft_type_priority() {
        assert_eq!(
            extract("A320-214 landing gear", "m").aircraft_type.as_deref(),
            Some("A320-214")
        );
        assert_eq!(
            extract("Boeing 737-800 APU", "m").aircraft_type.as_deref(),
            Some("Boeing 737-800")
        );
        assert_eq!(extract("plain words", "m").aircraft_type, None);
    }

    #[test]
    fn chunk_values_override_page_values() {
        let page = PageMetadata {
            source: "m.pdf".to_string(),
            page: 7,
        };
        let page_tags = extract("ATA 21 WARNING Boeing 737", "other.pdf");
        let chunk_tags = extract("plain text only", "ignored.pdf");
        let merged = merge_chunk_metadata(&page, &page_tags, &chunk_tags, 2);
        assert_eq!(merged.source, "m.pdf");
        assert_eq!(merged.page, 7);
        assert_eq!(merged.chunk_index, 2);
        assert_eq!(merged.ata_chapter.as_deref(), Some("ATA 21"));
        assert_eq!(merged.aircraft_type.as_deref(), Some("Boeing 737"));
        assert!(!merged.has_warning);
    }
}
