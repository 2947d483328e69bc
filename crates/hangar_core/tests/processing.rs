use std::fs;

use hangar_core::chunking::Chunker;
use hangar_core::domain::{Chunk, ImageRecord, ProcessingStats};
use hangar_core::error::codes;
use hangar_core::images::ImageCatalog;
use hangar_core::ingest::{
    pages_from_text, process_manuals, read_chunks, PageSource, TextDirSource, CHUNKS_FILE,
    IMAGES_CATALOG_FILE, STATS_FILE,
};
use hangar_core::store::read_json;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn image(page: u32, name: &str) -> ImageRecord {
    ImageRecord {
        filename: name.to_string(),
        path: format!("data/processed/images/{name}"),
        ext: "png".to_string(),
        width: Some(640),
        height: Some(480),
        page,
        source: "a320_apu.pdf".to_string(),
    }
}

#[test]
fn form_feed_splits_pages_and_drops_trailing_blank_page() {
    let pages = pages_from_text("a320_apu.pdf", "one\x0ctwo\x0c", &[image(2, "x.png")]);
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].metadata.page, 1);
    assert_eq!(pages[1].text, "two");
    assert!(pages[0].images.is_empty());
    assert_eq!(pages[1].images.len(), 1);
}

#[test]
fn images_recorded_for_another_manual_are_not_attached() {
    let mut foreign = image(1, "other_p1_img0.png");
    foreign.source = "other.pdf".to_string();
    let pages = pages_from_text(
        "a320_apu.pdf",
        "See Figure 1 for the APU bleed valve.",
        &[foreign, image(1, "a320_apu_p1_img0.png")],
    );
    assert_eq!(pages[0].images.len(), 1);
    assert_eq!(pages[0].images[0].filename, "a320_apu_p1_img0.png");

    let mut foreign_only = image(1, "other_p1_img0.png");
    foreign_only.source = "other.pdf".to_string();
    let manual = hangar_core::ingest::Manual {
        source: "a320_apu.pdf".to_string(),
        pages: pages_from_text("a320_apu.pdf", "See Figure 1.", &[foreign_only]),
    };
    let out = process_manuals(&[manual], &Chunker::default());
    assert_eq!(out.stats.total_images, 0);
    assert_eq!(out.stats.chunks_with_diagrams, 0);
    assert!(out.images.is_empty());
}

#[test]
fn processes_text_directory_and_writes_outputs() {
    let raw = tempdir().expect("tempdir");
    let out = tempdir().expect("tempdir");

    let page1 = "## APU START PROCEDURE\nSTEP 1 Set battery ON.\nSTEP 2 Press APU MASTER.\nWARNING: Keep clear of the exhaust.";
    let page2 = "APU bleed valve location. See FIG 3 for the access panel.";
    fs::write(raw.path().join("a320_apu.txt"), format!("{page1}\x0c{page2}\x0c")).expect("write");
    fs::write(
        raw.path().join("a320_apu.images.json"),
        serde_json::to_string(&vec![image(2, "a320_apu_p2_img0.png")]).expect("json"),
    )
    .expect("write sidecar");

    let manuals = TextDirSource::new(raw.path()).manuals().expect("manuals");
    assert_eq!(manuals.len(), 1);
    assert_eq!(manuals[0].source, "a320_apu.pdf");

    let output = process_manuals(&manuals, &Chunker::default());
    output.write(out.path()).expect("write outputs");

    let chunks = read_chunks(&out.path().join(CHUNKS_FILE)).expect("chunks");
    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].metadata.is_procedure);
    assert!(chunks[0].metadata.has_warning);
    assert!(chunks[1].metadata.has_diagram);

    let stats: ProcessingStats =
        read_json(&out.path().join(STATS_FILE), "TEST", "stats").expect("stats");
    assert_eq!(
        stats,
        ProcessingStats {
            total_pdfs: 1,
            total_pages: 2,
            total_chunks: 2,
            total_images: 1,
            chunks_with_warnings: 1,
            chunks_with_procedures: 1,
            chunks_with_diagrams: 1,
        }
    );

    let catalog = ImageCatalog::load(&out.path().join(IMAGES_CATALOG_FILE)).expect("catalog");
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.images_for("a320_apu.pdf", 2)[0].filename, "a320_apu_p2_img0.png");
}

#[test]
fn missing_manual_directory_is_manual_not_found() {
    let err = TextDirSource::new("/no/manuals/here")
        .manuals()
        .expect_err("missing");
    assert_eq!(err.code, codes::MANUAL_NOT_FOUND);

    let empty = tempdir().expect("tempdir");
    let err = TextDirSource::new(empty.path()).manuals().expect_err("empty");
    assert_eq!(err.code, codes::MANUAL_NOT_FOUND);
}

#[test]
fn chunk_file_without_tags_still_loads() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join(CHUNKS_FILE);
    fs::write(
        &path,
        r#"[{"text":"The APU is the Auxiliary Power Unit.","metadata":{"source":"manual.pdf","page":12,"chunk_index":0}}]"#,
    )
    .expect("write");
    let chunks: Vec<Chunk> = read_chunks(&path).expect("read");
    assert_eq!(chunks[0].metadata.page, 12);
    assert!(!chunks[0].metadata.has_warning);
    assert_eq!(chunks[0].metadata.ata_chapter, None);
}

#[test]
fn missing_chunk_file_is_manual_not_found() {
    let dir = tempdir().expect("tempdir");
    let err = read_chunks(&dir.path().join(CHUNKS_FILE)).expect_err("missing");
    assert_eq!(err.code, codes::MANUAL_NOT_FOUND);
}
