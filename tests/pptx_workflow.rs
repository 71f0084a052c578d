//! Presentations merged and read back from disk.

use redoc::output::side_file;
use redoc::pptx::{self, PptxPresentation};

#[test]
fn test_merge_blank_decks_and_extract_text() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("封面.pptx");
    let second = dir.path().join("附录.pptx");
    PptxPresentation::blank().unwrap().save(&first).unwrap();
    PptxPresentation::blank().unwrap().save(&second).unwrap();

    let (mut merged, report) = pptx::merge_presentations(&[&first, &second]).unwrap();
    assert_eq!(report.separators, 1);
    assert_eq!(report.total_slides(), 1);
    let output = dir.path().join("合并.pptx");
    merged.save(&output).unwrap();

    let deck = PptxPresentation::open(&output).unwrap();
    assert_eq!(deck.slide_count(), 1);
    let slides = pptx::extract_text(&deck).unwrap();
    assert_eq!(slides[0].title.as_deref(), Some("文件: 附录.pptx"));
    assert_eq!(slides[0].shapes[1], "包含 0 张幻灯片 \n");

    let text_path = side_file(&output, "_文本提取.txt");
    std::fs::write(&text_path, pptx::render_text(&slides)).unwrap();
    let written = std::fs::read_to_string(&text_path).unwrap();
    assert!(written.starts_with("--- 幻灯片 1 ---\n标题: 文件: 附录.pptx\n"));
}

#[test]
fn test_summary_and_images_of_blank_deck() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("空白.pptx");
    PptxPresentation::blank().unwrap().save(&path).unwrap();

    let summary = redoc::summarize(&path).unwrap();
    assert_eq!(summary.details[0], ("幻灯片".to_string(), "0".to_string()));
    assert_eq!(summary.details[1], ("版式".to_string(), "3".to_string()));

    let images = redoc::extract_images(&path, dir.path().join("images")).unwrap();
    assert!(images.is_empty());
}
