//! Title/body outline styling: numbered Chinese headings (`一、`, `二．`…) get a
//! title style, the text under them a body style.

use super::cleanup::collapse_empty_paragraphs;
use super::paragraph::{self, set_paragraph_style, text_of};
use super::DocxDocument;
use crate::error::Result;
use crate::model::{Alignment, FontSpec, ParagraphFormat, StyleDefinition};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, info};

static ASTERISK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*").expect("invalid regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineStyleConfig {
    pub title_style: String,
    pub title: StyleDefinition,
    pub body_style: String,
    pub body: StyleDefinition,
    /// Matched against the trimmed paragraph text.
    pub title_pattern: String,
    pub remove_asterisks: bool,
    pub collapse_empty: bool,
}

impl Default for OutlineStyleConfig {
    fn default() -> Self {
        Self {
            title_style: "社团01".to_string(),
            title: StyleDefinition {
                font: FontSpec {
                    name: Some("黑体".to_string()),
                    east_asia: Some("黑体".to_string()),
                    size: Some(12.0),
                    ..Default::default()
                },
                paragraph_format: ParagraphFormat {
                    space_before: Some(12.0),
                    space_after: Some(12.0),
                    line_spacing: Some(1.0),
                    outline_level: Some(1),
                    ..Default::default()
                },
                ..Default::default()
            },
            body_style: "社团02".to_string(),
            body: StyleDefinition {
                font: FontSpec {
                    name: Some("宋体".to_string()),
                    east_asia: Some("宋体".to_string()),
                    size: Some(10.5),
                    ..Default::default()
                },
                paragraph_format: ParagraphFormat {
                    alignment: Some(Alignment::Justify),
                    first_line_indent: Some(21.0),
                    space_before: Some(6.0),
                    space_after: Some(6.0),
                    line_spacing: Some(1.0),
                    ..Default::default()
                },
                ..Default::default()
            },
            title_pattern: "^[一二三四五六七八九十]+[、.．:：]".to_string(),
            remove_asterisks: true,
            collapse_empty: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutlineReport {
    pub asterisks_removed: usize,
    pub empty_removed: usize,
    pub titles: usize,
    pub body_paragraphs: usize,
}

/// Clean the body, create both styles and assign them to title and body paragraphs.
pub fn apply_outline_styles(
    doc: &mut DocxDocument,
    config: &OutlineStyleConfig,
) -> Result<OutlineReport> {
    let title_re = Regex::new(&config.title_pattern)?;
    let mut report = OutlineReport::default();

    let styles = doc.styles_mut()?;
    let (title_id, _) = styles.upsert_paragraph_style(&config.title_style, &config.title);
    let (body_id, _) = styles.upsert_paragraph_style(&config.body_style, &config.body);

    let body = doc.body_mut()?;
    if config.remove_asterisks {
        for p in body.elements_mut().filter(|e| e.is("w:p")) {
            report.asterisks_removed += paragraph::remove_matches(p, &ASTERISK);
        }
    }
    if config.collapse_empty {
        report.empty_removed = collapse_empty_paragraphs(body);
    }

    let mut seen_title = false;
    for p in body.elements_mut().filter(|e| e.is("w:p")) {
        let text = text_of(p);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if title_re.is_match(trimmed) {
            set_paragraph_style(p, &title_id);
            seen_title = true;
            report.titles += 1;
            debug!(title = %trimmed, "title paragraph");
        } else if seen_title {
            set_paragraph_style(p, &body_id);
            report.body_paragraphs += 1;
        }
    }

    info!(
        asterisks = report.asterisks_removed,
        empty = report.empty_removed,
        titles = report.titles,
        body = report.body_paragraphs,
        "applied outline styles"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::paragraph::{new_paragraph, paragraph_style, push_block};
    use crate::error::Error;

    fn outline_doc() -> DocxDocument {
        let mut doc = DocxDocument::blank().unwrap();
        let body = doc.body_mut().unwrap();
        for text in ["前言不变", "一、**总则**", "", "", "第一段正文", "二．范围", "第二段正文"] {
            push_block(body, new_paragraph(text));
        }
        doc
    }

    #[test]
    fn test_apply_outline_styles() {
        let mut doc = outline_doc();
        let report = apply_outline_styles(&mut doc, &OutlineStyleConfig::default()).unwrap();
        assert_eq!(report.asterisks_removed, 4);
        assert_eq!(report.empty_removed, 1);
        assert_eq!(report.titles, 2);
        assert_eq!(report.body_paragraphs, 2);

        let title_id = doc.styles().unwrap().style_id_by_name("社团01").unwrap();
        let body_id = doc.styles().unwrap().style_id_by_name("社团02").unwrap();
        let paragraphs = doc.paragraphs().unwrap();
        let assigned: Vec<Option<&str>> = paragraphs.iter().map(|p| paragraph_style(p)).collect();
        assert_eq!(
            assigned,
            vec![
                None,
                Some(title_id.as_str()),
                None,
                Some(body_id.as_str()),
                Some(title_id.as_str()),
                Some(body_id.as_str()),
            ]
        );
        assert_eq!(text_of(paragraphs[1]), "一、总则");
    }

    #[test]
    fn test_style_definitions() {
        let mut doc = outline_doc();
        apply_outline_styles(&mut doc, &OutlineStyleConfig::default()).unwrap();
        let set = doc.styles().unwrap().paragraph_styles();
        let title = &set["社团01"];
        assert_eq!(title.font.east_asia.as_deref(), Some("黑体"));
        assert_eq!(title.paragraph_format.outline_level, Some(1));
        let body = &set["社团02"];
        assert_eq!(body.font.size, Some(10.5));
        assert_eq!(body.paragraph_format.alignment, Some(Alignment::Justify));
        assert_eq!(body.paragraph_format.first_line_indent, Some(21.0));
    }

    #[test]
    fn test_bad_pattern() {
        let mut doc = outline_doc();
        let config = OutlineStyleConfig {
            title_pattern: "([".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            apply_outline_styles(&mut doc, &config),
            Err(Error::Config(_))
        ));
    }
}
