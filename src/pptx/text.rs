//! Plain-text dump of every slide.

use super::shapes::{self, child_shapes, shape_tree};
use super::PptxPresentation;
use crate::error::Result;
use crate::xml::Element;
use serde::Serialize;
use tracing::{debug, info};

const SLIDE_SEPARATOR_WIDTH: usize = 50;

/// Text collected from one slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlideText {
    /// 1-based position in the deck.
    pub number: usize,
    /// Text of the title placeholder, when the slide has one.
    pub title: Option<String>,
    /// Non-blank text of each top-level shape, in z-order.
    pub shapes: Vec<String>,
}

impl SlideText {
    pub fn render(&self) -> String {
        let mut out = format!("--- 幻灯片 {} ---\n", self.number);
        if let Some(title) = &self.title {
            out.push_str(&format!("标题: {}\n\n", title));
        }
        for text in &self.shapes {
            out.push_str(text);
            out.push('\n');
        }
        out
    }
}

/// Text of one shape: a line per paragraph with each run followed by a space,
/// a ` | ` joined line per table row, a marker for charts, groups recursively.
fn shape_text(shape: &Element) -> String {
    match shape.name.as_str() {
        "p:sp" => {
            let mut text = String::new();
            for p in shapes::paragraphs(shape) {
                for run in p.children_named("a:r") {
                    if let Some(t) = run.child("a:t") {
                        text.push_str(&t.text());
                    }
                    text.push(' ');
                }
                text.push('\n');
            }
            text
        }
        "p:graphicFrame" => {
            if let Some(table) = shapes::table(shape) {
                let mut text = String::new();
                for row in table.children_named("a:tr") {
                    let cells: Vec<String> = row
                        .children_named("a:tc")
                        .map(shapes::text_body)
                        .filter(|t| !t.is_empty())
                        .map(|t| t.trim().to_string())
                        .collect();
                    text.push_str(&cells.join(" | "));
                    text.push('\n');
                }
                text
            } else if shapes::is_chart(shape) {
                "[图表数据]\n".to_string()
            } else {
                String::new()
            }
        }
        "p:grpSp" => child_shapes(shape).map(shape_text).collect(),
        _ => String::new(),
    }
}

/// Collect the text of every slide in display order.
pub fn extract_text(deck: &PptxPresentation) -> Result<Vec<SlideText>> {
    let mut slides = Vec::with_capacity(deck.slide_count());
    for index in 0..deck.slide_count() {
        let doc = deck.slide_document(index)?;
        let title = shapes::title_shape(&doc.root).map(shapes::text_body);
        let shapes = shape_tree(&doc.root)
            .into_iter()
            .flat_map(child_shapes)
            .map(shape_text)
            .filter(|t| !t.trim().is_empty())
            .collect();
        debug!(slide = index + 1, "extracted slide text");
        slides.push(SlideText {
            number: index + 1,
            title,
            shapes,
        });
    }
    info!(slides = slides.len(), "extracted text");
    Ok(slides)
}

/// The `_文本提取.txt` layout: each slide followed by a rule of `=`.
pub fn render_text(slides: &[SlideText]) -> String {
    let rule = "=".repeat(SLIDE_SEPARATOR_WIDTH);
    slides
        .iter()
        .map(|s| format!("{}\n{}\n\n", s.render(), rule))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pptx::test_support::*;

    const CONTENT_LAYOUT: &str = "ppt/slideLayouts/slideLayout2.xml";

    fn table_frame(rows: &[&[&str]]) -> String {
        let rows: String = rows
            .iter()
            .map(|cells| {
                let cells: String = cells
                    .iter()
                    .map(|c| format!("<a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>{}</a:t></a:r></a:p></a:txBody></a:tc>", c))
                    .collect();
                format!("<a:tr h=\"370840\">{}</a:tr>", cells)
            })
            .collect();
        format!(
            r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="9" name="Table"/><p:cNvGraphicFramePr/><p:nvPr/></p:nvGraphicFramePr><p:xfrm/><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table"><a:tbl><a:tblGrid/>{}</a:tbl></a:graphicData></a:graphic></p:graphicFrame>"#,
            rows
        )
    }

    const CHART_FRAME: &str = r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="7" name="Chart"/><p:cNvGraphicFramePr/><p:nvPr/></p:nvGraphicFramePr><p:xfrm/><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/chart"><c:chart xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart" r:id="rId5"/></a:graphicData></a:graphic></p:graphicFrame>"#;

    #[test]
    fn test_extract_text_layout() {
        let mut deck = PptxPresentation::blank().unwrap();
        let shapes = format!(
            "{}{}{}{}",
            text_shape(2, "type=\"title\"", &["季度汇报"]),
            text_shape(3, "idx=\"1\"", &["收入增长", "成本下降"]),
            table_frame(&[&["地区", "", "销售额"], &["华东", "  120 ", ""]]),
            CHART_FRAME,
        );
        add_slide(&mut deck, CONTENT_LAYOUT, &shapes);

        let slides = extract_text(&deck).unwrap();
        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].title.as_deref(), Some("季度汇报"));
        assert_eq!(
            slides[0].render(),
            "--- 幻灯片 1 ---\n标题: 季度汇报\n\n季度汇报 \n\n收入增长 \n成本下降 \n\n地区 | 销售额\n华东 | 120\n\n[图表数据]\n\n"
        );
    }

    #[test]
    fn test_groups_and_blank_shapes() {
        let mut deck = PptxPresentation::blank().unwrap();
        let group = format!(
            r#"<p:grpSp><p:nvGrpSpPr><p:cNvPr id="4" name="Group"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}{}</p:grpSp>"#,
            text_shape(5, "", &["组内一"]),
            text_shape(6, "", &["组内二"]),
        );
        let shapes = format!("{}{}", text_shape(2, "", &["   "]), group);
        add_slide(&mut deck, CONTENT_LAYOUT, &shapes);
        add_slide(&mut deck, CONTENT_LAYOUT, "");

        let slides = extract_text(&deck).unwrap();
        assert_eq!(slides[0].title, None);
        assert_eq!(slides[0].shapes, vec!["组内一 \n组内二 \n".to_string()]);
        assert!(slides[1].shapes.is_empty());

        let rendered = render_text(&slides);
        let rule = "=".repeat(50);
        assert_eq!(
            rendered,
            format!(
                "--- 幻灯片 1 ---\n组内一 \n组内二 \n\n\n{}\n\n--- 幻灯片 2 ---\n\n{}\n\n",
                rule, rule
            )
        );
    }
}
