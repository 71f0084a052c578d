//! Collapsing runs of empty paragraphs.

use super::paragraph;
use super::DocxDocument;
use crate::error::Result;
use crate::xml::{Element, Node};
use tracing::info;

/// Keep one paragraph out of each run of consecutive empty body paragraphs.
///
/// Paragraphs holding drawings, fields or section breaks are never empty.
/// Returns how many paragraphs were removed.
pub fn remove_empty_paragraphs(doc: &mut DocxDocument) -> Result<usize> {
    let removed = collapse_empty_paragraphs(doc.body_mut()?);
    info!(removed, "removed consecutive empty paragraphs");
    Ok(removed)
}

pub(crate) fn is_empty_paragraph(p: &Element) -> bool {
    paragraph::is_blank(p) && !paragraph::has_content_objects(p)
}

pub(crate) fn collapse_empty_paragraphs(container: &mut Element) -> usize {
    let mut previous_empty = false;
    let mut removed = 0;
    container.children.retain(|node| match node {
        Node::Element(e) if e.is("w:p") => {
            let empty = is_empty_paragraph(e);
            if empty && previous_empty {
                removed += 1;
                return false;
            }
            previous_empty = empty;
            true
        }
        Node::Element(_) => {
            previous_empty = false;
            true
        }
        _ => true,
    });
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::paragraph::{new_paragraph, paragraphs, push_block, text_of};

    fn body_with(texts: &[&str]) -> DocxDocument {
        let mut doc = DocxDocument::blank().unwrap();
        let body = doc.body_mut().unwrap();
        for text in texts {
            push_block(body, new_paragraph(text));
        }
        doc
    }

    #[test]
    fn test_collapses_runs_of_empty_paragraphs() {
        let mut doc = body_with(&["一", "", " ", "", "二", "", "三", "", ""]);
        let removed = remove_empty_paragraphs(&mut doc).unwrap();
        assert_eq!(removed, 3);
        let texts: Vec<String> = doc.paragraphs().unwrap().into_iter().map(text_of).collect();
        assert_eq!(texts, vec!["一", "", "二", "", "三", ""]);
    }

    #[test]
    fn test_tables_break_runs_and_drawings_survive() {
        let mut body = Element::parse(
            r#"<w:body><w:p/><w:tbl/><w:p/><w:p><w:r><w:drawing/></w:r></w:p><w:p/><w:p/></w:body>"#,
        )
        .unwrap();
        assert_eq!(collapse_empty_paragraphs(&mut body), 1);
        assert_eq!(paragraphs(&body).len(), 4);
    }
}
