//! Concatenating several Word documents into a new one.

use super::paragraph::{new_paragraph, new_run, push_block, set_paragraph_style, text_of};
use super::props::{apply_font, read_font};
use super::DocxDocument;
use crate::error::{ensure_exist, Result};
use crate::model::FontSpec;
use crate::output::display_name;
use crate::xml::Element;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TABLE_STYLE: &str = "TableGrid";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedFile {
    pub path: PathBuf,
    pub paragraphs: usize,
    pub tables: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub files: Vec<MergedFile>,
}

fn page_break() -> Element {
    Element::new("w:p").with_child(
        Element::new("w:r").with_child(Element::new("w:br").with_attr("w:type", "page")),
    )
}

/// Runs of a paragraph, including those inside hyperlinks and insertions.
fn content_runs(p: &Element) -> Vec<&Element> {
    let mut runs = Vec::new();
    for child in p.elements() {
        match child.name.as_str() {
            "w:r" => runs.push(child),
            "w:hyperlink" | "w:ins" | "w:smartTag" | "w:fldSimple" => {
                runs.extend(child.children_named("w:r"))
            }
            _ => {}
        }
    }
    runs
}

/// Run formatting carried over: bold, italic, underline, size and colour.
fn copied_run_props(run: &Element) -> Option<Element> {
    let font = run.child("w:rPr").map(read_font)?;
    let kept = FontSpec {
        bold: font.bold,
        italic: font.italic,
        underline: font.underline,
        size: font.size,
        color: font.color,
        ..Default::default()
    };
    let mut rpr = Element::new("w:rPr");
    apply_font(&mut rpr, &kept);
    Some(rpr)
}

fn copy_paragraph(source: &Element) -> Element {
    let mut p = Element::new("w:p");
    for run in content_runs(source) {
        let text = text_of(run);
        if !text.is_empty() {
            p.push(new_run(&text, copied_run_props(run)));
        }
    }
    p
}

/// First non-empty paragraph text of a table cell.
fn cell_text(cell: &Element) -> String {
    cell.children_named("w:p")
        .map(text_of)
        .find(|t| !t.is_empty())
        .unwrap_or_default()
}

/// Rebuild a table as a plain text grid with the `Table Grid` style.
fn copy_table(source: &Element) -> Element {
    let rows: Vec<Vec<String>> = source
        .children_named("w:tr")
        .map(|tr| tr.children_named("w:tc").map(cell_text).collect())
        .collect();
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);

    let mut grid = Element::new("w:tblGrid");
    for _ in 0..columns {
        grid.push(Element::new("w:gridCol"));
    }
    let mut table = Element::new("w:tbl")
        .with_child(
            Element::new("w:tblPr")
                .with_child(Element::new("w:tblStyle").with_attr("w:val", TABLE_STYLE))
                .with_child(
                    Element::new("w:tblW")
                        .with_attr("w:w", "0")
                        .with_attr("w:type", "auto"),
                )
                .with_child(Element::new("w:tblLook").with_attr("w:val", "04A0")),
        )
        .with_child(grid);
    for row in rows {
        let mut tr = Element::new("w:tr");
        for c in 0..columns {
            let text = row.get(c).map(String::as_str).unwrap_or_default();
            tr.push(Element::new("w:tc").with_child(new_paragraph(text)));
        }
        table.push(tr);
    }
    table
}

/// Merge `paths` into a new document.
///
/// Each file starts on a new page with a `文件: <name>` heading; paragraphs
/// keep basic run formatting and tables become text grids.
pub fn merge_documents<P: AsRef<Path>>(paths: &[P]) -> Result<(DocxDocument, MergeReport)> {
    ensure_exist(paths)?;

    let mut merged = DocxDocument::blank()?;
    let heading = merged.styles_mut()?.ensure_heading_style(1);
    let mut report = MergeReport::default();

    for (i, path) in paths.iter().enumerate() {
        let path = path.as_ref();
        info!(file = %path.display(), index = i + 1, total = paths.len(), "merging document");
        let source = DocxDocument::open(path)?;

        let body = merged.body_mut()?;
        if i > 0 {
            push_block(body, page_break());
        }
        let mut title = new_paragraph(&format!("文件: {}", display_name(path)));
        set_paragraph_style(&mut title, &heading);
        push_block(body, title);
        push_block(body, new_paragraph(""));

        let mut file = MergedFile {
            path: path.to_path_buf(),
            paragraphs: 0,
            tables: 0,
        };
        for block in source.body()?.elements() {
            match block.name.as_str() {
                "w:p" => {
                    push_block(body, copy_paragraph(block));
                    file.paragraphs += 1;
                }
                "w:tbl" => {
                    push_block(body, copy_table(block));
                    file.tables += 1;
                }
                _ => {}
            }
        }
        debug!(paragraphs = file.paragraphs, tables = file.tables, "merged");
        report.files.push(file);
    }

    info!(files = report.files.len(), "merge complete");
    Ok((merged, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::paragraph::{paragraph_style, paragraphs};
    use crate::error::Error;

    fn write_source(dir: &Path, name: &str, body: &str) -> PathBuf {
        let mut doc = DocxDocument::blank().unwrap();
        *doc.body_mut().unwrap() = Element::parse(body).unwrap();
        let path = dir.join(name);
        doc.save(&path).unwrap();
        path
    }

    #[test]
    fn test_merge_documents() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_source(
            dir.path(),
            "甲.docx",
            r#"<w:body><w:p><w:r><w:rPr><w:rFonts w:ascii="Arial"/><w:b/><w:sz w:val="28"/></w:rPr><w:t>第一份</w:t></w:r></w:p><w:tbl><w:tr><w:tc><w:p><w:r><w:t>A</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>B</w:t></w:r></w:p></w:tc></w:tr><w:tr><w:tc><w:p/><w:p><w:r><w:t>C</w:t></w:r></w:p></w:tc></w:tr></w:tbl><w:sectPr/></w:body>"#,
        );
        let second = write_source(
            dir.path(),
            "乙.docx",
            r#"<w:body><w:p><w:hyperlink><w:r><w:t>链接</w:t></w:r></w:hyperlink></w:p></w:body>"#,
        );

        let (merged, report) = merge_documents(&[first, second]).unwrap();
        assert_eq!(report.files.len(), 2);
        assert_eq!((report.files[0].paragraphs, report.files[0].tables), (1, 1));

        let body = merged.body().unwrap();
        let texts: Vec<String> = paragraphs(body).into_iter().map(text_of).collect();
        assert_eq!(
            texts,
            vec!["文件: 甲.docx", "", "第一份", "A", "B", "C", "", "", "文件: 乙.docx", "", "链接"]
        );

        let first_heading = body.child("w:p").unwrap();
        assert_eq!(paragraph_style(first_heading), Some("Heading1"));

        let copied = paragraphs(body)[2].child("w:r").unwrap().child("w:rPr").unwrap();
        assert!(copied.has_child("w:b"));
        assert!(copied.has_child("w:sz"));
        assert!(!copied.has_child("w:rFonts"));

        let table = body.child("w:tbl").unwrap();
        assert_eq!(table.count_named("w:gridCol"), 2);
        assert_eq!(
            table.find("w:tblStyle").unwrap().attr("w:val"),
            Some(TABLE_STYLE)
        );
        assert_eq!(body.elements().last().unwrap().name, "w:sectPr");
    }

    #[test]
    fn test_missing_inputs_abort() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("无.docx");
        match merge_documents(&[missing.clone()]) {
            Err(Error::FileNotFound(paths)) => assert_eq!(paths, vec![missing]),
            other => panic!("unexpected: {:?}", other.map(|(_, r)| r)),
        }
    }
}
