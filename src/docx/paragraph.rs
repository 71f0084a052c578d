//! Paragraph and run text helpers.

use super::props::{self, PPR_ORDER};
use crate::xml::{Element, Node};
use regex::Regex;

/// Elements whose text never belongs to the visible paragraph text.
const NON_TEXT: &[&str] = &[
    "w:pPr", "w:rPr", "w:del", "w:moveFrom", "w:delText", "w:instrText", "w:delInstrText",
    "w:drawing", "w:pict", "w:object", "w:footnoteReference", "w:endnoteReference",
];

/// Elements that make a paragraph worth keeping even without text.
const CONTENT_OBJECTS: &[&str] = &[
    "w:drawing", "w:pict", "w:object", "w:fldChar", "w:fldSimple", "w:sectPr",
    "w:footnoteReference", "w:endnoteReference", "m:oMath", "m:oMathPara", "w:bookmarkStart",
];

fn is_page_break(e: &Element) -> bool {
    e.is("w:br") && matches!(e.attr("w:type"), Some("page" | "column"))
}

/// Children of a run that carry its text.
fn is_text_child(e: &Element) -> bool {
    matches!(e.name.as_str(), "w:t" | "w:tab" | "w:cr") || (e.is("w:br") && !is_page_break(e))
}

/// Visible text of a paragraph, run or any container of runs.
///
/// Tabs map to `\t`, line breaks to `\n`; deleted text is skipped.
pub fn text_of(element: &Element) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    out
}

fn collect_text(element: &Element, out: &mut String) {
    for child in element.elements() {
        match child.name.as_str() {
            "w:t" => out.push_str(&child.text()),
            "w:tab" => out.push('\t'),
            "w:cr" => out.push('\n'),
            "w:br" if !is_page_break(child) => out.push('\n'),
            name if NON_TEXT.contains(&name) => {}
            _ => collect_text(child, out),
        }
    }
}

pub fn is_blank(p: &Element) -> bool {
    text_of(p).trim().is_empty()
}

/// Whether the paragraph holds a drawing, field, break or section end.
pub fn has_content_objects(p: &Element) -> bool {
    p.descendants()
        .iter()
        .any(|e| CONTENT_OBJECTS.contains(&e.name.as_str()) || is_page_break(e))
}

/// Direct `w:r` children.
pub fn runs(p: &Element) -> impl Iterator<Item = &Element> {
    p.children_named("w:r")
}

/// Build run content for `text`: `w:t` segments separated by `w:tab` and `w:br`.
pub fn text_elements(text: &str) -> Vec<Element> {
    let mut out = Vec::new();
    let mut segment = String::new();
    let flush = |segment: &mut String, out: &mut Vec<Element>| {
        if !segment.is_empty() {
            out.push(
                Element::new("w:t")
                    .with_attr("xml:space", "preserve")
                    .with_text(std::mem::take(segment)),
            );
        }
    };
    for c in text.chars() {
        match c {
            '\t' => {
                flush(&mut segment, &mut out);
                out.push(Element::new("w:tab"));
            }
            '\n' => {
                flush(&mut segment, &mut out);
                out.push(Element::new("w:br"));
            }
            '\r' => {}
            c => segment.push(c),
        }
    }
    flush(&mut segment, &mut out);
    out
}

/// Replace the text of a run, keeping its properties and any drawings.
pub fn set_run_text(run: &mut Element, text: &str) {
    run.retain_children(|e| !is_text_child(e));
    for e in text_elements(text) {
        run.push(e);
    }
}

/// A new run, optionally with run properties.
pub fn new_run(text: &str, rpr: Option<Element>) -> Element {
    let mut run = Element::new("w:r");
    if let Some(rpr) = rpr.filter(|r| !r.children.is_empty()) {
        run.push(rpr);
    }
    for e in text_elements(text) {
        run.push(e);
    }
    run
}

/// Visit the runs whose text [`text_of`] reads, in document order.
///
/// Runs inside hyperlinks, insertions, smart tags and simple fields are
/// included; deleted runs and text boxes are not.
pub fn for_each_text_run_mut(container: &mut Element, f: &mut dyn FnMut(&mut Element)) {
    for child in container.elements_mut() {
        if child.is("w:r") {
            f(child);
        } else if !NON_TEXT.contains(&child.name.as_str()) {
            for_each_text_run_mut(child, f);
        }
    }
}

/// Visit the `w:t` elements of the runs [`for_each_text_run_mut`] reaches.
pub fn for_each_text_mut(container: &mut Element, f: &mut dyn FnMut(&mut Element)) {
    for_each_text_run_mut(container, &mut |run| {
        for t in run.elements_mut().filter(|e| e.is("w:t")) {
            f(t);
        }
    });
}

/// Put `text` into the first run and empty the others.
///
/// The first run keeps its formatting; a paragraph without runs gets one.
pub fn set_paragraph_text(p: &mut Element, text: &str) {
    let mut first = true;
    for_each_text_run_mut(p, &mut |run| {
        set_run_text(run, if first { text } else { "" });
        first = false;
    });
    if first && !text.is_empty() {
        p.push(new_run(text, None));
    }
}

/// Delete every match of `re` from the paragraph text; returns the match count.
///
/// Matches inside one `w:t` are removed in place. A match spanning runs
/// collapses the paragraph text into its first run.
pub fn remove_matches(p: &mut Element, re: &Regex) -> usize {
    let mut count = 0;
    for_each_text_mut(p, &mut |t| {
        let text = t.text();
        let found = re.find_iter(&text).count();
        if found > 0 {
            count += found;
            t.set_text(re.replace_all(&text, "").into_owned());
        }
    });

    let text = text_of(p);
    let spanning = re.find_iter(&text).count();
    if spanning > 0 {
        count += spanning;
        set_paragraph_text(p, &re.replace_all(&text, ""));
    }
    count
}

/// Properties of the first run that has any, for rebuilding a paragraph.
pub fn first_run_props(p: &Element) -> Option<Element> {
    runs(p).find_map(|r| r.child("w:rPr")).cloned()
}

/// Drop everything but the paragraph properties.
pub fn clear_paragraph(p: &mut Element) {
    p.retain_children(|e| e.is("w:pPr"));
    p.children.retain(|n| matches!(n, Node::Element(_)));
}

pub fn paragraph_style(p: &Element) -> Option<&str> {
    p.child("w:pPr")
        .and_then(|ppr| ppr.child("w:pStyle"))
        .and_then(|s| s.attr("w:val"))
}

pub fn set_paragraph_style(p: &mut Element, style_id: &str) {
    props::paragraph_props(p)
        .ensure_child_ordered("w:pStyle", PPR_ORDER)
        .set_attr("w:val", style_id);
}

/// A paragraph with one plain-text run.
pub fn new_paragraph(text: &str) -> Element {
    let mut p = Element::new("w:p");
    if !text.is_empty() {
        p.push(new_run(text, None));
    }
    p
}

/// Append a paragraph or table to the body, keeping the final `w:sectPr` last.
pub fn push_block(body: &mut Element, block: Element) {
    let pos = body
        .children
        .iter()
        .rposition(|n| matches!(n, Node::Element(e) if e.is("w:sectPr")))
        .unwrap_or(body.children.len());
    body.children.insert(pos, Node::Element(block));
}

/// Visit paragraphs in document order, descending into tables and content controls.
pub fn for_each_paragraph_mut(container: &mut Element, f: &mut dyn FnMut(&mut Element)) {
    for child in container.elements_mut() {
        match child.name.as_str() {
            "w:p" => f(child),
            "w:tbl" | "w:tr" | "w:tc" | "w:sdt" | "w:sdtContent" | "w:customXml" => {
                for_each_paragraph_mut(child, f)
            }
            _ => {}
        }
    }
}

pub fn paragraphs(container: &Element) -> Vec<&Element> {
    let mut out = Vec::new();
    collect_paragraphs(container, &mut out);
    out
}

fn collect_paragraphs<'a>(container: &'a Element, out: &mut Vec<&'a Element>) {
    for child in container.elements() {
        match child.name.as_str() {
            "w:p" => out.push(child),
            "w:tbl" | "w:tr" | "w:tc" | "w:sdt" | "w:sdtContent" | "w:customXml" => {
                collect_paragraphs(child, out)
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: &str = r#"<w:p><w:pPr><w:pStyle w:val="Body"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t>Hello</w:t><w:tab/></w:r><w:hyperlink><w:r><w:t xml:space="preserve"> link</w:t></w:r></w:hyperlink><w:del><w:r><w:delText>gone</w:delText></w:r></w:del><w:r><w:t>!</w:t><w:br w:type="page"/></w:r></w:p>"#;

    #[test]
    fn test_text_of() {
        let p = Element::parse(P).unwrap();
        assert_eq!(text_of(&p), "Hello\t link!");
        assert_eq!(paragraph_style(&p), Some("Body"));
        assert!(has_content_objects(&p));
    }

    #[test]
    fn test_set_paragraph_text_keeps_first_run_format() {
        let mut p = Element::parse(P).unwrap();
        set_paragraph_text(&mut p, "A\tB");
        let runs: Vec<&Element> = runs(&p).collect();
        assert!(runs[0].child("w:rPr").unwrap().has_child("w:b"));
        assert_eq!(text_of(runs[0]), "A\tB");
        assert_eq!(text_of(runs[1]), "");
        // page break survives in the emptied run
        assert!(runs[1].has_child("w:br"));
        assert_eq!(text_of(&p), "A\tB");
    }

    #[test]
    fn test_set_text_empties_nested_runs() {
        let mut p = Element::parse(
            r#"<w:p><w:r><w:t>合同</w:t></w:r><w:hyperlink><w:r><w:t>编号</w:t></w:r></w:hyperlink><w:ins><w:r><w:t>附</w:t></w:r></w:ins><w:del><w:r><w:delText>旧</w:delText></w:r></w:del></w:p>"#,
        )
        .unwrap();
        set_paragraph_text(&mut p, "合X号");
        assert_eq!(text_of(&p), "合X号");
        assert_eq!(p.find("w:delText").unwrap().text(), "旧");
    }

    #[test]
    fn test_remove_matches_across_inserted_run() {
        let mut p = Element::parse(
            r#"<w:p><w:r><w:t>重点*</w:t></w:r><w:ins><w:r><w:t>*内容</w:t></w:r></w:ins></w:p>"#,
        )
        .unwrap();
        let re = Regex::new(r"\*\*").unwrap();
        assert_eq!(remove_matches(&mut p, &re), 1);
        assert_eq!(text_of(&p), "重点内容");
    }

    #[test]
    fn test_remove_matches_skips_text_boxes() {
        let mut p = Element::parse(
            r#"<w:p><w:r><w:t>**甲**</w:t><w:drawing><w:txbxContent><w:p><w:r><w:t>**框**</w:t></w:r></w:p></w:txbxContent></w:drawing></w:r></w:p>"#,
        )
        .unwrap();
        let re = Regex::new(r"\*\*").unwrap();
        assert_eq!(remove_matches(&mut p, &re), 2);
        assert_eq!(text_of(&p), "甲");
        assert_eq!(p.find("w:drawing").unwrap().text(), "**框**");
    }

    #[test]
    fn test_set_text_on_empty_paragraph() {
        let mut p = Element::new("w:p");
        set_paragraph_text(&mut p, "");
        assert!(p.children.is_empty());
        set_paragraph_text(&mut p, "line1\nline2");
        assert_eq!(text_of(&p), "line1\nline2");
    }

    #[test]
    fn test_set_style_inserts_ppr_first() {
        let mut p = new_paragraph("x");
        set_paragraph_style(&mut p, "Heading1");
        assert_eq!(p.elements().next().unwrap().name, "w:pPr");
        assert_eq!(paragraph_style(&p), Some("Heading1"));
    }

    #[test]
    fn test_paragraph_walk_includes_tables() {
        let body = Element::parse(
            r#"<w:body><w:p/><w:tbl><w:tr><w:tc><w:p/><w:tbl><w:tr><w:tc><w:p/></w:tc></w:tr></w:tbl></w:tc></w:tr></w:tbl><w:sectPr/></w:body>"#,
        )
        .unwrap();
        assert_eq!(paragraphs(&body).len(), 3);
    }

    #[test]
    fn test_push_block_before_section() {
        let mut body = Element::parse("<w:body><w:sectPr/></w:body>").unwrap();
        push_block(&mut body, new_paragraph("a"));
        push_block(&mut body, new_paragraph("b"));
        let names: Vec<&str> = body.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["w:p", "w:p", "w:sectPr"]);
        assert_eq!(text_of(&body), "ab");
    }
}
