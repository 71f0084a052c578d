//! Review comments: extraction with the anchored text, and removal.

use super::paragraph::{self, text_of};
use super::DocxDocument;
use crate::error::Result;
use crate::model::{format_date, Comment, MISSING_REFERENCE, UNKNOWN_AUTHOR};
use crate::package::{resolve_path, Relationship};
use crate::xml::Element;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, info};

const COMMENT_PARTS: &[&str] = &[
    "word/comments.xml",
    "word/commentsExtended.xml",
    "word/commentsIds.xml",
    "word/commentsExtensible.xml",
    "word/wpsComments.xml",
];

static NUMBERED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[批注(\d+)\](.*?)\[/批注\]").expect("invalid regex"));

/// Inline marker forms, tried in order; each match is consumed before the next form.
static INLINE_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"【批注[:：]?(.*?)】",
        r"（批注[:：]?(.*?)）",
        r"\(批注[:：]?(.*?)\)",
        r"\[批注[:：]?(.*?)\]",
        r"批注[:：]?(.*?)\z",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid regex"))
    .collect()
});

static STRIP_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[批注.*?\]|【批注.*?】|（批注.*?）|\(批注.*?\)").expect("invalid regex")
});

fn is_comment_relationship(rel: &Relationship) -> bool {
    rel.rel_type.to_ascii_lowercase().contains("comment")
        || rel.target.to_ascii_lowercase().contains("comment")
}

fn comments_part(doc: &DocxDocument) -> Result<Option<String>> {
    let part = doc
        .package()
        .read_relationships(doc.main_part())?
        .of_kind("comments")
        .next()
        .map(|r| resolve_path(doc.main_part(), &r.target))
        .unwrap_or_else(|| "word/comments.xml".to_string());
    Ok(doc.package().exists(&part).then_some(part))
}

/// Text between `commentRangeStart` and `commentRangeEnd`, keyed by comment id.
fn reference_texts(body: &Element) -> HashMap<String, String> {
    let mut open: Vec<(String, String)> = Vec::new();
    let mut done = HashMap::new();
    collect_ranges(body, &mut open, &mut done);
    for (id, text) in open {
        done.entry(id).or_insert_with(|| text.trim().to_string());
    }
    done
}

fn collect_ranges(
    element: &Element,
    open: &mut Vec<(String, String)>,
    done: &mut HashMap<String, String>,
) {
    for child in element.elements() {
        match child.name.as_str() {
            "w:commentRangeStart" => {
                if let Some(id) = child.attr("w:id") {
                    open.push((id.to_string(), String::new()));
                }
            }
            "w:commentRangeEnd" => {
                let Some(id) = child.attr("w:id") else { continue };
                if let Some(pos) = open.iter().position(|(o, _)| o == id) {
                    let (id, text) = open.remove(pos);
                    done.insert(id, text.trim().to_string());
                }
            }
            "w:t" => {
                let text = child.text();
                for (_, buf) in open.iter_mut() {
                    buf.push_str(&text);
                }
            }
            "w:tab" => open.iter_mut().for_each(|(_, buf)| buf.push('\t')),
            "w:del" | "w:moveFrom" | "w:rPr" | "w:pPr" | "w:instrText" => {}
            "w:p" => {
                collect_ranges(child, open, done);
                for (_, buf) in open.iter_mut().filter(|(_, b)| !b.is_empty()) {
                    buf.push('\n');
                }
            }
            _ => collect_ranges(child, open, done),
        }
    }
}

fn inline_comment(id: String, content: &str) -> Comment {
    Comment {
        id,
        author: UNKNOWN_AUTHOR.to_string(),
        date: String::new(),
        initials: String::new(),
        content: content.trim().to_string(),
        reference_text: MISSING_REFERENCE.to_string(),
    }
}

/// Comments written into the text as `[批注1]…[/批注]`, `【批注：…】` and similar.
fn inline_comments(doc: &DocxDocument) -> Result<Vec<Comment>> {
    let text = doc
        .paragraphs()?
        .into_iter()
        .map(text_of)
        .collect::<Vec<_>>()
        .join("\n");

    let numbered: Vec<Comment> = NUMBERED_MARKER
        .captures_iter(&text)
        .map(|caps| inline_comment(caps[1].to_string(), &caps[2]))
        .collect();
    if !numbered.is_empty() {
        return Ok(numbered);
    }

    let mut comments = Vec::new();
    let mut rest = text;
    for marker in INLINE_MARKERS.iter() {
        for caps in marker.captures_iter(&rest) {
            let id = (comments.len() + 1).to_string();
            comments.push(inline_comment(id, &caps[1]));
        }
        rest = marker.replace_all(&rest, "").into_owned();
    }
    Ok(comments)
}

/// Every comment of the document.
///
/// Documents without a comments part (or with an empty one) are searched for
/// inline comment markers instead.
pub fn extract_comments(doc: &DocxDocument) -> Result<Vec<Comment>> {
    let mut comments = Vec::new();
    if let Some(part) = comments_part(doc)? {
        let xml = doc.package().parse_xml_part(&part)?;
        let references = reference_texts(doc.body()?);
        for c in xml.root.children_named("w:comment") {
            let id = c.attr("w:id").unwrap_or_default().to_string();
            let content = paragraph::paragraphs(c)
                .into_iter()
                .map(text_of)
                .collect::<Vec<_>>()
                .join("\n");
            let reference_text = references
                .get(&id)
                .filter(|t| !t.is_empty())
                .cloned()
                .unwrap_or_else(|| MISSING_REFERENCE.to_string());
            comments.push(Comment {
                author: c
                    .attr("w:author")
                    .filter(|a| !a.trim().is_empty())
                    .unwrap_or(UNKNOWN_AUTHOR)
                    .to_string(),
                date: format_date(c.attr("w:date").unwrap_or_default()),
                initials: c.attr("w:initials").unwrap_or_default().to_string(),
                content: content.trim().to_string(),
                reference_text,
                id,
            });
        }
    }

    if comments.is_empty() {
        debug!("no comments part entries, looking for inline markers");
        comments = inline_comments(doc)?;
    }
    for c in &comments {
        debug!(id = %c.id, author = %c.author, "comment");
    }
    info!(count = comments.len(), "extracted comments");
    Ok(comments)
}

/// What [`remove_comments`] took out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoveCommentsReport {
    pub parts_removed: usize,
    pub references_removed: usize,
    pub ranges_removed: usize,
    pub attributes_removed: usize,
    pub inline_markers_removed: usize,
    pub overrides_removed: usize,
    pub relationships_removed: usize,
}

impl RemoveCommentsReport {
    pub fn total(&self) -> usize {
        self.parts_removed
            + self.references_removed
            + self.ranges_removed
            + self.attributes_removed
            + self.inline_markers_removed
            + self.overrides_removed
            + self.relationships_removed
    }
}

/// Remove comment parts, anchors, references and inline comment markers.
pub fn remove_comments(doc: &mut DocxDocument) -> Result<RemoveCommentsReport> {
    let mut report = RemoveCommentsReport::default();
    let main = doc.main_part().to_string();

    let mut parts: Vec<String> = COMMENT_PARTS.iter().map(|s| s.to_string()).collect();
    parts.extend(
        doc.package()
            .read_relationships(&main)?
            .ordered
            .iter()
            .filter(|r| !r.external && is_comment_relationship(r))
            .map(|r| resolve_path(&main, &r.target)),
    );
    parts.sort();
    parts.dedup();
    for part in &parts {
        if doc.package_mut().remove_part(part) {
            debug!(part = %part, "removed comment part");
            report.parts_removed += 1;
        }
    }

    let root = doc.root_mut();
    report.references_removed = root.count_named("w:commentReference");
    root.remove_descendants(&|e| {
        e.is("w:r")
            && e.has_child("w:commentReference")
            && e.elements().all(|c| c.is("w:rPr") || c.is("w:commentReference"))
    });
    root.remove_descendants(&|e| e.is("w:commentReference"));
    report.ranges_removed =
        root.remove_descendants(&|e| e.is("w:commentRangeStart") || e.is("w:commentRangeEnd"));
    root.visit_mut(&mut |e| {
        report.attributes_removed +=
            e.retain_attrs(|key| !key.to_ascii_lowercase().contains("wpscomment"));
    });

    doc.for_each_paragraph_mut(&mut |p| {
        report.inline_markers_removed += paragraph::remove_matches(p, &STRIP_MARKERS);
    })?;

    report.overrides_removed = doc
        .package_mut()
        .remove_overrides(|name| name.to_ascii_lowercase().contains("comment"))?;
    report.relationships_removed = doc
        .package_mut()
        .remove_relationships(&main, is_comment_relationship)?;

    info!(
        parts = report.parts_removed,
        references = report.references_removed,
        ranges = report.ranges_removed,
        attributes = report.attributes_removed,
        inline = report.inline_markers_removed,
        overrides = report.overrides_removed,
        relationships = report.relationships_removed,
        "removed comments"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMENTS_REL: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments";
    const COMMENTS_CT: &str =
        "application/vnd.openxmlformats-officedocument.wordprocessingml.comments+xml";

    const BODY: &str = r#"<w:body><w:p><w:r><w:t>前文</w:t></w:r><w:commentRangeStart w:id="0"/><w:r><w:t>被批注的</w:t></w:r><w:r><w:t>文字</w:t></w:r><w:commentRangeEnd w:id="0"/><w:r><w:rPr><w:rStyle w:val="CommentReference"/></w:rPr><w:commentReference w:id="0"/></w:r></w:p><w:p><w:r><w:t>其他段落</w:t></w:r></w:p><w:sectPr/></w:body>"#;

    const COMMENTS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:comments xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:comment w:id="0" w:author="张三" w:date="2024-05-06T09:10:11Z" w:initials="ZS"><w:p><w:r><w:t>请核实</w:t></w:r></w:p><w:p><w:r><w:t>数据来源</w:t></w:r></w:p></w:comment><w:comment w:id="1" w:author=""><w:p><w:r><w:t>无锚点</w:t></w:r></w:p></w:comment></w:comments>"#;

    fn commented_doc() -> DocxDocument {
        let mut doc = DocxDocument::blank().unwrap();
        *doc.body_mut().unwrap() = Element::parse(BODY).unwrap();
        let package = doc.package_mut();
        package.set_part("word/comments.xml", COMMENTS.as_bytes().to_vec());
        package.set_part("word/commentsExtended.xml", b"<w15:commentsEx/>".to_vec());
        package
            .add_relationship("word/document.xml", COMMENTS_REL, "comments.xml")
            .unwrap();
        package.add_override("word/comments.xml", COMMENTS_CT).unwrap();
        doc
    }

    #[test]
    fn test_extract_comments() {
        let doc = commented_doc();
        let comments = extract_comments(&doc).unwrap();
        assert_eq!(comments.len(), 2);

        let first = &comments[0];
        assert_eq!(first.id, "0");
        assert_eq!(first.author, "张三");
        assert_eq!(first.initials, "ZS");
        assert_eq!(first.date, "2024-05-06 09:10:11");
        assert_eq!(first.content, "请核实\n数据来源");
        assert_eq!(first.reference_text, "被批注的文字");

        let second = &comments[1];
        assert_eq!(second.author, UNKNOWN_AUTHOR);
        assert_eq!(second.date, "");
        assert_eq!(second.reference_text, MISSING_REFERENCE);
    }

    #[test]
    fn test_inline_markers() {
        let mut doc = DocxDocument::blank().unwrap();
        *doc.body_mut().unwrap() = Element::parse(
            r#"<w:body><w:p><w:r><w:t>正文【批注：补充引用】结束</w:t></w:r></w:p><w:p><w:r><w:t>段落（批注:语序）</w:t></w:r></w:p></w:body>"#,
        )
        .unwrap();
        let comments = extract_comments(&doc).unwrap();
        let contents: Vec<&str> = comments.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["补充引用", "语序"]);
        assert_eq!(comments[1].id, "2");

        *doc.body_mut().unwrap() = Element::parse(
            r#"<w:body><w:p><w:r><w:t>[批注3]第三条[/批注]</w:t></w:r></w:p></w:body>"#,
        )
        .unwrap();
        let comments = extract_comments(&doc).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id, "3");
        assert_eq!(comments[0].content, "第三条");
    }

    #[test]
    fn test_trailing_marker_only_at_end_of_text() {
        let mut doc = DocxDocument::blank().unwrap();
        *doc.body_mut().unwrap() = Element::parse(
            r#"<w:body><w:p><w:r><w:t>请参考被批注的文字</w:t></w:r></w:p><w:p><w:r><w:t>结尾</w:t></w:r></w:p></w:body>"#,
        )
        .unwrap();
        assert!(extract_comments(&doc).unwrap().is_empty());

        *doc.body_mut().unwrap() = Element::parse(
            r#"<w:body><w:p><w:r><w:t>被批注的文字</w:t></w:r></w:p><w:p><w:r><w:t>全文完 批注：待定</w:t></w:r></w:p></w:body>"#,
        )
        .unwrap();
        let comments = extract_comments(&doc).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].content, "待定");
    }

    #[test]
    fn test_remove_comments() {
        let mut doc = commented_doc();
        let report = remove_comments(&mut doc).unwrap();
        assert_eq!(report.parts_removed, 2);
        assert_eq!(report.references_removed, 1);
        assert_eq!(report.ranges_removed, 2);
        assert_eq!(report.overrides_removed, 1);
        assert_eq!(report.relationships_removed, 1);

        assert!(!doc.package().exists("word/comments.xml"));
        let body = doc.body().unwrap();
        assert_eq!(body.count_named("w:commentReference"), 0);
        assert_eq!(body.count_named("w:commentRangeStart"), 0);
        assert_eq!(text_of(doc.paragraphs().unwrap()[0]), "前文被批注的文字");
        // the reference run is gone entirely
        assert_eq!(paragraph::runs(doc.paragraphs().unwrap()[0]).count(), 3);

        let bytes = doc.to_bytes().unwrap();
        let reopened = DocxDocument::from_bytes(bytes).unwrap();
        assert!(extract_comments(&reopened).unwrap().is_empty());
    }

    #[test]
    fn test_remove_inline_markers() {
        let mut doc = DocxDocument::blank().unwrap();
        *doc.body_mut().unwrap() = Element::parse(
            r#"<w:body><w:p><w:r><w:t>保留[批注：删去]内容</w:t></w:r></w:p></w:body>"#,
        )
        .unwrap();
        let report = remove_comments(&mut doc).unwrap();
        assert_eq!(report.inline_markers_removed, 1);
        assert_eq!(text_of(doc.paragraphs().unwrap()[0]), "保留内容");
    }
}
