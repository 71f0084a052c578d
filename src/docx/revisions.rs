//! Tracked changes: reporting them, and accepting or rejecting all of them.

use super::paragraph::text_of;
use super::props::PPR_ORDER;
use super::DocxDocument;
use crate::error::{Error, Result};
use crate::model::{
    format_date, parse_date, Revision, RevisionGroup, RevisionKind, RevisionReport, UNKNOWN_AUTHOR,
};
use crate::package::resolve_path;
use crate::xml::Element;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info};

/// Changes closer together than this, by the same author, share a group.
const GROUP_WINDOW_SECONDS: i64 = 5;

/// Every element that records a tracked change.
const REVISION_ELEMENTS: &[&str] = &[
    "w:ins", "w:del", "w:moveFrom", "w:moveTo", "w:rPrChange", "w:pPrChange",
    "w:sectPrChange", "w:tblPrChange", "w:tblPrExChange", "w:trPrChange", "w:tcPrChange",
    "w:tblGridChange", "w:numberingChange", "w:cellIns", "w:cellDel", "w:cellMerge",
];

const MOVE_RANGE_MARKERS: &[&str] = &[
    "w:moveFromRangeStart", "w:moveFromRangeEnd", "w:moveToRangeStart", "w:moveToRangeEnd",
];

struct Found {
    kind: RevisionKind,
    author: String,
    raw_date: String,
    change_id: String,
    original: String,
    revised: String,
}

impl Found {
    fn new(kind: RevisionKind, marker: &Element) -> Self {
        Self {
            kind,
            author: marker
                .attr("w:author")
                .filter(|a| !a.trim().is_empty())
                .unwrap_or(UNKNOWN_AUTHOR)
                .to_string(),
            raw_date: marker.attr("w:date").unwrap_or_default().to_string(),
            change_id: marker.attr("w:id").unwrap_or_default().to_string(),
            original: String::new(),
            revised: String::new(),
        }
    }
}

fn deleted_text(e: &Element) -> String {
    e.descendants()
        .into_iter()
        .filter(|d| d.is("w:delText") || d.is("w:t"))
        .map(Element::text)
        .collect()
}

fn switch(e: &Element) -> &'static str {
    if e.attr("w:val").is_some_and(|v| matches!(v, "0" | "false" | "off")) {
        "关闭"
    } else {
        "开启"
    }
}

fn number(value: &str, divisor: f64) -> Option<String> {
    value.parse::<f64>().ok().map(|v| format!("{}", v / divisor))
}

/// Element names plus readable details, `b、sz (粗体: 开启; 字号: 14磅)`.
fn describe(props: &Element, details: Vec<(&str, String)>, unknown: &str) -> String {
    let names: Vec<&str> = props.elements().map(Element::local_name).collect();
    let mut out = if names.is_empty() {
        unknown.to_string()
    } else {
        names.join("、")
    };
    if !details.is_empty() {
        let joined: Vec<String> = details.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        out.push_str(&format!(" ({})", joined.join("; ")));
    }
    out
}

fn describe_run_change(previous: &Element) -> String {
    let mut details = Vec::new();
    for e in previous.elements() {
        match e.local_name() {
            "b" => details.push(("粗体", switch(e).to_string())),
            "i" => details.push(("斜体", switch(e).to_string())),
            "u" => details.push(("下划线", e.attr("w:val").unwrap_or("单线").to_string())),
            "color" => details.push(("颜色", e.attr("w:val").unwrap_or("自动").to_string())),
            "sz" => {
                if let Some(size) = e.attr("w:val").and_then(|v| number(v, 2.0)) {
                    details.push(("字号", format!("{}磅", size)));
                }
            }
            "highlight" => details.push(("突出显示", e.attr("w:val").unwrap_or("无").to_string())),
            _ => {}
        }
    }
    format!("格式变化: {}", describe(previous, details, "未知格式变化"))
}

fn describe_paragraph_change(previous: &Element) -> String {
    let mut details = Vec::new();
    for e in previous.elements() {
        match e.local_name() {
            "jc" => details.push(("对齐方式", e.attr("w:val").unwrap_or("未知").to_string())),
            "spacing" => {
                if let Some(v) = e.attr("w:before").and_then(|v| number(v, 20.0)) {
                    details.push(("段前间距", format!("{}磅", v)));
                }
                if let Some(v) = e.attr("w:after").and_then(|v| number(v, 20.0)) {
                    details.push(("段后间距", format!("{}磅", v)));
                }
                if let Some(v) = e.attr("w:line").and_then(|v| number(v, 240.0)) {
                    details.push(("行距", format!("{}倍", v)));
                }
            }
            "ind" => {
                for (attr, label) in [
                    ("w:left", "左缩进"),
                    ("w:right", "右缩进"),
                    ("w:firstLine", "首行缩进"),
                ] {
                    if let Some(v) = e.attr(attr).and_then(|v| number(v, 20.0)) {
                        details.push((label, format!("{}磅", v)));
                    }
                }
            }
            _ => {}
        }
    }
    format!("段落属性变化: {}", describe(previous, details, "未知段落属性变化"))
}

/// The recorded previous properties inside a `*PrChange`.
fn previous_props<'a>(change: &'a Element, props_name: &str) -> &'a Element {
    change.child(props_name).unwrap_or(change)
}

fn collect(element: &Element, out: &mut Vec<Found>) {
    for child in element.elements() {
        match child.name.as_str() {
            "w:ins" | "w:moveTo" => {
                let mut found = Found::new(RevisionKind::Insertion, child);
                found.revised = text_of(child);
                out.push(found);
            }
            "w:del" | "w:moveFrom" => {
                let mut found = Found::new(RevisionKind::Deletion, child);
                found.original = deleted_text(child);
                out.push(found);
            }
            "w:p" => {
                if let Some(change) = child.child("w:pPr").and_then(|p| p.child("w:pPrChange")) {
                    let mut found = Found::new(RevisionKind::ParagraphChange, change);
                    found.original = text_of(child);
                    found.revised = describe_paragraph_change(previous_props(change, "w:pPr"));
                    out.push(found);
                }
                collect(child, out);
            }
            "w:r" => {
                if let Some(change) = child.child("w:rPr").and_then(|p| p.child("w:rPrChange")) {
                    let mut found = Found::new(RevisionKind::FormatChange, change);
                    found.original = text_of(child);
                    found.revised = describe_run_change(previous_props(change, "w:rPr"));
                    out.push(found);
                }
            }
            // paragraph-mark and row markers carry no content
            "w:pPr" | "w:rPr" | "w:trPr" | "w:tcPr" | "w:sectPr" => {}
            _ => collect(child, out),
        }
    }
}

fn same_group(first: &Found, first_date: Option<NaiveDateTime>, next: &Found, next_date: Option<NaiveDateTime>) -> bool {
    if first.author != next.author {
        return false;
    }
    match (first_date, next_date) {
        (Some(a), Some(b)) => (a - b).num_seconds().abs() < GROUP_WINDOW_SECONDS,
        (None, None) => true,
        _ => false,
    }
}

/// Every tracked change of the main document in document order, grouped by
/// author and time.
pub fn extract_revisions(doc: &DocxDocument) -> Result<RevisionReport> {
    let mut found = Vec::new();
    collect(doc.body()?, &mut found);

    let mut report = RevisionReport::default();
    let mut group_start: Option<(usize, Option<NaiveDateTime>)> = None;
    for (index, item) in found.iter().enumerate() {
        let revision = Revision {
            id: index + 1,
            kind: item.kind,
            author: item.author.clone(),
            date: format_date(&item.raw_date),
            original_content: item.original.clone(),
            revised_content: item.revised.clone(),
            group_id: item.change_id.clone(),
        };
        let date = parse_date(&item.raw_date);
        let joins = group_start
            .is_some_and(|(start, start_date)| same_group(&found[start], start_date, item, date));
        if let Some(group) = report.revision_groups.last_mut().filter(|_| joins) {
            group.revisions.push(revision.clone());
        } else {
            group_start = Some((index, date));
            report.revision_groups.push(RevisionGroup {
                group_id: report.revision_groups.len() + 1,
                author: revision.author.clone(),
                date: revision.date.clone(),
                revisions: vec![revision.clone()],
            });
        }
        debug!(id = revision.id, kind = %revision.kind, author = %revision.author, "revision");
        report.revisions.push(revision);
    }

    info!(
        revisions = report.revisions.len(),
        groups = report.revision_groups.len(),
        "extracted revisions"
    );
    Ok(report)
}

/// Whether tracked changes are kept as the new text or thrown away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionMode {
    #[default]
    Accept,
    Reject,
}

impl FromStr for RevisionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "accept" => Ok(RevisionMode::Accept),
            "reject" => Ok(RevisionMode::Reject),
            other => Err(Error::Config(format!("unknown revision mode: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevisionRemovalReport {
    pub mode: RevisionMode,
    /// Change markers processed in the main document.
    pub changes: usize,
    /// Whether `w:trackRevisions` was switched off in the settings part.
    pub tracking_disabled: bool,
}

fn count_changes(root: &Element) -> usize {
    root.descendants()
        .iter()
        .filter(|e| REVISION_ELEMENTS.contains(&e.name.as_str()))
        .count()
}

fn row_marked(row: &Element, marker: &str) -> bool {
    row.is("w:tr") && row.child("w:trPr").is_some_and(|p| p.has_child(marker))
}

fn cell_marked(cell: &Element, marker: &str) -> bool {
    cell.is("w:tc") && cell.child("w:tcPr").is_some_and(|p| p.has_child(marker))
}

/// Put the properties recorded in `<name>Change` back into `props`.
fn restore_previous(props: &mut Element) {
    let change_name = format!("{}Change", props.name);
    let Some(change) = props.child(&change_name) else {
        return;
    };
    let previous = change
        .child(&props.name)
        .cloned()
        .unwrap_or_else(|| Element::new(props.name.clone()));
    let kept: Vec<Element> = if props.is("w:pPr") {
        props
            .elements()
            .filter(|c| c.is("w:rPr") || c.is("w:sectPr"))
            .cloned()
            .collect()
    } else {
        Vec::new()
    };
    props.children = previous.children;
    for element in kept {
        props.insert_ordered(element, PPR_ORDER);
    }
}

fn accept_all(root: &mut Element) {
    root.remove_descendants(&|e| row_marked(e, "w:del") || cell_marked(e, "w:cellDel"));
    root.remove_descendants(&|e| e.is("w:del") || e.is("w:moveFrom"));
    root.unwrap_descendants(&|e| e.is("w:ins") || e.is("w:moveTo"));
    root.remove_descendants(&|e| {
        e.name.ends_with("PrChange")
            || e.name.ends_with("PrExChange")
            || matches!(
                e.name.as_str(),
                "w:tblGridChange" | "w:numberingChange" | "w:cellIns" | "w:cellMerge"
            )
    });
}

fn reject_all(root: &mut Element) {
    root.remove_descendants(&|e| row_marked(e, "w:ins") || cell_marked(e, "w:cellIns"));
    root.remove_descendants(&|e| e.is("w:ins") || e.is("w:moveTo"));
    root.visit_mut(&mut |e| match e.name.as_str() {
        "w:delText" => e.name = "w:t".to_string(),
        "w:delInstrText" => e.name = "w:instrText".to_string(),
        _ => {}
    });
    root.unwrap_descendants(&|e| e.is("w:del") || e.is("w:moveFrom"));
    root.visit_mut(&mut restore_previous);
    root.remove_descendants(&|e| {
        matches!(
            e.name.as_str(),
            "w:tblGridChange" | "w:numberingChange" | "w:cellDel" | "w:cellMerge"
        ) || e.name.ends_with("PrChange")
            || e.name.ends_with("PrExChange")
    });
}

fn disable_tracking(doc: &mut DocxDocument) -> Result<bool> {
    let main = doc.main_part().to_string();
    let settings = doc
        .package()
        .read_relationships(&main)?
        .of_kind("settings")
        .next()
        .map(|r| resolve_path(&main, &r.target))
        .unwrap_or_else(|| "word/settings.xml".to_string());
    if !doc.package().exists(&settings) {
        return Ok(false);
    }
    let mut xml = doc.package().parse_xml_part(&settings)?;
    if xml.root.remove_descendants(&|e| e.is("w:trackRevisions")) == 0 {
        return Ok(false);
    }
    doc.package_mut().write_xml_part(&settings, &xml)?;
    Ok(true)
}

/// Accept or reject every tracked change of the main document.
///
/// A document without changes is left untouched.
pub fn remove_revisions(doc: &mut DocxDocument, mode: RevisionMode) -> Result<RevisionRemovalReport> {
    let changes = count_changes(doc.root());
    let mut report = RevisionRemovalReport {
        mode,
        changes,
        tracking_disabled: false,
    };
    if changes == 0 {
        info!("no tracked changes found");
        return Ok(report);
    }

    let root = doc.root_mut();
    match mode {
        RevisionMode::Accept => accept_all(root),
        RevisionMode::Reject => reject_all(root),
    }
    root.remove_descendants(&|e| MOVE_RANGE_MARKERS.contains(&e.name.as_str()));
    report.tracking_disabled = disable_tracking(doc)?;

    info!(?mode, changes, tracking_disabled = report.tracking_disabled, "processed tracked changes");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::paragraph::paragraphs;

    const BODY: &str = r#"<w:body>
<w:p><w:pPr><w:jc w:val="center"/><w:pPrChange w:id="9" w:author="李四" w:date="2024-01-02T10:00:00Z"><w:pPr><w:spacing w:before="240" w:line="360"/><w:jc w:val="left"/></w:pPr></w:pPrChange></w:pPr><w:r><w:t>保留</w:t></w:r><w:ins w:id="1" w:author="张三" w:date="2024-01-01T10:00:00Z"><w:r><w:t>新增</w:t></w:r></w:ins><w:del w:id="2" w:author="张三" w:date="2024-01-01T10:00:03Z"><w:r><w:delText>旧词</w:delText></w:r></w:del></w:p>
<w:p><w:r><w:rPr><w:b/><w:rPrChange w:id="3" w:author="张三" w:date="2024-01-01T10:00:30Z"><w:rPr><w:i/><w:sz w:val="28"/></w:rPr></w:rPrChange></w:rPr><w:t>加粗</w:t></w:r></w:p>
<w:tbl><w:tr><w:trPr><w:ins w:id="4" w:author="张三"/></w:trPr><w:tc><w:p><w:r><w:t>新行</w:t></w:r></w:p></w:tc></w:tr><w:tr><w:tc><w:p><w:r><w:t>旧行</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
<w:sectPr/></w:body>"#;

    fn tracked_doc() -> DocxDocument {
        let mut doc = DocxDocument::blank().unwrap();
        *doc.body_mut().unwrap() = Element::parse(BODY).unwrap();
        doc.package_mut().set_part(
            "word/settings.xml",
            br#"<w:settings xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:trackRevisions/><w:defaultTabStop w:val="420"/></w:settings>"#.to_vec(),
        );
        doc
    }

    fn texts(doc: &DocxDocument) -> Vec<String> {
        paragraphs(doc.body().unwrap()).into_iter().map(text_of).collect()
    }

    #[test]
    fn test_extract_in_document_order() {
        let doc = tracked_doc();
        let report = extract_revisions(&doc).unwrap();
        let kinds: Vec<RevisionKind> = report.revisions.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RevisionKind::ParagraphChange,
                RevisionKind::Insertion,
                RevisionKind::Deletion,
                RevisionKind::FormatChange,
            ]
        );
        let ids: Vec<usize> = report.revisions.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        let paragraph = &report.revisions[0];
        assert_eq!(paragraph.author, "李四");
        assert_eq!(paragraph.group_id, "9");
        assert_eq!(
            paragraph.revised_content,
            "段落属性变化: spacing、jc (段前间距: 12磅; 行距: 1.5倍; 对齐方式: left)"
        );
        assert_eq!(report.revisions[1].revised_content, "新增");
        assert_eq!(report.revisions[2].original_content, "旧词");
        assert_eq!(report.revisions[2].date, "2024-01-01 10:00:03");
        assert_eq!(
            report.revisions[3].revised_content,
            "格式变化: i、sz (斜体: 开启; 字号: 14磅)"
        );
        assert_eq!(report.revisions[3].original_content, "加粗");
    }

    #[test]
    fn test_grouping_by_author_and_time() {
        let report = extract_revisions(&tracked_doc()).unwrap();
        let sizes: Vec<usize> = report.revision_groups.iter().map(|g| g.revisions.len()).collect();
        // 李四 | 张三 +0s, +3s | 张三 +30s
        assert_eq!(sizes, vec![1, 2, 1]);
        assert_eq!(report.revision_groups[1].type_summary(), "1个插入, 1个删除");
        assert_eq!(report.revision_groups[1].sample(50).as_deref(), Some("新增"));
        assert_eq!(report.revision_groups[2].group_id, 3);
    }

    #[test]
    fn test_accept_all() {
        let mut doc = tracked_doc();
        let report = remove_revisions(&mut doc, RevisionMode::Accept).unwrap();
        assert_eq!(report.changes, 5);
        assert!(report.tracking_disabled);
        assert_eq!(count_changes(doc.root()), 0);
        assert_eq!(texts(&doc), vec!["保留新增", "加粗", "新行", "旧行"]);

        let ppr = doc.body().unwrap().child("w:p").unwrap().child("w:pPr").unwrap();
        assert_eq!(ppr.child("w:jc").unwrap().attr("w:val"), Some("center"));

        let settings = doc.package().read_xml("word/settings.xml").unwrap();
        assert!(!settings.contains("trackRevisions"));
    }

    #[test]
    fn test_reject_all() {
        let mut doc = tracked_doc();
        remove_revisions(&mut doc, RevisionMode::Reject).unwrap();
        assert_eq!(count_changes(doc.root()), 0);
        assert_eq!(texts(&doc), vec!["保留旧词", "加粗", "旧行"]);

        let body = doc.body().unwrap();
        let first = body.child("w:p").unwrap();
        let ppr = first.child("w:pPr").unwrap();
        assert_eq!(ppr.child("w:jc").unwrap().attr("w:val"), Some("left"));
        assert!(ppr.has_child("w:spacing"));

        let run = body.children_named("w:p").nth(1).unwrap().child("w:r").unwrap();
        let rpr = run.child("w:rPr").unwrap();
        assert!(rpr.has_child("w:i"));
        assert!(!rpr.has_child("w:b"));
    }

    #[test]
    fn test_untouched_without_changes() {
        let mut doc = DocxDocument::blank().unwrap();
        let before = doc.root().clone();
        let report = remove_revisions(&mut doc, RevisionMode::Reject).unwrap();
        assert_eq!(report.changes, 0);
        assert_eq!(doc.root(), &before);
        assert_eq!("reject".parse::<RevisionMode>().unwrap(), RevisionMode::Reject);
        assert!("maybe".parse::<RevisionMode>().is_err());
    }
}
