//! Records written to comment and revision reports.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_AUTHOR: &str = "未知作者";
pub const MISSING_REFERENCE: &str = "无法获取引用文本";

const REPORT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a `w:date` stamp (RFC 3339, or without offset).
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_local())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// Format a `w:date` stamp for reports; unparseable input is returned as-is.
pub fn format_date(raw: &str) -> String {
    match parse_date(raw) {
        Some(dt) => dt.format(REPORT_DATE_FORMAT).to_string(),
        None => raw.to_string(),
    }
}

/// A review comment and the text it is anchored to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub initials: String,
    pub content: String,
    pub reference_text: String,
}

/// Kind of tracked change, labelled as in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RevisionKind {
    #[serde(rename = "插入")]
    Insertion,
    #[serde(rename = "删除")]
    Deletion,
    #[serde(rename = "格式修改")]
    FormatChange,
    #[serde(rename = "段落属性修改")]
    ParagraphChange,
}

impl RevisionKind {
    pub fn label(&self) -> &'static str {
        match self {
            RevisionKind::Insertion => "插入",
            RevisionKind::Deletion => "删除",
            RevisionKind::FormatChange => "格式修改",
            RevisionKind::ParagraphChange => "段落属性修改",
        }
    }
}

impl std::fmt::Display for RevisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One tracked change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    /// 1-based position in document order.
    pub id: usize,
    #[serde(rename = "type")]
    pub kind: RevisionKind,
    pub author: String,
    pub date: String,
    pub original_content: String,
    pub revised_content: String,
    /// The `w:id` of the change.
    pub group_id: String,
}

/// Consecutive changes by one author made within a few seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionGroup {
    pub group_id: usize,
    pub author: String,
    pub date: String,
    pub revisions: Vec<Revision>,
}

impl RevisionGroup {
    /// Counts per kind in first-seen order, e.g. `2个插入, 1个删除`.
    pub fn type_summary(&self) -> String {
        let mut counts: Vec<(RevisionKind, usize)> = Vec::new();
        for rev in &self.revisions {
            match counts.iter_mut().find(|(k, _)| *k == rev.kind) {
                Some((_, n)) => *n += 1,
                None => counts.push((rev.kind, 1)),
            }
        }
        counts
            .iter()
            .map(|(kind, n)| format!("{}个{}", n, kind))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// First non-empty content of the group, cut to `max_chars`.
    pub fn sample(&self, max_chars: usize) -> Option<String> {
        self.revisions.iter().find_map(|rev| {
            let content = match rev.kind {
                RevisionKind::Deletion => &rev.original_content,
                _ => &rev.revised_content,
            };
            if content.is_empty() {
                return None;
            }
            let mut cut: String = content.chars().take(max_chars).collect();
            if content.chars().count() > max_chars {
                cut.push_str("...");
            }
            Some(cut)
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevisionReport {
    pub revisions: Vec<Revision>,
    pub revision_groups: Vec<RevisionGroup>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2024-03-01T08:30:00Z"), "2024-03-01 08:30:00");
        assert_eq!(format_date("2024-03-01T08:30:00"), "2024-03-01 08:30:00");
        assert_eq!(format_date("yesterday"), "yesterday");
        assert_eq!(format_date(""), "");
        assert!(parse_date("2024-03-01T08:30:05+08:00").is_some());
    }

    #[test]
    fn test_revision_kind_labels() {
        let json = serde_json::to_string(&RevisionKind::ParagraphChange).unwrap();
        assert_eq!(json, "\"段落属性修改\"");
        assert_eq!(RevisionKind::Deletion.to_string(), "删除");
    }

    #[test]
    fn test_comment_without_initials() {
        let comment = Comment {
            id: "0".into(),
            author: UNKNOWN_AUTHOR.into(),
            date: String::new(),
            initials: String::new(),
            content: "检查".into(),
            reference_text: MISSING_REFERENCE.into(),
        };
        let json = serde_json::to_value(&comment).unwrap();
        assert!(json.get("initials").is_none());
        assert_eq!(json["author"], "未知作者");
    }
}
