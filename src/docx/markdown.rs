//! Markdown left over in Word text: strip the markers, or turn them into
//! heading styles and run formatting.

use super::paragraph::{self, first_run_props, new_run, set_paragraph_style, set_paragraph_text};
use super::props::set_toggle;
use super::DocxDocument;
use crate::error::Result;
use crate::xml::Element;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, info};

static EMPHASIS_MARKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*{2,}").expect("invalid regex"));
static HEADING_MARK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#+\s+").expect("invalid regex"));
static HEADING_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#+)\s+").expect("invalid regex"));
static INLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*(?P<bold>.+?)\*\*|~~(?P<strike>.+?)~~|\*(?P<italic>[^*]+?)\*").expect("invalid regex")
});
static LEFTOVER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[*~]|#+\s+").expect("invalid regex"));

/// Counts from [`strip_markdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StripReport {
    /// `**`-style emphasis sequences removed.
    pub emphasis_marks: usize,
    /// `# ` heading markers removed.
    pub heading_marks: usize,
}

/// Counts from [`apply_markdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkdownReport {
    pub headings: usize,
    pub bold: usize,
    pub italic: usize,
    pub strikethrough: usize,
    /// Stray `*`, `~` and `# ` removed after formatting.
    pub cleaned_marks: usize,
}

/// Remove `**` emphasis and `# ` heading markers from every paragraph,
/// table cells included.
pub fn strip_markdown(doc: &mut DocxDocument) -> Result<StripReport> {
    let mut report = StripReport::default();
    doc.for_each_paragraph_mut(&mut |p| {
        report.emphasis_marks += paragraph::remove_matches(p, &EMPHASIS_MARKS);
        report.heading_marks += paragraph::remove_matches(p, &HEADING_MARK);
    })?;
    info!(
        emphasis = report.emphasis_marks,
        headings = report.heading_marks,
        "stripped markdown markers"
    );
    Ok(report)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct InlineStyle {
    bold: bool,
    italic: bool,
    strike: bool,
}

/// Split text into runs of plain and `**bold**` / `*italic*` / `~~strike~~` text.
fn parse_inline(text: &str) -> Vec<(String, InlineStyle)> {
    let mut segments = Vec::new();
    let mut last = 0;
    for caps in INLINE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            segments.push((text[last..whole.start()].to_string(), InlineStyle::default()));
        }
        let (inner, style) = if let Some(m) = caps.name("bold") {
            (m.as_str(), InlineStyle { bold: true, ..Default::default() })
        } else if let Some(m) = caps.name("strike") {
            (m.as_str(), InlineStyle { strike: true, ..Default::default() })
        } else if let Some(m) = caps.name("italic") {
            (m.as_str(), InlineStyle { italic: true, ..Default::default() })
        } else {
            continue;
        };
        segments.push((inner.to_string(), style));
        last = whole.end();
    }
    if last < text.len() {
        segments.push((text[last..].to_string(), InlineStyle::default()));
    }
    segments
}

/// Paragraphs made only of plain runs can be rebuilt without losing content.
fn is_rebuildable(p: &Element) -> bool {
    !paragraph::has_content_objects(p)
        && p.elements().all(|e| matches!(e.name.as_str(), "w:pPr" | "w:r" | "w:proofErr"))
}

fn apply_inline(p: &mut Element, report: &mut MarkdownReport) {
    if !is_rebuildable(p) {
        return;
    }
    let text = paragraph::text_of(p);
    let segments = parse_inline(&text);
    if segments.iter().all(|(_, style)| *style == InlineStyle::default()) {
        return;
    }

    let base = first_run_props(p);
    paragraph::clear_paragraph(p);
    for (content, style) in segments {
        report.bold += usize::from(style.bold);
        report.italic += usize::from(style.italic);
        report.strikethrough += usize::from(style.strike);
        let mut rpr = base.clone().unwrap_or_else(|| Element::new("w:rPr"));
        if style.bold {
            set_toggle(&mut rpr, "w:b", true);
        }
        if style.italic {
            set_toggle(&mut rpr, "w:i", true);
        }
        if style.strike {
            set_toggle(&mut rpr, "w:strike", true);
        }
        p.push(new_run(&content, Some(rpr)));
    }
}

/// Turn Markdown markup into Word formatting.
///
/// Paragraphs starting with `#`+space, table cells included, become `Heading N` (N capped at 9);
/// inline markup becomes bold, italic or struck-through runs; any leftover
/// `*`, `~` and `# ` markers are removed.
pub fn apply_markdown(doc: &mut DocxDocument) -> Result<MarkdownReport> {
    let mut report = MarkdownReport::default();

    let levels: Vec<u8> = paragraph::paragraphs(doc.body()?)
        .into_iter()
        .filter_map(|p| {
            let text = paragraph::text_of(p);
            HEADING_PREFIX
                .captures(&text)
                .map(|c| c[1].len().min(9) as u8)
        })
        .collect();
    let mut heading_ids: HashMap<u8, String> = HashMap::new();
    if !levels.is_empty() {
        let styles = doc.styles_mut()?;
        for level in levels {
            heading_ids
                .entry(level)
                .or_insert_with(|| styles.ensure_heading_style(level));
        }
    }

    let body = doc.body_mut()?;
    paragraph::for_each_paragraph_mut(body, &mut |p| {
        let text = paragraph::text_of(p);
        let Some(caps) = HEADING_PREFIX.captures(&text) else {
            return;
        };
        let level = caps[1].len().min(9) as u8;
        let stripped = text[caps[0].len()..].to_string();
        if let Some(id) = heading_ids.get(&level) {
            set_paragraph_text(p, &stripped);
            set_paragraph_style(p, id);
            report.headings += 1;
            debug!(level, text = %stripped, "heading");
        }
    });

    paragraph::for_each_paragraph_mut(body, &mut |p| {
        if paragraph::paragraph_style(p).is_some_and(|s| heading_ids.values().any(|id| id == s)) {
            return;
        }
        apply_inline(p, &mut report);
    });
    paragraph::for_each_paragraph_mut(body, &mut |p| {
        report.cleaned_marks += paragraph::remove_matches(p, &LEFTOVER);
    });

    info!(
        headings = report.headings,
        bold = report.bold,
        italic = report.italic,
        strikethrough = report.strikethrough,
        cleaned = report.cleaned_marks,
        "applied markdown formatting"
    );
    Ok(report)
}
