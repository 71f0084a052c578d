//! Style sheet (`word/styles.xml`): reading paragraph styles into
//! [`StyleDefinition`] records and creating or updating styles from them.

use super::props::{self, PPR_ORDER, STYLE_ORDER};
use super::DocxDocument;
use crate::error::Result;
use crate::model::{FontSpec, ParagraphFormat, StyleDefinition, StyleSet};
use crate::xml::{Element, XmlDocument};
use tracing::{debug, info};

pub const WORDML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Heading level for built-in names like `Heading 2` or `heading 2`.
pub fn heading_level_of(name: &str) -> Option<u8> {
    let lower = name.to_ascii_lowercase();
    let level = lower.strip_prefix("heading ")?.trim().parse::<u8>().ok()?;
    (1..=9).contains(&level).then_some(level)
}

/// Parsed `word/styles.xml`.
#[derive(Debug, Clone)]
pub struct StyleSheet {
    doc: XmlDocument,
}

impl StyleSheet {
    pub fn parse(xml: &str) -> Result<Self> {
        Ok(Self {
            doc: XmlDocument::parse(xml)?,
        })
    }

    /// A style sheet with only the `Normal` paragraph style.
    pub fn blank() -> Self {
        let normal = Element::new("w:style")
            .with_attr("w:type", "paragraph")
            .with_attr("w:default", "1")
            .with_attr("w:styleId", "Normal")
            .with_child(Element::new("w:name").with_attr("w:val", "Normal"))
            .with_child(Element::new("w:qFormat"));
        Self {
            doc: XmlDocument::new(
                Element::new("w:styles")
                    .with_attr("xmlns:w", WORDML_NS)
                    .with_child(normal),
            ),
        }
    }

    pub fn document(&self) -> &XmlDocument {
        &self.doc
    }

    fn styles(&self) -> impl Iterator<Item = &Element> {
        self.doc.root.children_named("w:style")
    }

    fn name_of(style: &Element) -> Option<&str> {
        style.child("w:name").and_then(|n| n.attr("w:val"))
    }

    /// Find a style by display name; exact match first, then case-insensitive.
    pub fn find_by_name(&self, name: &str) -> Option<&Element> {
        self.styles()
            .find(|s| Self::name_of(s) == Some(name))
            .or_else(|| {
                self.styles().find(|s| {
                    Self::name_of(s).is_some_and(|n| n.eq_ignore_ascii_case(name))
                })
            })
    }

    pub fn style_id_by_name(&self, name: &str) -> Option<String> {
        self.find_by_name(name)
            .and_then(|s| s.attr("w:styleId"))
            .map(String::from)
    }

    pub fn has_style_id(&self, id: &str) -> bool {
        self.styles().any(|s| s.attr("w:styleId") == Some(id))
    }

    fn display_name(&self, id: &str) -> Option<String> {
        self.styles()
            .find(|s| s.attr("w:styleId") == Some(id))
            .and_then(Self::name_of)
            .map(String::from)
    }

    /// Id of the default paragraph style, if the sheet declares one.
    pub fn default_paragraph_style(&self) -> Option<String> {
        self.styles()
            .find(|s| s.attr("w:type") == Some("paragraph") && s.attr("w:default") == Some("1"))
            .and_then(|s| s.attr("w:styleId"))
            .map(String::from)
    }

    /// Every paragraph style, keyed by display name.
    pub fn paragraph_styles(&self) -> StyleSet {
        let mut set = StyleSet::new();
        for style in self.styles().filter(|s| s.attr("w:type") == Some("paragraph")) {
            let id = style.attr("w:styleId").unwrap_or_default().to_string();
            let name = Self::name_of(style).map(String::from).unwrap_or_else(|| id.clone());
            let base_style = style
                .child("w:basedOn")
                .and_then(|b| b.attr("w:val"))
                .map(|base| self.display_name(base).unwrap_or_else(|| base.to_string()));
            set.insert(
                name.clone(),
                StyleDefinition {
                    style_id: id,
                    style_type: "paragraph".to_string(),
                    font: style.child("w:rPr").map(props::read_font).unwrap_or_default(),
                    paragraph_format: style
                        .child("w:pPr")
                        .map(props::read_paragraph_format)
                        .unwrap_or_default(),
                    base_style,
                    heading_level: heading_level_of(&name),
                },
            );
        }
        set
    }

    fn unused_id(&self, name: &str) -> String {
        let base: String = name.chars().filter(|c| !c.is_whitespace()).collect();
        let base = if base.is_empty() { "Style".to_string() } else { base };
        if !self.has_style_id(&base) {
            return base;
        }
        (1..)
            .map(|n| format!("{}{}", base, n))
            .find(|id| !self.has_style_id(id))
            .unwrap_or(base)
    }

    fn style_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.doc
            .root
            .elements_mut()
            .find(|s| s.is("w:style") && s.attr("w:styleId") == Some(id))
    }

    /// Append an empty custom paragraph style and return its id.
    fn create_paragraph_style(&mut self, name: &str, id_hint: &str) -> String {
        let id = self.unused_id(id_hint);
        let mut style = Element::new("w:style")
            .with_attr("w:type", "paragraph")
            .with_attr("w:customStyle", "1")
            .with_attr("w:styleId", id.as_str())
            .with_child(Element::new("w:name").with_attr("w:val", name));
        if let Some(base) = self.default_paragraph_style() {
            style.push(Element::new("w:basedOn").with_attr("w:val", base));
        }
        style.push(Element::new("w:qFormat"));
        self.doc.root.push(style);
        debug!(style = name, id = %id, "created paragraph style");
        id
    }

    /// Write font and paragraph settings into the style with `id`.
    pub fn update_style(&mut self, id: &str, font: &FontSpec, format: &ParagraphFormat) {
        if let Some(style) = self.style_mut(id) {
            if *format != ParagraphFormat::default() {
                let ppr = style.ensure_child_ordered("w:pPr", STYLE_ORDER);
                props::apply_paragraph_format(ppr, format);
            }
            if *font != FontSpec::default() {
                let rpr = style.ensure_child_ordered("w:rPr", STYLE_ORDER);
                props::apply_font(rpr, font);
            }
        }
    }

    /// Create the named paragraph style when missing and apply `definition`.
    ///
    /// Returns the style id and whether the style was created.
    pub fn upsert_paragraph_style(&mut self, name: &str, definition: &StyleDefinition) -> (String, bool) {
        let (id, created) = match self.style_id_by_name(name) {
            Some(id) => (id, false),
            None => (self.create_paragraph_style(name, name), true),
        };
        self.update_style(&id, &definition.font, &definition.paragraph_format);
        (id, created)
    }

    /// Id of the `Heading N` style, creating a plain one when absent.
    pub fn ensure_heading_style(&mut self, level: u8) -> String {
        let level = level.clamp(1, 9);
        if let Some(id) = self.style_id_by_name(&format!("heading {}", level)) {
            return id;
        }
        let name = format!("heading {}", level);
        let id = self.create_paragraph_style(&name, &format!("Heading{}", level));
        let size = match level {
            1 => 16.0,
            2 => 14.0,
            3 => 13.0,
            _ => 12.0,
        };
        self.update_style(
            &id,
            &FontSpec {
                size: Some(size),
                bold: Some(true),
                ..Default::default()
            },
            &ParagraphFormat {
                space_before: Some(12.0),
                space_after: Some(3.0),
                outline_level: Some(level),
                ..Default::default()
            },
        );
        if let Some(style) = self.style_mut(&id) {
            style.remove_attr("w:customStyle");
            let ppr = style.ensure_child_ordered("w:pPr", STYLE_ORDER);
            ppr.ensure_child_ordered("w:keepNext", PPR_ORDER);
        }
        id
    }
}

/// Outcome of [`apply_styles`].
#[derive(Debug, Clone, Default)]
pub struct ApplyStylesReport {
    pub updated: Vec<String>,
    pub created: Vec<String>,
}

/// Create or update every style in `styles`.
pub fn apply_styles(doc: &mut DocxDocument, styles: &StyleSet) -> Result<ApplyStylesReport> {
    let mut report = ApplyStylesReport::default();
    let sheet = doc.styles_mut()?;
    for (name, definition) in styles {
        let (_, created) = sheet.upsert_paragraph_style(name, definition);
        if created {
            report.created.push(name.clone());
        } else {
            report.updated.push(name.clone());
        }
    }
    info!(
        updated = report.updated.len(),
        created = report.created.len(),
        "applied styles"
    );
    Ok(report)
}

/// Paragraph styles of the document, keyed by name.
pub fn extract_styles(doc: &DocxDocument) -> StyleSet {
    let set = doc.styles().map(StyleSheet::paragraph_styles).unwrap_or_default();
    info!(count = set.len(), "extracted paragraph styles");
    set
}
