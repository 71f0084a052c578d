//! Word documents (.docx).
//!
//! [`DocxDocument`] holds the package with its main document part and style
//! sheet parsed; each submodule implements one editing or extraction task.

mod cleanup;
mod comments;
mod images;
mod markdown;
mod merge;
mod outline;
pub mod paragraph;
pub mod props;
mod replace;
mod revisions;
pub mod styles;
mod template;

pub use cleanup::remove_empty_paragraphs;
pub use comments::{extract_comments, remove_comments, RemoveCommentsReport};
pub use images::extract_images;
pub use markdown::{apply_markdown, strip_markdown, MarkdownReport, StripReport};
pub use merge::{merge_documents, MergeReport, MergedFile};
pub use outline::{apply_outline_styles, OutlineReport, OutlineStyleConfig};
pub use replace::{replace_text, ReplaceConfig, ReplaceReport};
pub use revisions::{extract_revisions, remove_revisions, RevisionMode, RevisionRemovalReport};
pub use styles::{apply_styles, extract_styles, ApplyStylesReport, StyleSheet};

use crate::error::{Error, Result};
use crate::package::{resolve_path, OoxmlPackage};
use crate::xml::{Element, XmlDocument};
use std::path::Path;

pub const STYLES_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml";
pub const STYLES_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

/// A Word package with its main document and style sheet parsed.
#[derive(Debug, Clone)]
pub struct DocxDocument {
    package: OoxmlPackage,
    main_part: String,
    document: XmlDocument,
    styles: Option<StyleSheet>,
    styles_part: String,
    styles_dirty: bool,
    styles_created: bool,
}

impl DocxDocument {
    /// Open a .docx file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use redoc::docx::DocxDocument;
    ///
    /// let mut doc = DocxDocument::open("report.docx")?;
    /// let removed = redoc::docx::remove_empty_paragraphs(&mut doc)?;
    /// doc.save("report（已修改）.docx")?;
    /// # Ok::<(), redoc::Error>(())
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_package(OoxmlPackage::open(path)?)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_package(OoxmlPackage::from_bytes(data)?)
    }

    pub fn from_package(package: OoxmlPackage) -> Result<Self> {
        let main_part = package
            .read_relationships("")?
            .of_kind("officeDocument")
            .next()
            .map(|r| resolve_path("", &r.target))
            .unwrap_or_else(|| "word/document.xml".to_string());
        let document = package.parse_xml_part(&main_part)?;

        let styles_part = package
            .read_relationships(&main_part)?
            .of_kind("styles")
            .next()
            .map(|r| resolve_path(&main_part, &r.target))
            .unwrap_or_else(|| "word/styles.xml".to_string());
        let styles = if package.exists(&styles_part) {
            Some(StyleSheet::parse(&package.read_xml(&styles_part)?)?)
        } else {
            None
        };

        Ok(Self {
            package,
            main_part,
            document,
            styles,
            styles_part,
            styles_dirty: false,
            styles_created: false,
        })
    }

    /// An empty document built from the bundled template.
    pub fn blank() -> Result<Self> {
        Self::from_package(template::blank_package()?)
    }

    pub fn package(&self) -> &OoxmlPackage {
        &self.package
    }

    pub fn package_mut(&mut self) -> &mut OoxmlPackage {
        &mut self.package
    }

    pub fn main_part(&self) -> &str {
        &self.main_part
    }

    pub fn root(&self) -> &Element {
        &self.document.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.document.root
    }

    pub fn body(&self) -> Result<&Element> {
        self.document
            .root
            .child("w:body")
            .ok_or_else(|| Error::MissingComponent("w:body".to_string()))
    }

    pub fn body_mut(&mut self) -> Result<&mut Element> {
        self.document
            .root
            .child_mut("w:body")
            .ok_or_else(|| Error::MissingComponent("w:body".to_string()))
    }

    /// Body paragraphs and table-cell paragraphs in document order.
    pub fn paragraphs(&self) -> Result<Vec<&Element>> {
        Ok(paragraph::paragraphs(self.body()?))
    }

    pub fn for_each_paragraph_mut(&mut self, f: &mut dyn FnMut(&mut Element)) -> Result<()> {
        paragraph::for_each_paragraph_mut(self.body_mut()?, f);
        Ok(())
    }

    pub fn styles(&self) -> Option<&StyleSheet> {
        self.styles.as_ref()
    }

    /// The style sheet for editing; a blank one is added when the package has none.
    pub fn styles_mut(&mut self) -> Result<&mut StyleSheet> {
        self.styles_dirty = true;
        if self.styles.is_none() {
            self.styles_created = true;
        }
        Ok(self.styles.get_or_insert_with(StyleSheet::blank))
    }

    fn flush(&mut self) -> Result<()> {
        self.package.write_xml_part(&self.main_part, &self.document)?;
        if self.styles_dirty {
            if let Some(styles) = &self.styles {
                self.package.write_xml_part(&self.styles_part, styles.document())?;
            }
            if self.styles_created {
                let target = crate::package::relative_target(&self.main_part, &self.styles_part);
                self.package
                    .add_relationship(&self.main_part, STYLES_REL_TYPE, &target)?;
                self.package
                    .add_override(&self.styles_part, STYLES_CONTENT_TYPE)?;
                self.styles_created = false;
            }
            self.styles_dirty = false;
        }
        Ok(())
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.flush()?;
        self.package.to_bytes()
    }

    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.flush()?;
        self.package.save(path)
    }
}
