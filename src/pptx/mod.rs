//! PowerPoint presentations (.pptx).
//!
//! [`PptxPresentation`] holds the package with `presentation.xml` parsed and
//! the slide list resolved in display order. Slides, layouts and masters are
//! read from the package on demand.

mod images;
mod merge;
pub mod shapes;
mod template;
mod text;

pub use images::{extract_images, SlideImages};
pub use merge::{merge_opened, merge_presentations, MergeReport, MergedFile};
pub use text::{extract_text, render_text, SlideText};

use crate::error::{Error, Result};
use crate::package::{relative_target, resolve_path, OoxmlPackage};
use crate::xml::{Element, XmlDocument};
use std::path::Path;
use tracing::debug;

pub const SLIDE_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
pub const SLIDE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
pub const SLIDE_LAYOUT_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";

/// Child order of `p:presentation` up to the slide size.
const PRESENTATION_ORDER: &[&str] = &[
    "p:sldMasterIdLst",
    "p:notesMasterIdLst",
    "p:handoutMasterIdLst",
    "p:sldIdLst",
    "p:sldSz",
    "p:notesSz",
];

/// First id PowerPoint hands out in `p:sldIdLst`.
const FIRST_SLIDE_ID: u32 = 256;

/// A slide entry of `p:sldIdLst`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideRef {
    pub id: u32,
    pub rel_id: String,
    pub part: String,
}

/// A slide layout offered by one of the masters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideLayout {
    pub part: String,
    /// `p:cSld/@name`, e.g. `Title Slide`.
    pub name: String,
    /// `p:sldLayout/@type`, e.g. `title`, `obj`, `blank`.
    pub kind: Option<String>,
}

/// A PowerPoint package with its presentation part parsed.
#[derive(Debug, Clone)]
pub struct PptxPresentation {
    package: OoxmlPackage,
    presentation_part: String,
    presentation: XmlDocument,
    slides: Vec<SlideRef>,
}

impl PptxPresentation {
    /// Open a .pptx file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use redoc::pptx::{extract_text, render_text, PptxPresentation};
    ///
    /// let deck = PptxPresentation::open("talk.pptx")?;
    /// let slides = extract_text(&deck)?;
    /// std::fs::write("talk_文本提取.txt", render_text(&slides))?;
    /// # Ok::<(), redoc::Error>(())
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_package(OoxmlPackage::open(path)?)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_package(OoxmlPackage::from_bytes(data)?)
    }

    pub fn from_package(package: OoxmlPackage) -> Result<Self> {
        let presentation_part = package
            .read_relationships("")?
            .of_kind("officeDocument")
            .next()
            .map(|r| resolve_path("", &r.target))
            .unwrap_or_else(|| "ppt/presentation.xml".to_string());
        let presentation = package.parse_xml_part(&presentation_part)?;
        let rels = package.read_relationships(&presentation_part)?;

        let mut slides = Vec::new();
        if let Some(list) = presentation.root.child("p:sldIdLst") {
            for entry in list.children_named("p:sldId") {
                let id = entry.attr("id").and_then(|v| v.parse().ok()).unwrap_or(0);
                let Some(rel) = entry.attr("r:id").and_then(|rid| rels.get(rid)) else {
                    debug!(id, "slide entry without relationship");
                    continue;
                };
                let part = resolve_path(&presentation_part, &rel.target);
                if !package.exists(&part) {
                    debug!(part = %part, "slide part missing");
                    continue;
                }
                slides.push(SlideRef {
                    id,
                    rel_id: rel.id.clone(),
                    part,
                });
            }
        }

        Ok(Self {
            package,
            presentation_part,
            presentation,
            slides,
        })
    }

    /// A deck without slides built from the bundled template.
    pub fn blank() -> Result<Self> {
        Self::from_package(template::blank_package()?)
    }

    pub fn package(&self) -> &OoxmlPackage {
        &self.package
    }

    pub fn package_mut(&mut self) -> &mut OoxmlPackage {
        &mut self.package
    }

    pub fn presentation_part(&self) -> &str {
        &self.presentation_part
    }

    /// Slides in display order.
    pub fn slides(&self) -> &[SlideRef] {
        &self.slides
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub fn slide_document(&self, index: usize) -> Result<XmlDocument> {
        let slide = self.slides.get(index).ok_or_else(|| {
            Error::InvalidData(format!(
                "slide {} out of range ({} slides)",
                index + 1,
                self.slides.len()
            ))
        })?;
        self.package.parse_xml_part(&slide.part)
    }

    /// Layout part a slide is based on.
    pub fn layout_of(&self, slide_part: &str) -> Result<Option<String>> {
        self.related_part(slide_part, "slideLayout")
    }

    /// Master part a layout belongs to.
    pub fn master_of(&self, layout_part: &str) -> Result<Option<String>> {
        self.related_part(layout_part, "slideMaster")
    }

    fn related_part(&self, part: &str, kind: &str) -> Result<Option<String>> {
        Ok(self
            .package
            .read_relationships(part)?
            .of_kind(kind)
            .find(|r| !r.external)
            .map(|r| resolve_path(part, &r.target)))
    }

    /// Masters listed in `p:sldMasterIdLst`, in order.
    pub fn masters(&self) -> Result<Vec<String>> {
        let rels = self.package.read_relationships(&self.presentation_part)?;
        Ok(self
            .presentation
            .root
            .child("p:sldMasterIdLst")
            .into_iter()
            .flat_map(|list| list.children_named("p:sldMasterId"))
            .filter_map(|e| e.attr("r:id").and_then(|rid| rels.get(rid)))
            .map(|rel| resolve_path(&self.presentation_part, &rel.target))
            .collect())
    }

    /// Layouts of every master, in master then `p:sldLayoutIdLst` order.
    pub fn layouts(&self) -> Result<Vec<SlideLayout>> {
        let mut layouts = Vec::new();
        for master in self.masters()? {
            if !self.package.exists(&master) {
                continue;
            }
            let doc = self.package.parse_xml_part(&master)?;
            let rels = self.package.read_relationships(&master)?;
            let parts = doc
                .root
                .child("p:sldLayoutIdLst")
                .into_iter()
                .flat_map(|list| list.children_named("p:sldLayoutId"))
                .filter_map(|e| e.attr("r:id").and_then(|rid| rels.get(rid)))
                .map(|rel| resolve_path(&master, &rel.target));
            for part in parts {
                if self.package.exists(&part) {
                    layouts.push(self.read_layout(&part)?);
                }
            }
        }
        Ok(layouts)
    }

    pub fn read_layout(&self, part: &str) -> Result<SlideLayout> {
        let doc = self.package.parse_xml_part(part)?;
        Ok(SlideLayout {
            part: part.to_string(),
            name: doc
                .root
                .child("p:cSld")
                .and_then(|c| c.attr("name"))
                .unwrap_or_default()
                .to_string(),
            kind: doc.root.attr("type").map(String::from),
        })
    }

    /// A slide part name not used yet.
    pub(crate) fn next_slide_part(&self) -> String {
        let dir = self
            .slides
            .first()
            .and_then(|s| s.part.rsplit_once('/'))
            .map(|(dir, _)| dir.to_string())
            .unwrap_or_else(|| "ppt/slides".to_string());
        self.package.next_part_name(&dir, "slide", "xml")
    }

    /// Write `doc` as a new slide at the end of the deck.
    pub(crate) fn append_slide(&mut self, part: &str, doc: &XmlDocument) -> Result<()> {
        self.package.write_xml_part(part, doc)?;
        self.package.add_override(part, SLIDE_CONTENT_TYPE)?;
        let target = relative_target(&self.presentation_part, part);
        let rel_id = self
            .package
            .add_relationship(&self.presentation_part, SLIDE_REL_TYPE, &target)?;

        let id = self
            .slides
            .iter()
            .map(|s| s.id + 1)
            .max()
            .unwrap_or(FIRST_SLIDE_ID)
            .max(FIRST_SLIDE_ID);
        let list = self
            .presentation
            .root
            .ensure_child_ordered("p:sldIdLst", PRESENTATION_ORDER);
        list.push(
            Element::new("p:sldId")
                .with_attr("id", id.to_string())
                .with_attr("r:id", rel_id.clone()),
        );
        self.slides.push(SlideRef {
            id,
            rel_id,
            part: part.to_string(),
        });
        debug!(part = %part, id, "appended slide");
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.package
            .write_xml_part(&self.presentation_part, &self.presentation)
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

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub const IMAGE_REL: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

    pub const LAYOUT_REL: &str = SLIDE_LAYOUT_REL_TYPE;

    /// Replace the relationships of `part` with `rels` as (id, type, target).
    pub fn write_rels(package: &mut OoxmlPackage, part: &str, rels: &[(&str, &str, &str)]) {
        let mut root = Element::new("Relationships").with_attr("xmlns", crate::package::RELS_NS);
        for (id, kind, target) in rels {
            root.push(
                Element::new("Relationship")
                    .with_attr("Id", *id)
                    .with_attr("Type", *kind)
                    .with_attr("Target", *target),
            );
        }
        package
            .write_xml_part(&crate::package::rels_path_for(part), &XmlDocument::new(root))
            .unwrap();
    }

    pub const NS: &str =r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

    /// Append a slide on `layout` whose shape tree holds `shapes` markup.
    pub fn add_slide(deck: &mut PptxPresentation, layout: &str, shapes: &str) -> String {
        add_slide_with_background(deck, layout, shapes, "")
    }

    pub fn add_slide_with_background(
        deck: &mut PptxPresentation,
        layout: &str,
        shapes: &str,
        background: &str,
    ) -> String {
        let xml = format!(
            r#"<p:sld {}><p:cSld>{}<p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>{}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
            NS, background, shapes
        );
        let part = deck.next_slide_part();
        let doc = XmlDocument::parse(&xml).unwrap();
        deck.append_slide(&part, &doc).unwrap();
        let target = relative_target(&part, layout);
        deck.package_mut()
            .add_relationship(&part, SLIDE_LAYOUT_REL_TYPE, &target)
            .unwrap();
        part
    }

    pub fn text_shape(id: u32, placeholder: &str, paragraphs: &[&str]) -> String {
        let ph = if placeholder.is_empty() {
            String::new()
        } else {
            format!("<p:ph {}/>", placeholder)
        };
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<a:p><a:r><a:rPr lang=\"zh-CN\"/><a:t>{}</a:t></a:r></a:p>", p))
            .collect();
        format!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="Shape {}"/><p:cNvSpPr/><p:nvPr>{}</p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:lstStyle/>{}</p:txBody></p:sp>"#,
            id, id, ph, body
        )
    }

    pub fn picture(id: u32, rel_id: &str) -> String {
        format!(
            r#"<p:pic><p:nvPicPr><p:cNvPr id="{}" name="Picture {}"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="{}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr/></p:pic>"#,
            id, id, rel_id
        )
    }

    pub fn png(width: u32, height: u32) -> Vec<u8> {
        use image::{ImageFormat, Rgb, RgbImage};
        let mut out = std::io::Cursor::new(Vec::new());
        RgbImage::from_pixel(width, height, Rgb([200, 40, 40]))
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }
}
