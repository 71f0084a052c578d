//! Appending the slides of several presentations to the first one.

use super::shapes::{self, shape_tree};
use super::{PptxPresentation, SlideLayout, SlideRef};
use crate::error::{ensure_exist, Error, Result};
use crate::output::display_name;
use crate::package::{rels_path_for, relative_target, resolve_path, RELS_NS};
use crate::xml::{Element, XmlDocument};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";

/// Relationship kinds that tie a part to its own deck and are not carried over.
const DECK_BOUND: &[&str] = &[
    "slideLayout",
    "slideMaster",
    "notesSlide",
    "notesMaster",
    "handoutMaster",
    "theme",
    "comments",
    "slide",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedFile {
    pub file: String,
    pub slides: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub files: Vec<MergedFile>,
    /// One title slide before each file after the first.
    pub separators: usize,
}

impl MergeReport {
    pub fn total_slides(&self) -> usize {
        self.files.iter().map(|f| f.slides).sum::<usize>() + self.separators
    }
}

/// Open every file and merge them into the first; all paths are checked first.
pub fn merge_presentations<P: AsRef<Path>>(paths: &[P]) -> Result<(PptxPresentation, MergeReport)> {
    ensure_exist(paths)?;
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        sources.push((display_name(path), PptxPresentation::open(path)?));
    }
    merge_opened(sources)
}

/// Use the first presentation as the base and append the others, each
/// preceded by a separator slide naming the file.
///
/// Slides are copied with the parts they depend on (images, media, charts
/// and embeddings) and bound to the base layout with the same name, else the
/// same type, else the first base layout. Notes and comments are left behind.
pub fn merge_opened(
    sources: Vec<(String, PptxPresentation)>,
) -> Result<(PptxPresentation, MergeReport)> {
    let mut sources = sources.into_iter();
    let (first_name, mut base) = sources
        .next()
        .ok_or_else(|| Error::InvalidData("no presentations to merge".to_string()))?;
    let layouts = base.layouts()?;
    if layouts.is_empty() {
        return Err(Error::MissingComponent("slide layout".to_string()));
    }

    let mut report = MergeReport::default();
    info!(file = %first_name, slides = base.slide_count(), "base presentation");
    report.files.push(MergedFile {
        file: first_name,
        slides: base.slide_count(),
    });

    for (name, source) in sources {
        info!(file = %name, slides = source.slide_count(), "merging presentation");
        add_separator(&mut base, &layouts, &name, source.slide_count())?;
        report.separators += 1;

        let mut copier = SlideCopier::new(&source, &layouts);
        let targets = reserve_slide_parts(&base, source.slide_count());
        copier.slide_parts = source
            .slides()
            .iter()
            .map(|s| s.part.clone())
            .zip(targets.iter().cloned())
            .collect();
        for (slide, target) in source.slides().iter().zip(&targets) {
            copier.copy_slide(&mut base, slide, target)?;
        }
        report.files.push(MergedFile {
            file: name,
            slides: source.slide_count(),
        });
    }

    info!(
        files = report.files.len(),
        slides = report.total_slides(),
        "merged presentations"
    );
    Ok((base, report))
}

/// `count` unused slide part names.
fn reserve_slide_parts(deck: &PptxPresentation, count: usize) -> Vec<String> {
    (1..)
        .map(|n| format!("ppt/slides/slide{}.xml", n))
        .filter(|name| !deck.package().exists(name))
        .take(count)
        .collect()
}

fn placeholder_shape(id: u32, name: &str, placeholder: Element, text: &str) -> Element {
    let run = Element::new("a:r")
        .with_child(Element::new("a:rPr").with_attr("lang", "zh-CN"))
        .with_child(Element::new("a:t").with_text(text));
    Element::new("p:sp")
        .with_child(
            Element::new("p:nvSpPr")
                .with_child(
                    Element::new("p:cNvPr")
                        .with_attr("id", id.to_string())
                        .with_attr("name", name),
                )
                .with_child(
                    Element::new("p:cNvSpPr")
                        .with_child(Element::new("a:spLocks").with_attr("noGrp", "1")),
                )
                .with_child(Element::new("p:nvPr").with_child(placeholder)),
        )
        .with_child(Element::new("p:spPr"))
        .with_child(
            Element::new("p:txBody")
                .with_child(Element::new("a:bodyPr"))
                .with_child(Element::new("a:lstStyle"))
                .with_child(Element::new("a:p").with_child(run)),
        )
}

/// Title slide announcing the next file.
fn add_separator(
    deck: &mut PptxPresentation,
    layouts: &[SlideLayout],
    file: &str,
    slides: usize,
) -> Result<()> {
    let layout = layouts
        .iter()
        .find(|l| l.kind.as_deref() == Some("title"))
        .or_else(|| layouts.first())
        .ok_or_else(|| Error::MissingComponent("slide layout".to_string()))?;
    let layout_doc = deck.package().parse_xml_part(&layout.part)?;
    let mut layout_placeholders = Vec::new();
    if let Some(tree) = shape_tree(&layout_doc.root) {
        shapes::walk(tree, &mut |s| layout_placeholders.extend(shapes::placeholder(s)));
    }
    let title_type = if layout_placeholders
        .iter()
        .any(|ph| ph.attr("type") == Some("ctrTitle"))
    {
        "ctrTitle"
    } else {
        "title"
    };
    let subtitle = match layout_placeholders
        .iter()
        .find(|ph| ph.attr("type") == Some("subTitle"))
    {
        Some(ph) => Element::new("p:ph")
            .with_attr("type", "subTitle")
            .with_attr("idx", ph.attr("idx").unwrap_or("1")),
        None => Element::new("p:ph").with_attr("idx", "1"),
    };

    let tree = Element::new("p:spTree")
        .with_child(
            Element::new("p:nvGrpSpPr")
                .with_child(Element::new("p:cNvPr").with_attr("id", "1").with_attr("name", ""))
                .with_child(Element::new("p:cNvGrpSpPr"))
                .with_child(Element::new("p:nvPr")),
        )
        .with_child(Element::new("p:grpSpPr"))
        .with_child(placeholder_shape(
            2,
            "Title 1",
            Element::new("p:ph").with_attr("type", title_type),
            &format!("文件: {}", file),
        ))
        .with_child(placeholder_shape(
            3,
            "Subtitle 2",
            subtitle,
            &format!("包含 {} 张幻灯片", slides),
        ));
    let slide = Element::new("p:sld")
        .with_attr("xmlns:a", NS_A)
        .with_attr("xmlns:r", NS_R)
        .with_attr("xmlns:p", NS_P)
        .with_child(Element::new("p:cSld").with_child(tree))
        .with_child(
            Element::new("p:clrMapOvr").with_child(Element::new("a:masterClrMapping")),
        );

    let part = deck.next_slide_part();
    let target = relative_target(&part, &layout.part);
    let rels = Element::new("Relationships")
        .with_attr("xmlns", RELS_NS)
        .with_child(relationship("rId1", super::SLIDE_LAYOUT_REL_TYPE, &target, false));
    deck.package_mut()
        .write_xml_part(&rels_path_for(&part), &XmlDocument::new(rels))?;
    deck.append_slide(&part, &XmlDocument::new(slide))?;
    debug!(part = %part, file = %file, "added separator slide");
    Ok(())
}

fn relationship(id: &str, kind: &str, target: &str, external: bool) -> Element {
    let rel = Element::new("Relationship")
        .with_attr("Id", id)
        .with_attr("Type", kind)
        .with_attr("Target", target);
    if external {
        rel.with_attr("TargetMode", "External")
    } else {
        rel
    }
}

/// `dir/image3.png` → (`dir`, `image`, `png`).
fn split_part_name(part: &str) -> (&str, &str, &str) {
    let (dir, file) = part.rsplit_once('/').unwrap_or(("", part));
    let (stem, ext) = file.rsplit_once('.').unwrap_or((file, "bin"));
    let stem = stem.trim_end_matches(|c: char| c.is_ascii_digit());
    (dir, if stem.is_empty() { "part" } else { stem }, ext)
}

/// Copies slides of one source deck, sharing parts between its slides.
struct SlideCopier<'a> {
    source: &'a PptxPresentation,
    layouts: &'a [SlideLayout],
    /// Source slide part → its copy.
    slide_parts: HashMap<String, String>,
    /// Source part → its copy in the base.
    copied: HashMap<String, String>,
    mapped_layouts: HashMap<String, String>,
}

impl<'a> SlideCopier<'a> {
    fn new(source: &'a PptxPresentation, layouts: &'a [SlideLayout]) -> Self {
        Self {
            source,
            layouts,
            slide_parts: HashMap::new(),
            copied: HashMap::new(),
            mapped_layouts: HashMap::new(),
        }
    }

    /// Base layout for a source layout: same name, else same type, else first.
    fn map_layout(&mut self, source_layout: &str) -> Result<String> {
        if let Some(done) = self.mapped_layouts.get(source_layout) {
            return Ok(done.clone());
        }
        let wanted = self.source.read_layout(source_layout)?;
        let layout = self
            .layouts
            .iter()
            .find(|l| !wanted.name.is_empty() && l.name == wanted.name)
            .or_else(|| {
                self.layouts
                    .iter()
                    .find(|l| wanted.kind.is_some() && l.kind == wanted.kind)
            })
            .unwrap_or(&self.layouts[0]);
        debug!(source = %wanted.name, target = %layout.name, "mapped layout");
        self.mapped_layouts
            .insert(source_layout.to_string(), layout.part.clone());
        Ok(layout.part.clone())
    }

    fn copy_slide(&mut self, base: &mut PptxPresentation, slide: &SlideRef, part: &str) -> Result<()> {
        let mut doc = self.source.package().parse_xml_part(&slide.part)?;
        let rels = self.source.package().read_relationships(&slide.part)?;

        let mut new_rels = Element::new("Relationships").with_attr("xmlns", RELS_NS);
        let mut dropped = HashSet::new();
        for rel in &rels.ordered {
            let target = if rel.external {
                rel.target.clone()
            } else {
                let resolved = resolve_path(&slide.part, &rel.target);
                if rel.is_kind("slideLayout") {
                    relative_target(part, &self.map_layout(&resolved)?)
                } else if rel.is_kind("slide") {
                    match self.slide_parts.get(&resolved) {
                        Some(copy) => relative_target(part, copy),
                        None => {
                            dropped.insert(rel.id.clone());
                            continue;
                        }
                    }
                } else if DECK_BOUND.iter().any(|kind| rel.is_kind(kind)) {
                    debug!(kind = %rel.rel_type, "left slide relationship behind");
                    dropped.insert(rel.id.clone());
                    continue;
                } else if !self.source.package().exists(&resolved) {
                    debug!(part = %resolved, "relationship target missing");
                    dropped.insert(rel.id.clone());
                    continue;
                } else {
                    relative_target(part, &self.copy_part(base, &resolved)?)
                }
            };
            new_rels.push(relationship(&rel.id, &rel.rel_type, &target, rel.external));
        }

        if !dropped.is_empty() {
            doc.root.remove_descendants(&|e| {
                (e.is("a:hlinkClick") || e.is("a:hlinkHover"))
                    && e.attr("r:id").is_some_and(|id| dropped.contains(id))
            });
        }
        base.package_mut()
            .write_xml_part(&rels_path_for(part), &XmlDocument::new(new_rels))?;
        base.append_slide(part, &doc)?;
        debug!(source = %slide.part, target = %part, "copied slide");
        Ok(())
    }

    /// Copy a part and, recursively, the parts it relates to.
    fn copy_part(&mut self, base: &mut PptxPresentation, source_part: &str) -> Result<String> {
        if let Some(done) = self.copied.get(source_part) {
            return Ok(done.clone());
        }
        let (dir, stem, ext) = split_part_name(source_part);
        let target = base.package().next_part_name(dir, stem, ext);
        self.copied
            .insert(source_part.to_string(), target.clone());

        let data = self.source.package().read_binary(source_part)?;
        base.package_mut().set_part(&target, data);
        if let Some(content_type) = self.source.package().content_type_of(source_part)? {
            if ext.eq_ignore_ascii_case("xml") {
                base.package_mut().add_override(&target, &content_type)?;
            } else {
                base.package_mut().ensure_default(ext, &content_type)?;
            }
        }

        let rels = self.source.package().read_relationships(source_part)?;
        if !rels.is_empty() {
            let mut new_rels = Element::new("Relationships").with_attr("xmlns", RELS_NS);
            for rel in &rels.ordered {
                let resolved = resolve_path(source_part, &rel.target);
                let copied_target = if rel.external {
                    rel.target.clone()
                } else if DECK_BOUND.iter().any(|kind| rel.is_kind(kind))
                    || !self.source.package().exists(&resolved)
                {
                    continue;
                } else {
                    relative_target(&target, &self.copy_part(base, &resolved)?)
                };
                new_rels.push(relationship(
                    &rel.id,
                    &rel.rel_type,
                    &copied_target,
                    rel.external,
                ));
            }
            base.package_mut()
                .write_xml_part(&rels_path_for(&target), &XmlDocument::new(new_rels))?;
        }
        debug!(source = %source_part, target = %target, "copied part");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pptx::test_support::*;
    use crate::pptx::{extract_text, SLIDE_CONTENT_TYPE};

    const TITLE_LAYOUT: &str = "ppt/slideLayouts/slideLayout1.xml";
    const CONTENT_LAYOUT: &str = "ppt/slideLayouts/slideLayout2.xml";
    const BLANK_LAYOUT: &str = "ppt/slideLayouts/slideLayout3.xml";

    fn deck(titles: &[&str]) -> PptxPresentation {
        let mut deck = PptxPresentation::blank().unwrap();
        for title in titles {
            add_slide(
                &mut deck,
                CONTENT_LAYOUT,
                &text_shape(2, "type=\"title\"", &[title]),
            );
        }
        deck
    }

    fn layout_of(deck: &PptxPresentation, index: usize) -> String {
        deck.layout_of(&deck.slides()[index].part).unwrap().unwrap()
    }

    #[test]
    fn test_merge_appends_with_separators() {
        let sources = vec![
            ("一.pptx".to_string(), deck(&["甲"])),
            ("二.pptx".to_string(), deck(&["乙", "丙"])),
            ("三.pptx".to_string(), deck(&[])),
        ];
        let (mut merged, report) = merge_opened(sources).unwrap();
        assert_eq!(report.separators, 2);
        assert_eq!(report.files[1].slides, 2);
        assert_eq!(report.total_slides(), 5);
        assert_eq!(merged.slide_count(), 5);

        let merged = PptxPresentation::from_bytes(merged.to_bytes().unwrap()).unwrap();
        let titles: Vec<Option<String>> = extract_text(&merged)
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(
            titles,
            vec![
                Some("甲".to_string()),
                Some("文件: 二.pptx".to_string()),
                Some("乙".to_string()),
                Some("丙".to_string()),
                Some("文件: 三.pptx".to_string()),
            ]
        );
        let separator = extract_text(&merged).unwrap().remove(1);
        assert_eq!(separator.shapes[1], "包含 2 张幻灯片 \n");
        assert_eq!(layout_of(&merged, 1), TITLE_LAYOUT);
        assert_eq!(layout_of(&merged, 2), CONTENT_LAYOUT);
        assert_eq!(
            merged
                .package()
                .content_type_of(&merged.slides()[4].part)
                .unwrap()
                .as_deref(),
            Some(SLIDE_CONTENT_TYPE)
        );
    }

    #[test]
    fn test_images_copied_once_per_source() {
        let mut source = PptxPresentation::blank().unwrap();
        let shapes = format!("{}{}", picture(2, "rId2"), picture(3, "rId2"));
        let first = add_slide(&mut source, BLANK_LAYOUT, &shapes);
        let second = add_slide(&mut source, BLANK_LAYOUT, &picture(2, "rId2"));
        let package = source.package_mut();
        package.set_part("ppt/media/image1.png", png(2, 2));
        for part in [&first, &second] {
            write_rels(
                package,
                part,
                &[
                    ("rId1", LAYOUT_REL, "../slideLayouts/slideLayout3.xml"),
                    ("rId2", IMAGE_REL, "../media/image1.png"),
                ],
            );
        }

        let mut base = deck(&["封面"]);
        base.package_mut()
            .set_part("ppt/media/image1.png", png(1, 1));
        let (merged, _) =
            merge_opened(vec![("a.pptx".into(), base), ("b.pptx".into(), source)]).unwrap();

        let media = merged.package().list_files_with_prefix("ppt/media/");
        assert_eq!(media, vec!["ppt/media/image1.png", "ppt/media/image2.png"]);
        for slide in &merged.slides()[2..] {
            let rels = merged.package().read_relationships(&slide.part).unwrap();
            let image = rels.get("rId2").unwrap();
            assert_eq!(resolve_path(&slide.part, &image.target), "ppt/media/image2.png");
            assert_eq!(
                resolve_path(&slide.part, &rels.get("rId1").unwrap().target),
                BLANK_LAYOUT
            );
        }
    }

    #[test]
    fn test_layout_fallbacks() {
        let mut source = PptxPresentation::blank().unwrap();
        add_slide(&mut source, BLANK_LAYOUT, "");
        add_slide(&mut source, CONTENT_LAYOUT, "");
        // rename the source layouts so only the type matches, then neither
        let package = source.package_mut();
        for (part, name, kind) in [
            (BLANK_LAYOUT, "自定义空白", "blank"),
            (CONTENT_LAYOUT, "自定义", "cust"),
        ] {
            let mut doc = package.parse_xml_part(part).unwrap();
            doc.root.set_attr("type", kind);
            doc.root.child_mut("p:cSld").unwrap().set_attr("name", name);
            package.write_xml_part(part, &doc).unwrap();
        }

        let (merged, _) =
            merge_opened(vec![("a.pptx".into(), deck(&[])), ("b.pptx".into(), source)]).unwrap();
        assert_eq!(layout_of(&merged, 1), BLANK_LAYOUT);
        assert_eq!(layout_of(&merged, 2), TITLE_LAYOUT);
    }

    #[test]
    fn test_notes_left_behind() {
        let mut source = PptxPresentation::blank().unwrap();
        let slide = add_slide(&mut source, CONTENT_LAYOUT, "");
        source
            .package_mut()
            .set_part("ppt/notesSlides/notesSlide1.xml", b"<p:notes/>".to_vec());
        write_rels(
            source.package_mut(),
            &slide,
            &[
                ("rId1", LAYOUT_REL, "../slideLayouts/slideLayout2.xml"),
                (
                    "rId2",
                    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide",
                    "../notesSlides/notesSlide1.xml",
                ),
            ],
        );
        let (merged, _) =
            merge_opened(vec![("a.pptx".into(), deck(&[])), ("b.pptx".into(), source)]).unwrap();
        let copy = &merged.slides()[1].part;
        let rels = merged.package().read_relationships(copy).unwrap();
        assert_eq!(rels.len(), 1);
        assert!(merged
            .package()
            .list_files_with_prefix("ppt/notesSlides/")
            .is_empty());
    }

    #[test]
    fn test_missing_input_and_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("缺失.pptx");
        assert!(matches!(
            merge_presentations(&[&missing]),
            Err(Error::FileNotFound(_))
        ));
        assert!(matches!(merge_opened(Vec::new()), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_separator_without_layouts() {
        let mut deck = PptxPresentation::blank().unwrap();
        assert!(matches!(
            add_separator(&mut deck, &[], "附录.pptx", 1),
            Err(Error::MissingComponent(_))
        ));
        assert_eq!(deck.slide_count(), 0);
    }
}
