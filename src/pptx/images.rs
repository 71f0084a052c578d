//! Pictures and picture backgrounds of every slide.

use super::shapes::{self, shape_tree};
use super::PptxPresentation;
use crate::error::Result;
use crate::model::{ExtractedImage, ImageResource};
use crate::package::resolve_path;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Images written by [`extract_images`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct SlideImages {
    pub pictures: Vec<ExtractedImage>,
    /// Slide and master backgrounds.
    pub backgrounds: Vec<ExtractedImage>,
}

impl SlideImages {
    pub fn total(&self) -> usize {
        self.pictures.len() + self.backgrounds.len()
    }
}

/// Load the image a relationship of `owner` points at.
fn load_image(deck: &PptxPresentation, owner: &str, rel_id: &str) -> Result<Option<ImageResource>> {
    let rels = deck.package().read_relationships(owner)?;
    let Some(rel) = rels.get(rel_id) else {
        warn!(part = %owner, rel = %rel_id, "image relationship missing");
        return Ok(None);
    };
    if rel.external {
        debug!(target = %rel.target, "skipping linked image");
        return Ok(None);
    }
    let part = resolve_path(owner, &rel.target);
    match deck.package().read_binary(&part) {
        Ok(data) => Ok(Some(ImageResource::detect(part, data))),
        Err(e) => {
            warn!(part = %part, error = %e, "image part unreadable");
            Ok(None)
        }
    }
}

/// Save as `<stem>.png`; bytes the codec cannot decode keep their own format.
fn save_image(resource: ImageResource, dir: &Path, stem: &str) -> Result<ExtractedImage> {
    let converted = if resource.is_decodable() {
        match resource.to_png() {
            Ok(png) => Some(png),
            Err(e) => {
                warn!(part = %resource.source, error = %e, "conversion to PNG failed");
                None
            }
        }
    } else {
        None
    };
    let path = match &converted {
        Some(_) => dir.join(format!("{}.png", stem)),
        None => dir.join(format!("{}.{}", stem, resource.extension())),
    };
    std::fs::write(&path, converted.as_deref().unwrap_or(&resource.data))?;
    debug!(path = %path.display(), size = %resource.dimensions_label(), "saved image");
    Ok(ExtractedImage { path, resource })
}

/// Save slide pictures as `slide_NNN_image_NNN.png`, picture backgrounds as
/// `slide_NNN_background.png`, and each master's picture background once as
/// `slide_NNN_master_background.png` for the first slide using that master.
pub fn extract_images(deck: &PptxPresentation, out_dir: &Path) -> Result<SlideImages> {
    std::fs::create_dir_all(out_dir)?;
    let mut report = SlideImages::default();
    let mut seen_masters = HashSet::new();

    for (index, slide) in deck.slides().iter().enumerate() {
        let number = index + 1;
        let doc = deck.slide_document(index)?;

        let mut blips = Vec::new();
        if let Some(tree) = shape_tree(&doc.root) {
            shapes::walk(tree, &mut |shape| blips.extend(shapes::picture_blip(shape)));
        }
        let mut picture = 0;
        for rel_id in blips {
            if let Some(resource) = load_image(deck, &slide.part, rel_id)? {
                picture += 1;
                let stem = format!("slide_{:03}_image_{:03}", number, picture);
                report.pictures.push(save_image(resource, out_dir, &stem)?);
            }
        }

        if let Some(rel_id) = shapes::background_blip(&doc.root) {
            if let Some(resource) = load_image(deck, &slide.part, rel_id)? {
                let stem = format!("slide_{:03}_background", number);
                report.backgrounds.push(save_image(resource, out_dir, &stem)?);
            }
        }

        let master = match deck.layout_of(&slide.part)? {
            Some(layout) => deck.master_of(&layout)?,
            None => None,
        };
        if let Some(master) = master.filter(|m| deck.package().exists(m)) {
            if seen_masters.insert(master.clone()) {
                let master_doc = deck.package().parse_xml_part(&master)?;
                if let Some(rel_id) = shapes::background_blip(&master_doc.root) {
                    if let Some(resource) = load_image(deck, &master, rel_id)? {
                        let stem = format!("slide_{:03}_master_background", number);
                        report.backgrounds.push(save_image(resource, out_dir, &stem)?);
                    }
                }
            }
        }
        debug!(slide = number, pictures = picture, "processed slide");
    }

    info!(
        pictures = report.pictures.len(),
        backgrounds = report.backgrounds.len(),
        dir = %out_dir.display(),
        "extracted images"
    );
    Ok(report)
}
