//! Images referenced by the main document.

use super::DocxDocument;
use crate::error::Result;
use crate::model::{save_numbered, ExtractedImage, ImageResource};
use crate::package::resolve_path;
use std::path::Path;
use tracing::{debug, info, warn};

/// Image parts related to the main document, in relationship order.
pub fn document_images(doc: &DocxDocument) -> Result<Vec<ImageResource>> {
    let main = doc.main_part();
    let mut seen = Vec::new();
    let mut images = Vec::new();
    for rel in doc.package().read_relationships(main)?.of_kind("image") {
        if rel.external {
            debug!(target = %rel.target, "skipping linked image");
            continue;
        }
        let part = resolve_path(main, &rel.target);
        if seen.contains(&part) {
            continue;
        }
        match doc.package().read_binary(&part) {
            Ok(data) => images.push(ImageResource::detect(part.clone(), data)),
            Err(e) => warn!(part = %part, error = %e, "image part unreadable"),
        }
        seen.push(part);
    }
    Ok(images)
}

/// Save every document image into `out_dir` as `image_NNN.<ext>`.
pub fn extract_images(doc: &DocxDocument, out_dir: &Path) -> Result<Vec<ExtractedImage>> {
    let saved = save_numbered(document_images(doc)?, out_dir, "image")?;
    for image in &saved {
        debug!(
            path = %image.path.display(),
            size = %image.resource.dimensions_label(),
            format = %image.resource.extension(),
            "saved image"
        );
    }
    info!(count = saved.len(), dir = %out_dir.display(), "extracted images");
    Ok(saved)
}
