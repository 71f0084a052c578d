//! Images pulled out of packages.

use crate::error::Result;
use image::{ImageFormat, ImageReader};
use serde::Serialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// An image part together with what its bytes say about it.
///
/// Formats the codec does not know (EMF, WMF, SVG) keep `format` empty and
/// take their extension from the part name.
#[derive(Debug, Clone, Serialize)]
pub struct ImageResource {
    /// Part name inside the package.
    pub source: String,
    #[serde(skip)]
    pub data: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub size: usize,
}

impl ImageResource {
    /// Sniff format and pixel size from the bytes.
    pub fn detect(source: impl Into<String>, data: Vec<u8>) -> Self {
        let guessed = image::guess_format(&data).ok();
        let (width, height) = guessed
            .and_then(|_| {
                ImageReader::new(Cursor::new(&data))
                    .with_guessed_format()
                    .ok()?
                    .into_dimensions()
                    .ok()
            })
            .unzip();
        Self {
            source: source.into(),
            format: guessed.and_then(|f| f.extensions_str().first().map(|e| e.to_string())),
            size: data.len(),
            data,
            width,
            height,
        }
    }

    /// Extension for a saved copy: the sniffed format, else the part's own.
    pub fn extension(&self) -> String {
        if let Some(format) = &self.format {
            return format.clone();
        }
        self.source
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| "bin".to_string())
    }

    pub fn is_decodable(&self) -> bool {
        self.width.is_some()
    }

    /// Re-encode as PNG (PNG input is returned unchanged).
    pub fn to_png(&self) -> Result<Vec<u8>> {
        if self.format.as_deref() == Some("png") {
            return Ok(self.data.clone());
        }
        let decoded = image::load_from_memory(&self.data)?;
        let mut out = Cursor::new(Vec::new());
        decoded.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    pub fn dimensions_label(&self) -> String {
        match (self.width, self.height) {
            (Some(w), Some(h)) => format!("{}x{}", w, h),
            _ => "unknown size".to_string(),
        }
    }
}

/// An image written to disk by an extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedImage {
    pub path: PathBuf,
    #[serde(flatten)]
    pub resource: ImageResource,
}

/// Write `images` as `<prefix>_NNN.<ext>` into `dir`, numbering from 1.
pub fn save_numbered(
    images: Vec<ImageResource>,
    dir: &Path,
    prefix: &str,
) -> Result<Vec<ExtractedImage>> {
    std::fs::create_dir_all(dir)?;
    images
        .into_iter()
        .enumerate()
        .map(|(i, resource)| {
            let path = dir.join(format!("{}_{:03}.{}", prefix, i + 1, resource.extension()));
            std::fs::write(&path, &resource.data)?;
            Ok(ExtractedImage { path, resource })
        })
        .collect()
}

/// MIME type registered for a media extension in `[Content_Types].xml`.
pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tiff" | "tif" => "image/tiff",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "svg" => "image/svg+xml",
        "wmf" => "image/x-wmf",
        "emf" => "image/x-emf",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "mp4" => "video/mp4",
        "wmv" => "video/x-ms-wmv",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "bin" => "application/vnd.openxmlformats-officedocument.oleObject",
        _ => return None,
    };
    Some(mime)
}
