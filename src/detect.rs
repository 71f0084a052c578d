//! Format detection for Office Open XML packages.

use crate::error::{Error, Result};
use crate::package::{OoxmlPackage, CONTENT_TYPES_PART};
use std::path::Path;

/// ZIP file magic bytes: PK\x03\x04
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
pub const PPTX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml";

/// Office document format handled by redoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatType {
    /// Microsoft Word document (.docx)
    Docx,
    /// Microsoft Excel workbook (.xlsx)
    Xlsx,
    /// Microsoft PowerPoint presentation (.pptx)
    Pptx,
}

impl FormatType {
    pub fn extension(&self) -> &'static str {
        match self {
            FormatType::Docx => "docx",
            FormatType::Xlsx => "xlsx",
            FormatType::Pptx => "pptx",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FormatType::Docx => "Word Document",
            FormatType::Xlsx => "Excel Workbook",
            FormatType::Pptx => "PowerPoint Presentation",
        }
    }

    /// Map a file extension (case-insensitive, macro-enabled variants included).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "docx" | "docm" | "dotx" => Some(FormatType::Docx),
            "xlsx" | "xlsm" | "xltx" => Some(FormatType::Xlsx),
            "pptx" | "pptm" | "potx" => Some(FormatType::Pptx),
            _ => None,
        }
    }
}

impl std::fmt::Display for FormatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Detect the format of a file.
///
/// The extension decides when it is a known Office one; otherwise the package
/// content is inspected.
///
/// # Example
///
/// ```no_run
/// use redoc::detect::detect_format_from_path;
///
/// let format = detect_format_from_path("report.docx")?;
/// println!("Detected format: {}", format);
/// # Ok::<(), redoc::Error>(())
/// ```
pub fn detect_format_from_path(path: impl AsRef<Path>) -> Result<FormatType> {
    let path = path.as_ref();
    if let Some(format) = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(FormatType::from_extension)
    {
        return Ok(format);
    }
    detect_format_from_bytes(&std::fs::read(path)?)
}

pub fn detect_format_from_bytes(data: &[u8]) -> Result<FormatType> {
    if !is_zip_file(data) {
        return Err(Error::UnknownFormat);
    }
    detect_format_from_package(&OoxmlPackage::from_bytes(data.to_vec())?)
}

/// Detect the format from `[Content_Types].xml`, falling back to folder names.
pub fn detect_format_from_package(package: &OoxmlPackage) -> Result<FormatType> {
    let content_types = package
        .read_xml(CONTENT_TYPES_PART)
        .map_err(|_| Error::MissingComponent(CONTENT_TYPES_PART.to_string()))?;

    if content_types.contains(DOCX_CONTENT_TYPE) {
        Ok(FormatType::Docx)
    } else if content_types.contains(XLSX_CONTENT_TYPE) {
        Ok(FormatType::Xlsx)
    } else if content_types.contains(PPTX_CONTENT_TYPE) {
        Ok(FormatType::Pptx)
    } else {
        detect_by_folder_structure(package)
    }
}

fn detect_by_folder_structure(package: &OoxmlPackage) -> Result<FormatType> {
    let has = |prefix: &str| !package.list_files_with_prefix(prefix).is_empty();
    match (has("word/"), has("xl/"), has("ppt/")) {
        (true, false, false) => Ok(FormatType::Docx),
        (false, true, false) => Ok(FormatType::Xlsx),
        (false, false, true) => Ok(FormatType::Pptx),
        _ => Err(Error::UnknownFormat),
    }
}

/// Check if data starts with ZIP magic bytes.
pub fn is_zip_file(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == ZIP_MAGIC
}
