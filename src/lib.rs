//! # redoc
//!
//! Batch editing of Microsoft Office documents.
//!
//! Packages are read fully into memory, their XML parts edited as element
//! trees, and written back as new files next to the input. Each operation
//! lives in the module of its format and returns a report of what it changed.
//!
//! ## Quick Start
//!
//! ```no_run
//! use redoc::docx::{strip_markdown, DocxDocument};
//! use redoc::output::modified_path;
//! use std::path::Path;
//!
//! let input = Path::new("notes.docx");
//! let mut doc = DocxDocument::open(input)?;
//! let report = strip_markdown(&mut doc)?;
//! println!("removed {} emphasis marks", report.emphasis_marks);
//! doc.save(modified_path(input))?;
//! # Ok::<(), redoc::Error>(())
//! ```
//!
//! ## Format-Specific APIs
//!
//! ```no_run
//! use redoc::docx::DocxDocument;
//! use redoc::pptx::PptxPresentation;
//! use redoc::xlsx::XlsxWorkbook;
//!
//! let doc = DocxDocument::open("report.docx")?;
//! let workbook = XlsxWorkbook::open("data.xlsx")?;
//! let deck = PptxPresentation::open("slides.pptx")?;
//! # Ok::<(), redoc::Error>(())
//! ```
//!
//! ## Features
//!
//! - `docx` (default): Word document operations
//! - `xlsx` (default): Excel workbook operations
//! - `pptx` (default): PowerPoint presentation operations

pub mod config;
pub mod detect;
pub mod error;
pub mod model;
pub mod output;
pub mod package;
pub mod xml;

#[cfg(feature = "docx")]
pub mod docx;

#[cfg(feature = "xlsx")]
pub mod xlsx;

#[cfg(feature = "pptx")]
pub mod pptx;

// Re-exports
pub use detect::{detect_format_from_bytes, detect_format_from_path, FormatType};
pub use error::{Error, Result};
pub use model::{Color, ExtractedImage, ImageResource};
pub use package::{OoxmlPackage, Relationship, Relationships};

use std::path::Path;

/// What a package holds, for `redoc info`.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageSummary {
    pub format: FormatType,
    pub size: u64,
    pub parts: usize,
    /// Format-specific counts as (label, value).
    pub details: Vec<(String, String)>,
}

/// Open a file, detect its format and count what it contains.
///
/// # Example
///
/// ```no_run
/// let summary = redoc::summarize("report.docx")?;
/// for (label, value) in &summary.details {
///     println!("{}: {}", label, value);
/// }
/// # Ok::<(), redoc::Error>(())
/// ```
pub fn summarize(path: impl AsRef<Path>) -> Result<PackageSummary> {
    let path = path.as_ref();
    error::ensure_exist(&[path])?;
    let size = std::fs::metadata(path)?.len();
    let package = OoxmlPackage::open(path)?;
    let format = detect::detect_format_from_package(&package)?;
    let parts = package.list_files().len();

    let details = match format {
        #[cfg(feature = "docx")]
        FormatType::Docx => {
            let doc = docx::DocxDocument::from_package(package)?;
            let body = doc.body()?;
            let styles = doc
                .styles()
                .map(|s| s.paragraph_styles().len())
                .unwrap_or(0);
            vec![
                ("段落".to_string(), doc.paragraphs()?.len().to_string()),
                ("表格".to_string(), body.count_named("w:tbl").to_string()),
                ("段落样式".to_string(), styles.to_string()),
            ]
        }
        #[cfg(feature = "xlsx")]
        FormatType::Xlsx => {
            let workbook = xlsx::XlsxWorkbook::from_package(package)?;
            let listing = xlsx::list_worksheets(&workbook);
            vec![
                ("工作表".to_string(), listing.count().to_string()),
                ("名称".to_string(), listing.names().join(", ")),
            ]
        }
        #[cfg(feature = "pptx")]
        FormatType::Pptx => {
            let deck = pptx::PptxPresentation::from_package(package)?;
            vec![
                ("幻灯片".to_string(), deck.slide_count().to_string()),
                ("版式".to_string(), deck.layouts()?.len().to_string()),
            ]
        }
        #[cfg(not(all(feature = "docx", feature = "xlsx", feature = "pptx")))]
        _ => return Err(Error::UnsupportedFormat(format.to_string())),
    };

    Ok(PackageSummary {
        format,
        size,
        parts,
        details,
    })
}

/// Extract the images of a Word document or a presentation into `out_dir`.
///
/// Word images keep their format as `image_NNN.<ext>`; slide images follow
/// the `slide_NNN_*` naming of [`pptx::extract_images`].
pub fn extract_images(path: impl AsRef<Path>, out_dir: impl AsRef<Path>) -> Result<Vec<ExtractedImage>> {
    let path = path.as_ref();
    let out_dir = out_dir.as_ref();
    error::ensure_exist(&[path])?;
    let format = detect_format_from_path(path)?;

    match format {
        #[cfg(feature = "docx")]
        FormatType::Docx => docx::extract_images(&docx::DocxDocument::open(path)?, out_dir),
        #[cfg(feature = "pptx")]
        FormatType::Pptx => {
            let report = pptx::extract_images(&pptx::PptxPresentation::open(path)?, out_dir)?;
            Ok(report.pictures.into_iter().chain(report.backgrounds).collect())
        }
        _ => Err(Error::UnsupportedFormat(format!(
            "image extraction from {}",
            format
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_blank_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("数据.xlsx");
        let mut workbook = xlsx::XlsxWorkbook::blank().unwrap();
        workbook.add_sheet("汇总").unwrap();
        workbook.save(&path).unwrap();

        let summary = summarize(&path).unwrap();
        assert_eq!(summary.format, FormatType::Xlsx);
        assert!(summary.parts >= 5);
        assert_eq!(summary.details[0], ("工作表".to_string(), "2".to_string()));
        assert_eq!(summary.details[1].1, "Sheet1, 汇总");
    }

    #[test]
    fn test_images_unsupported_for_workbooks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("数据.xlsx");
        xlsx::XlsxWorkbook::blank().unwrap().save(&path).unwrap();
        assert!(matches!(
            extract_images(&path, dir.path().join("out")),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            summarize("不存在.docx"),
            Err(Error::FileNotFound(_))
        ));
    }
}
