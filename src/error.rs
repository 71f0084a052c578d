//! Error types for the redoc library.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for redoc operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while editing a document.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// One or more input files do not exist.
    #[error("File not found: {}", display_paths(.0))]
    FileNotFound(Vec<PathBuf>),

    /// The file format could not be determined.
    #[error("Unknown file format")]
    UnknownFormat,

    /// The file format is recognized but not supported by the operation.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Error reading or writing the ZIP archive.
    #[error("ZIP archive error: {0}")]
    ZipArchive(String),

    /// Error parsing or writing XML content.
    #[error("XML error: {0}")]
    XmlParse(String),

    /// Invalid or malformed data in the document.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A required document component is missing.
    #[error("Missing component: {0}")]
    MissingComponent(String),

    /// A worksheet named in the request does not exist.
    #[error("Worksheet not found: {0}")]
    SheetNotFound(String),

    /// A cell, area or range reference could not be parsed.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// A configuration file could not be read or understood.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Image decoding or encoding failed.
    #[error("Image error: {0}")]
    Image(String),

    /// JSON report serialization failed.
    #[error("JSON error: {0}")]
    Json(String),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ZipArchive(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlParse(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Config(format!("invalid pattern: {}", err))
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}

/// Fail with [`Error::FileNotFound`] listing every path that does not exist.
pub fn ensure_exist<P: AsRef<std::path::Path>>(paths: &[P]) -> Result<()> {
    let missing: Vec<PathBuf> = paths
        .iter()
        .map(|p| p.as_ref().to_path_buf())
        .filter(|p| !p.exists())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::FileNotFound(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownFormat;
        assert_eq!(err.to_string(), "Unknown file format");

        let err = Error::SheetNotFound("Sheet9".to_string());
        assert_eq!(err.to_string(), "Worksheet not found: Sheet9");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_missing_files_are_listed() {
        let err = ensure_exist(&["/nonexistent/a.docx", "/nonexistent/b.docx"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "File not found: /nonexistent/a.docx, /nonexistent/b.docx"
        );
    }
}
