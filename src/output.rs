//! Output locations derived from the input path.
//!
//! Results are written next to the input and named after its stem. Merge
//! outputs carry a timestamp and land in the working directory.

use chrono::Local;
use std::path::{Path, PathBuf};

fn stem_of(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

fn extension_of(input: &Path) -> String {
    input
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn sibling(input: &Path, file_name: String) -> PathBuf {
    match input.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// `<stem><marker>.<ext>` next to the input.
fn marked(input: &Path, marker: &str) -> PathBuf {
    let ext = extension_of(input);
    let name = if ext.is_empty() {
        format!("{}{}", stem_of(input), marker)
    } else {
        format!("{}{}.{}", stem_of(input), marker, ext)
    };
    sibling(input, name)
}

/// `报告（已修改）.docx` for `报告.docx`.
pub fn modified_path(input: &Path) -> PathBuf {
    marked(input, "（已修改）")
}

/// `数据（转置）.xlsx` for `数据.xlsx`.
pub fn transposed_path(input: &Path) -> PathBuf {
    marked(input, "（转置）")
}

/// `<stem><suffix>` next to the input, e.g. `_comments.json`.
pub fn side_file(input: &Path, suffix: &str) -> PathBuf {
    sibling(input, format!("{}{}", stem_of(input), suffix))
}

/// `<stem>_images` directory next to the input.
pub fn images_dir(input: &Path) -> PathBuf {
    side_file(input, "_images")
}

/// `<prefix>（YYYYmmdd_HHMMSS）.<ext>` stamped with the local time.
pub fn timestamped_name(prefix: &str, ext: &str) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(format!("{}（{}）.{}", prefix, stamp, ext))
}

/// Display name of an input used in merge headings (`file.docx`).
pub fn display_name(input: &Path) -> String {
    input
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn file_stem(input: &Path) -> String {
    stem_of(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modified_path() {
        assert_eq!(
            modified_path(Path::new("docs/报告.docx")),
            PathBuf::from("docs/报告（已修改）.docx")
        );
        assert_eq!(
            modified_path(Path::new("a.xlsx")),
            PathBuf::from("a（已修改）.xlsx")
        );
    }

    #[test]
    fn test_side_files() {
        assert_eq!(
            side_file(Path::new("in/report.docx"), "_comments.json"),
            PathBuf::from("in/report_comments.json")
        );
        assert_eq!(
            images_dir(Path::new("deck.pptx")),
            PathBuf::from("deck_images")
        );
        assert_eq!(
            transposed_path(Path::new("t.xlsx")),
            PathBuf::from("t（转置）.xlsx")
        );
    }

    #[test]
    fn test_timestamped_name() {
        let name = timestamped_name("合并文档", "docx").to_string_lossy().into_owned();
        assert!(name.starts_with("合并文档（"));
        assert!(name.ends_with("）.docx"));
        // 8 date digits + '_' + 6 time digits
        let inner: String = name.chars().skip(5).take(15).collect();
        assert_eq!(inner.chars().filter(|c| c.is_ascii_digit()).count(), 14);
    }
}
