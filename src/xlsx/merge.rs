//! Collecting the sheets of several workbooks into one.

use super::copy::CellCopier;
use super::XlsxWorkbook;
use crate::error::{ensure_exist, Result};
use crate::output;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedSheet {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedFile {
    pub file: String,
    pub sheets: Vec<MergedSheet>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub files: Vec<MergedFile>,
}

impl MergeReport {
    pub fn total_sheets(&self) -> usize {
        self.files.iter().map(|f| f.sheets.len()).sum()
    }
}

/// Open every file and merge their sheets; all paths are checked first.
pub fn merge_workbooks<P: AsRef<Path>>(paths: &[P]) -> Result<(XlsxWorkbook, MergeReport)> {
    ensure_exist(paths)?;
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        sources.push((output::file_stem(path), XlsxWorkbook::open(path)?));
    }
    merge_opened(&sources)
}

/// Copy every sheet of `sources` into a new workbook as `<file>_<sheet>`.
///
/// Values (cached results for formulas), formats, column widths, row heights
/// and merged areas are copied.
pub fn merge_opened(sources: &[(String, XlsxWorkbook)]) -> Result<(XlsxWorkbook, MergeReport)> {
    let mut target = XlsxWorkbook::blank()?;
    // the blank sheet goes once a copied sheet takes its place
    let mut placeholder = true;
    let mut report = MergeReport::default();

    for (i, (file, source)) in sources.iter().enumerate() {
        info!(file = %file, index = i + 1, total = sources.len(), "merging workbook");
        let mut copier = CellCopier::new(source);
        let mut merged = MergedFile {
            file: file.clone(),
            sheets: Vec::new(),
        };

        for sheet in &source.sheets {
            let name = target.unique_sheet_name(&format!("{}_{}", file, sheet.name));
            let mut index = target.add_sheet(&name)?;
            if placeholder {
                target.remove_sheet(0)?;
                placeholder = false;
                index -= 1;
            }

            for (at, c) in sheet.worksheet.cells() {
                copier.copy(c, &mut target, index, at);
            }
            let worksheet = &mut target.sheets[index].worksheet;
            for width in sheet.worksheet.column_widths() {
                worksheet.set_columns_width(width.min, width.max, width.width);
            }
            for row in sheet.worksheet.rows() {
                let number = row.attr("r").and_then(|r| r.parse::<u32>().ok());
                let height = row.attr("ht").and_then(|h| h.parse::<f64>().ok());
                if let (Some(number), Some(height)) = (number, height) {
                    worksheet.set_row_height(number, height);
                }
            }
            for area in sheet.worksheet.merged_areas() {
                worksheet.add_merged_area(area);
            }

            let target_name = target.sheets[index].name.clone();
            debug!(sheet = %sheet.name, target = %target_name, "copied worksheet");
            merged.sheets.push(MergedSheet {
                source: sheet.name.clone(),
                target: target_name,
            });
        }
        report.files.push(merged);
    }

    info!(
        files = report.files.len(),
        sheets = report.total_sheets(),
        "merged workbooks"
    );
    Ok((target, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::xlsx::cell::CellValue;
    use crate::xlsx::reference::{Area, CellRef};
    use crate::xlsx::styles::{CellFont, CellStyle};

    fn source(value: &str) -> XlsxWorkbook {
        let mut wb = XlsxWorkbook::blank().unwrap();
        wb.add_sheet("汇总").unwrap();
        let bold = wb.styles.derive(
            0,
            &CellStyle {
                font: Some(CellFont {
                    bold: true,
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        let ws = &mut wb.sheets[0].worksheet;
        ws.set_value(CellRef::new(1, 1), &CellValue::Text(value.into()), &mut wb.strings);
        ws.set_style(CellRef::new(1, 1), bold);
        ws.set_column_width(1, 22.5);
        ws.set_row_height(1, 30.0);
        ws.add_merged_area(Area::parse("A1:B1").unwrap());
        wb
    }

    #[test]
    fn test_merge_copies_sheets_with_layout() {
        let sources = vec![
            ("一月".to_string(), source("一月数据")),
            ("二月".to_string(), source("二月数据")),
        ];
        let (mut merged, report) = merge_opened(&sources).unwrap();
        assert_eq!(
            merged.sheet_names(),
            vec!["一月_Sheet1", "一月_汇总", "二月_Sheet1", "二月_汇总"]
        );
        assert_eq!(report.total_sheets(), 4);
        assert_eq!(report.files[1].sheets[0].target, "二月_Sheet1");

        let ws = &merged.sheets[2].worksheet;
        assert_eq!(
            ws.value(CellRef::new(1, 1), &merged.strings),
            CellValue::Text("二月数据".into())
        );
        assert_eq!(ws.row_height(1), Some(30.0));
        assert_eq!(ws.column_widths()[0].width, 22.5);
        assert_eq!(ws.merged_areas(), vec![Area::parse("A1:B1").unwrap()]);
        let font = merged.styles.xf(ws.style(CellRef::new(1, 1)));
        assert_ne!(font.attr("fontId"), Some("0"));

        let reopened = XlsxWorkbook::from_bytes(merged.to_bytes().unwrap()).unwrap();
        assert_eq!(reopened.sheets.len(), 4);
    }

    #[test]
    fn test_duplicate_and_long_names() {
        let long = "年度销售数据汇总报表_华东区域_第一季度_终版_修订稿";
        let sources = vec![
            (long.to_string(), XlsxWorkbook::blank().unwrap()),
            (long.to_string(), XlsxWorkbook::blank().unwrap()),
        ];
        let (merged, _) = merge_opened(&sources).unwrap();
        let names = merged.sheet_names();
        assert!(names[0].ends_with("..."));
        assert_eq!(names[0].chars().count(), 31);
        assert!(names[1].ends_with("_1"));
        assert!(names.iter().all(|n| n.chars().count() <= 31));
    }

    #[test]
    fn test_missing_inputs_reported_before_work() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("缺失.xlsx");
        match merge_workbooks(&[&missing]) {
            Err(Error::FileNotFound(paths)) => assert_eq!(paths, vec![missing]),
            other => panic!("unexpected result: {:?}", other.map(|(_, r)| r)),
        }
    }
}
