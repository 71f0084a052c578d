//! Swapping the rows and columns of a worksheet.

use super::copy::CellCopier;
use super::reference::{Area, CellRef};
use super::XlsxWorkbook;
use crate::error::Result;
use serde::Serialize;
use tracing::info;

const COLUMN_WIDTH: f64 = 15.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransposeReport {
    pub sheet: String,
    pub target_sheet: String,
    /// Rows and columns of the source sheet.
    pub before: (u32, u32),
    pub after: (u32, u32),
}

/// Copy `sheet` into a new workbook with rows and columns swapped.
///
/// The new sheet is named `<sheet>_转置`. Formats move with their cells,
/// formulas are replaced by their cached results and merged areas are
/// transposed as well.
pub fn transpose_worksheet(source: &XlsxWorkbook, sheet: &str) -> Result<(XlsxWorkbook, TransposeReport)> {
    let from = source.sheet(sheet)?;
    let before = from.worksheet.extent();

    let mut target = XlsxWorkbook::blank()?;
    let target_sheet = target.unique_sheet_name(&format!("{}_转置", sheet));
    target.rename_sheet(0, &target_sheet)?;

    let mut copier = CellCopier::new(source);
    for (at, c) in from.worksheet.cells() {
        copier.copy(c, &mut target, 0, CellRef::new(at.col, at.row));
    }

    let worksheet = &mut target.sheets[0].worksheet;
    for area in from.worksheet.merged_areas() {
        worksheet.add_merged_area(Area::new(area.min_col, area.min_row, area.max_col, area.max_row));
    }
    if before.0 > 0 {
        worksheet.set_columns_width(1, before.0, COLUMN_WIDTH);
    }
    let after = worksheet.extent();

    info!(sheet = %sheet, rows = before.0, cols = before.1, "transposed worksheet");
    Ok((
        target,
        TransposeReport {
            sheet: sheet.to_string(),
            target_sheet,
            before,
            after,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xlsx::cell::CellValue;
    use crate::xlsx::styles::CellStyle;

    fn source() -> XlsxWorkbook {
        let mut wb = XlsxWorkbook::blank().unwrap();
        wb.rename_sheet(0, "数据").unwrap();
        let values = [
            (1, 1, CellValue::Text("月份".into())),
            (1, 2, CellValue::Text("一月".into())),
            (1, 3, CellValue::Text("二月".into())),
            (2, 1, CellValue::Text("销量".into())),
            (2, 2, CellValue::Number(120.0)),
            (2, 3, CellValue::Number(98.5)),
        ];
        for (row, col, value) in values {
            wb.sheets[0]
                .worksheet
                .set_value(CellRef::new(row, col), &value, &mut wb.strings);
        }
        let percent = wb.styles.derive(
            0,
            &CellStyle {
                number_format: Some("0.00%".into()),
                ..Default::default()
            },
        );
        wb.sheets[0].worksheet.set_style(CellRef::new(2, 3), percent);
        wb.sheets[0]
            .worksheet
            .add_merged_area(Area::parse("B1:C1").unwrap());
        wb
    }

    #[test]
    fn test_every_cell_moves_to_swapped_position() {
        let wb = source();
        let (mut out, report) = transpose_worksheet(&wb, "数据").unwrap();
        assert_eq!(report.target_sheet, "数据_转置");
        assert_eq!(report.before, (2, 3));
        assert_eq!(report.after, (3, 2));

        let from = &wb.sheets[0].worksheet;
        let to = &out.sheets[0].worksheet;
        for (at, _) in from.cells() {
            assert_eq!(
                to.value(CellRef::new(at.col, at.row), &out.strings),
                from.value(at, &wb.strings)
            );
        }
        assert_eq!(to.merged_areas(), vec![Area::parse("A2:A3").unwrap()]);

        let moved = to.style(CellRef::new(3, 2));
        let fmt = out.styles.num_fmt_id(moved);
        assert_eq!(out.styles.format_code(fmt).as_deref(), Some("0.00%"));

        let widths = to.column_widths();
        assert_eq!(widths.len(), 1);
        assert_eq!((widths[0].min, widths[0].max, widths[0].width), (1, 2, 15.0));

        let reopened = XlsxWorkbook::from_bytes(out.to_bytes().unwrap()).unwrap();
        assert_eq!(reopened.sheet_names(), vec!["数据_转置"]);
    }

    #[test]
    fn test_missing_sheet() {
        let wb = source();
        assert!(transpose_worksheet(&wb, "Sheet9").is_err());
    }
}
