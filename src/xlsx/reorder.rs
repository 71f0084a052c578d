//! Aligning the column order of several sheets to a reference sheet.

use super::cell::CellValue;
use super::reference::{column_letter, CellRef};
use super::shared_strings::SharedStrings;
use super::worksheet::Worksheet;
use super::XlsxWorkbook;
use crate::error::{Error, Result};
use crate::xml::Element;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReorderConfig {
    /// The first sheet supplies the column order for the others.
    pub sheets: Vec<String>,
    pub has_headers: bool,
    /// Write `<name>_reordered` sheets instead of rearranging in place.
    pub copy: bool,
}

impl Default for ReorderConfig {
    fn default() -> Self {
        Self {
            sheets: vec!["Sheet1".to_string(), "Sheet2".to_string(), "Sheet3".to_string()],
            has_headers: true,
            copy: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SheetReorder {
    pub sheet: String,
    /// Sheet holding the result; the sheet itself unless copying.
    pub target: String,
    pub copied: Vec<String>,
    /// Reference columns the sheet lacked, added with only a header.
    pub inserted: Vec<String>,
    /// Columns unknown to the reference, placed after its columns.
    pub appended: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReorderReport {
    pub reference_sheet: String,
    pub reference_columns: Vec<String>,
    pub sheets: Vec<SheetReorder>,
}

struct Header {
    key: String,
    value: CellValue,
}

/// Header names of row 1; a blank header is named by its column letter.
fn header_row(worksheet: &Worksheet, strings: &SharedStrings) -> Vec<Header> {
    let (_, max_col) = worksheet.extent();
    (1..=max_col)
        .map(|col| match worksheet.value(CellRef::new(1, col), strings) {
            CellValue::Empty => {
                let letter = column_letter(col);
                Header {
                    key: letter.clone(),
                    value: CellValue::Text(letter),
                }
            }
            value => Header {
                key: value.to_string(),
                value,
            },
        })
        .collect()
}

/// Rearrange the columns of every listed sheet after the first into the
/// first sheet's header order.
pub fn reorder_columns(workbook: &mut XlsxWorkbook, config: &ReorderConfig) -> Result<ReorderReport> {
    if config.sheets.len() < 2 {
        return Err(Error::InvalidData(
            "at least two sheets are needed to reorder columns".to_string(),
        ));
    }
    let missing: Vec<&str> = config
        .sheets
        .iter()
        .filter(|name| workbook.sheet_index(name).is_err())
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(Error::SheetNotFound(missing.join(", ")));
    }
    if !config.has_headers {
        return Err(Error::InvalidData(
            "columns can only be matched through a header row".to_string(),
        ));
    }

    let reference_sheet = &config.sheets[0];
    let reference = header_row(
        &workbook.sheet(reference_sheet)?.worksheet,
        &workbook.strings,
    );
    let mut report = ReorderReport {
        reference_sheet: reference_sheet.clone(),
        reference_columns: reference.iter().map(|h| h.key.clone()).collect(),
        sheets: Vec::new(),
    };
    info!(sheet = %reference_sheet, columns = ?report.reference_columns, "reference column order");

    for name in &config.sheets[1..] {
        let index = workbook.sheet_index(name)?;
        let current = header_row(&workbook.sheets[index].worksheet, &workbook.strings);
        let mut result = SheetReorder {
            sheet: name.clone(),
            ..Default::default()
        };

        let mut plan: Vec<(CellValue, Option<u32>)> = Vec::new();
        for header in &reference {
            let source = current
                .iter()
                .position(|c| c.key == header.key)
                .map(|p| p as u32 + 1);
            match source {
                Some(_) => result.copied.push(header.key.clone()),
                None => result.inserted.push(header.key.clone()),
            }
            plan.push((header.value.clone(), source));
        }
        for (i, header) in current.iter().enumerate() {
            if !reference.iter().any(|r| r.key == header.key) {
                result.appended.push(header.key.clone());
                plan.push((header.value.clone(), Some(i as u32 + 1)));
            }
        }

        let mut columns: HashMap<u32, Vec<(u32, Element)>> = HashMap::new();
        for (at, c) in workbook.sheets[index].worksheet.cells() {
            columns.entry(at.col).or_default().push((at.row, c.clone()));
        }

        let target = if config.copy {
            let target_name = format!("{}_reordered", name);
            match workbook.sheet_index(&target_name) {
                Ok(existing) => existing,
                Err(_) => workbook.add_sheet(&target_name)?,
            }
        } else {
            index
        };
        result.target = workbook.sheets[target].name.clone();

        let worksheet = &mut workbook.sheets[target].worksheet;
        worksheet.clear_cells();
        for (i, (header, source)) in plan.iter().enumerate() {
            let col = i as u32 + 1;
            if let Some(cells) = source.and_then(|s| columns.get(&s)) {
                for (row, element) in cells {
                    let at = CellRef::new(*row, col);
                    let mut element = element.clone();
                    element.set_attr("r", at.to_string());
                    *worksheet.cell_or_insert(at) = element;
                }
            }
            worksheet.set_value(CellRef::new(1, col), header, &mut workbook.strings);
        }

        debug!(
            sheet = %name,
            inserted = ?result.inserted,
            appended = ?result.appended,
            "reordered columns"
        );
        report.sheets.push(result);
    }
    info!(sheets = report.sheets.len(), "column reordering finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_row(wb: &mut XlsxWorkbook, sheet: usize, row: u32, values: &[CellValue]) {
        for (i, value) in values.iter().enumerate() {
            wb.sheets[sheet]
                .worksheet
                .set_value(CellRef::new(row, i as u32 + 1), value, &mut wb.strings);
        }
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn workbook() -> XlsxWorkbook {
        let mut wb = XlsxWorkbook::blank().unwrap();
        wb.add_sheet("Sheet2").unwrap();
        set_row(&mut wb, 0, 1, &[text("姓名"), text("年龄"), text("城市")]);
        set_row(&mut wb, 0, 2, &[text("张三"), 30.0.into(), text("北京")]);
        set_row(&mut wb, 1, 1, &[text("城市"), text("备注"), text("姓名")]);
        set_row(&mut wb, 1, 2, &[text("上海"), text("新客户"), text("李四")]);
        set_row(&mut wb, 1, 3, &[text("广州"), CellValue::Empty, text("王五")]);
        wb
    }

    fn row(wb: &XlsxWorkbook, sheet: usize, row: u32, width: u32) -> Vec<CellValue> {
        (1..=width)
            .map(|col| wb.sheets[sheet].worksheet.value(CellRef::new(row, col), &wb.strings))
            .collect()
    }

    #[test]
    fn test_reorder_in_place() {
        let mut wb = workbook();
        let config = ReorderConfig {
            sheets: vec!["Sheet1".into(), "Sheet2".into()],
            ..Default::default()
        };
        let report = reorder_columns(&mut wb, &config).unwrap();
        let result = &report.sheets[0];
        assert_eq!(result.target, "Sheet2");
        assert_eq!(result.copied, vec!["姓名", "城市"]);
        assert_eq!(result.inserted, vec!["年龄"]);
        assert_eq!(result.appended, vec!["备注"]);

        assert_eq!(row(&wb, 1, 1, 4), vec![text("姓名"), text("年龄"), text("城市"), text("备注")]);
        assert_eq!(row(&wb, 1, 2, 4), vec![text("李四"), CellValue::Empty, text("上海"), text("新客户")]);
        assert_eq!(row(&wb, 1, 3, 4), vec![text("王五"), CellValue::Empty, text("广州"), CellValue::Empty]);
        assert_eq!(wb.sheets[1].worksheet.extent(), (3, 4));
    }

    #[test]
    fn test_copy_mode_keeps_source() {
        let mut wb = workbook();
        let config = ReorderConfig {
            sheets: vec!["Sheet1".into(), "Sheet2".into()],
            copy: true,
            ..Default::default()
        };
        reorder_columns(&mut wb, &config).unwrap();
        assert_eq!(wb.sheet_names(), vec!["Sheet1", "Sheet2", "Sheet2_reordered"]);
        assert_eq!(row(&wb, 1, 1, 3), vec![text("城市"), text("备注"), text("姓名")]);
        assert_eq!(row(&wb, 2, 2, 1), vec![text("李四")]);

        // running again reuses the copy
        reorder_columns(&mut wb, &config).unwrap();
        assert_eq!(wb.sheets.len(), 3);
    }

    #[test]
    fn test_blank_headers_use_column_letters() {
        let mut wb = workbook();
        set_row(&mut wb, 0, 1, &[text("姓名"), CellValue::Empty, text("城市")]);
        let config = ReorderConfig {
            sheets: vec!["Sheet1".into(), "Sheet2".into()],
            ..Default::default()
        };
        let report = reorder_columns(&mut wb, &config).unwrap();
        assert_eq!(report.reference_columns, vec!["姓名", "B", "城市"]);
        assert_eq!(wb.sheets[1].worksheet.value(CellRef::new(1, 2), &wb.strings), text("B"));
    }

    #[test]
    fn test_invalid_requests() {
        let mut wb = workbook();
        let single = ReorderConfig {
            sheets: vec!["Sheet1".into()],
            ..Default::default()
        };
        assert!(matches!(reorder_columns(&mut wb, &single), Err(Error::InvalidData(_))));
        assert!(matches!(
            reorder_columns(&mut wb, &ReorderConfig::default()),
            Err(Error::SheetNotFound(name)) if name == "Sheet3"
        ));
        let headerless = ReorderConfig {
            sheets: vec!["Sheet1".into(), "Sheet2".into()],
            has_headers: false,
            ..Default::default()
        };
        assert!(matches!(reorder_columns(&mut wb, &headerless), Err(Error::InvalidData(_))));
    }
}
