//! Worksheet listing.

use super::XlsxWorkbook;
use serde::Serialize;
use std::fmt;
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetEntry {
    pub name: String,
    /// Last used row and column, 0 for an empty sheet.
    pub rows: u32,
    pub columns: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetListing {
    pub sheets: Vec<SheetEntry>,
}

impl SheetListing {
    pub fn names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn count(&self) -> usize {
        self.sheets.len()
    }
}

/// One line per sheet, names padded to the widest (CJK counts double).
impl fmt::Display for SheetListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widest = self.sheets.iter().map(|s| s.name.width()).max().unwrap_or(0);
        for (i, sheet) in self.sheets.iter().enumerate() {
            let pad = " ".repeat(widest - sheet.name.width());
            writeln!(
                f,
                "{:>3}. {}{}  {} 行 × {} 列",
                i + 1,
                sheet.name,
                pad,
                sheet.rows,
                sheet.columns
            )?;
        }
        Ok(())
    }
}

/// Sheet names in workbook order with their used extent.
pub fn list_worksheets(workbook: &XlsxWorkbook) -> SheetListing {
    SheetListing {
        sheets: workbook
            .sheets
            .iter()
            .map(|sheet| {
                let (rows, columns) = sheet.worksheet.extent();
                SheetEntry {
                    name: sheet.name.clone(),
                    rows,
                    columns,
                }
            })
            .collect(),
    }
}
