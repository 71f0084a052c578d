//! Filling empty cells in selected sheets and areas.

use super::cell::{self, CellValue};
use super::reference::Area;
use super::XlsxWorkbook;
use crate::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Which values count as empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmptyConditions {
    pub none: bool,
    pub empty_string: bool,
    pub whitespace: bool,
    pub zero: bool,
    pub zero_string: bool,
    pub custom_values: Vec<String>,
    /// Matched at the start of text values.
    pub custom_pattern: Option<String>,
}

impl Default for EmptyConditions {
    fn default() -> Self {
        Self {
            none: true,
            empty_string: true,
            whitespace: true,
            zero: false,
            zero_string: false,
            custom_values: Vec::new(),
            custom_pattern: None,
        }
    }
}

impl EmptyConditions {
    fn compile(&self) -> Result<Option<Regex>> {
        Ok(self
            .custom_pattern
            .as_deref()
            .map(|p| Regex::new(&format!("^(?:{})", p)))
            .transpose()?)
    }

    fn matches(&self, value: &CellValue, pattern: Option<&Regex>) -> bool {
        match value {
            CellValue::Empty => self.none,
            CellValue::Number(n) => self.zero && *n == 0.0,
            CellValue::Text(s) => {
                (self.empty_string && s.is_empty())
                    || (self.whitespace && s.trim().is_empty())
                    || (self.zero_string && s == "0")
                    || self.custom_values.iter().any(|v| v == s)
                    || pattern.is_some_and(|re| re.is_match(s))
            }
            CellValue::Bool(_) | CellValue::Error(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillConfig {
    /// Sheets to process; `None` processes every sheet.
    pub sheets: Option<Vec<String>>,
    /// `B:B`, `D1:F10`, `5:10` or a single cell.
    pub areas: Vec<String>,
    pub fill_value: CellValue,
    pub conditions: EmptyConditions,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            sheets: None,
            areas: vec!["B:B".to_string(), "D1:F10".to_string(), "5:10".to_string()],
            fill_value: CellValue::Number(0.0),
            conditions: EmptyConditions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetFill {
    pub sheet: String,
    pub filled: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FillReport {
    pub sheets: Vec<SheetFill>,
    pub missing_sheets: Vec<String>,
    pub invalid_areas: Vec<String>,
}

impl FillReport {
    pub fn total(&self) -> usize {
        self.sheets.iter().map(|s| s.filled).sum()
    }
}

/// Replace empty values in the configured areas with `fill_value`.
///
/// Areas are limited to the cells the sheet actually uses; formula cells are
/// never considered empty.
pub fn fill_empty_cells(workbook: &mut XlsxWorkbook, config: &FillConfig) -> Result<FillReport> {
    let pattern = config.conditions.compile()?;
    let mut report = FillReport::default();

    let mut areas = Vec::new();
    for reference in &config.areas {
        match Area::parse(reference) {
            Ok(area) => areas.push((reference.as_str(), area)),
            Err(_) => {
                warn!(area = %reference, "unparseable area skipped");
                report.invalid_areas.push(reference.clone());
            }
        }
    }

    let targets: Vec<usize> = match &config.sheets {
        None => (0..workbook.sheets.len()).collect(),
        Some(names) => names
            .iter()
            .filter_map(|name| match workbook.sheet_index(name) {
                Ok(i) => Some(i),
                Err(_) => {
                    warn!(sheet = %name, "worksheet not found, skipped");
                    report.missing_sheets.push(name.clone());
                    None
                }
            })
            .collect(),
    };

    for index in targets {
        let sheet = &mut workbook.sheets[index];
        let (max_row, max_col) = sheet.worksheet.extent();
        let mut filled = 0;
        for (reference, area) in &areas {
            let Some(area) = area.clamp(max_row, max_col) else {
                debug!(sheet = %sheet.name, area = %reference, "area outside used range");
                continue;
            };
            for at in area.cells() {
                let value = match sheet.worksheet.cell(at) {
                    Some(c) if cell::has_formula(c) => continue,
                    Some(c) => cell::read_value(c, &workbook.strings),
                    None => CellValue::Empty,
                };
                if config.conditions.matches(&value, pattern.as_ref()) {
                    sheet
                        .worksheet
                        .set_value(at, &config.fill_value, &mut workbook.strings);
                    filled += 1;
                    debug!(sheet = %sheet.name, cell = %at, from = ?value, "filled");
                }
            }
        }
        info!(sheet = %sheet.name, filled, "filled empty cells");
        report.sheets.push(SheetFill {
            sheet: sheet.name.clone(),
            filled,
        });
    }
    Ok(report)
}
