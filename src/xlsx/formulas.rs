//! Replacing formulas with their cached results.

use super::cell;
use super::reference::{Area, CellRef};
use super::XlsxWorkbook;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulaConfig {
    /// Single columns (`B`) or ranges (`D:F`).
    pub columns: Vec<String>,
}

impl Default for FormulaConfig {
    fn default() -> Self {
        Self {
            columns: vec!["B".to_string(), "D:F".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SheetFormulas {
    pub sheet: String,
    pub converted: usize,
    /// Shared-formula masters kept because cells outside the columns depend on them.
    pub kept_shared: Vec<String>,
    /// Formula cells that had no cached result and were left empty.
    pub missing_values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormulaReport {
    pub sheets: Vec<SheetFormulas>,
    pub calc_chain_removed: bool,
}

impl FormulaReport {
    pub fn total(&self) -> usize {
        self.sheets.iter().map(|s| s.converted).sum()
    }
}

fn shared_index(f: &crate::xml::Element) -> Option<&str> {
    (f.attr("t") == Some("shared")).then(|| f.attr("si")).flatten()
}

/// Convert formula cells in `config.columns` of every sheet to plain values.
pub fn formula_to_value(workbook: &mut XlsxWorkbook, config: &FormulaConfig) -> Result<FormulaReport> {
    let mut columns: Vec<u32> = Vec::new();
    for reference in &config.columns {
        let area = Area::parse_columns(reference)?;
        columns.extend(area.min_col..=area.max_col);
    }
    columns.sort_unstable();
    columns.dedup();
    let selected = |at: &CellRef| columns.binary_search(&at.col).is_ok();

    let mut report = FormulaReport::default();
    for sheet in &mut workbook.sheets {
        let mut result = SheetFormulas {
            sheet: sheet.name.clone(),
            ..Default::default()
        };

        // shared formula groups with a dependent that stays a formula
        let mut pinned: HashSet<String> = HashSet::new();
        let mut targets = Vec::new();
        for (at, c) in sheet.worksheet.cells() {
            let Some(f) = cell::formula(c) else { continue };
            if selected(&at) {
                targets.push(at);
            } else if let Some(si) = shared_index(f) {
                pinned.insert(si.to_string());
            }
        }

        for at in targets {
            let Some(c) = sheet.worksheet.cell(at) else { continue };
            let Some(f) = cell::formula(c) else { continue };
            let is_master = f.attr("ref").is_some();
            if let Some(si) = shared_index(f).filter(|si| is_master && pinned.contains(*si)) {
                debug!(sheet = %sheet.name, cell = %at, si, "keeping shared formula master");
                result.kept_shared.push(at.to_string());
                continue;
            }
            let formula = f.text();
            let has_cached = c.child("v").is_some() || c.attr("t") == Some("inlineStr");
            let value = cell::read_value(c, &workbook.strings);
            if !has_cached {
                warn!(sheet = %sheet.name, cell = %at, "formula has no cached value");
                result.missing_values.push(at.to_string());
            }
            sheet
                .worksheet
                .set_value(at, &value, &mut workbook.strings);
            result.converted += 1;
            debug!(sheet = %sheet.name, cell = %at, formula = %formula, value = %value, "converted formula");
        }

        info!(sheet = %sheet.name, converted = result.converted, "converted formulas to values");
        report.sheets.push(result);
    }

    if report.total() > 0 {
        report.calc_chain_removed = workbook.remove_calc_chain()?;
    }
    Ok(report)
}
