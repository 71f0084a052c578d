//! Batch formatting of sheet areas: fonts, fills, borders, alignment,
//! number formats, filters and frozen panes.

use super::cell;
use super::reference::{CellRef, SheetRange};
use super::styles::{CellAlignment, CellBorder, CellFill, CellFont, CellStyle};
use super::XlsxWorkbook;
use crate::error::Result;
use crate::model::Color;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Formatting for one area.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatArea {
    pub name: String,
    /// `Sheet:A1:G10` or `Sheet!A1:G10`.
    pub range: String,
    /// Whether the first row of the area is a header.
    pub header_row: bool,
    /// Applied to numeric cells only.
    pub number_format: Option<String>,
    pub alignment: Option<CellAlignment>,
    pub font: Option<CellFont>,
    pub header_font: Option<CellFont>,
    pub header_fill: Option<CellFill>,
    pub border: Option<CellBorder>,
    pub auto_filter: bool,
    pub freeze_panes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    pub areas: Vec<FormatArea>,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            areas: vec![
                FormatArea {
                    name: "区域1".to_string(),
                    range: "Sheet1:A1:G10".to_string(),
                    header_row: true,
                    number_format: Some("#,##0.00".to_string()),
                    alignment: Some(CellAlignment::new("center", "center")),
                    font: Some(CellFont::default()),
                    header_font: Some(CellFont {
                        size: 12.0,
                        bold: true,
                        ..Default::default()
                    }),
                    header_fill: Some(CellFill::solid(Color([0xDD, 0xEB, 0xF7]))),
                    border: Some(CellBorder::default()),
                    auto_filter: true,
                    freeze_panes: Some("A2".to_string()),
                },
                FormatArea {
                    name: "区域2".to_string(),
                    range: "Sheet2:B2:E20".to_string(),
                    header_row: false,
                    number_format: Some("0.00%".to_string()),
                    alignment: Some(CellAlignment::new("right", "center")),
                    font: Some(CellFont {
                        name: "Calibri".to_string(),
                        size: 10.0,
                        ..Default::default()
                    }),
                    header_font: None,
                    header_fill: None,
                    border: Some(CellBorder {
                        style: "medium".to_string(),
                        color: Color([0x44, 0x72, 0xC4]),
                    }),
                    auto_filter: false,
                    freeze_panes: None,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedArea {
    pub name: String,
    pub sheet: String,
    pub range: String,
    pub cells: usize,
    pub auto_filter: bool,
    pub frozen_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormatReport {
    pub areas: Vec<FormattedArea>,
    /// Areas skipped, with the reason.
    pub skipped: Vec<(String, String)>,
}

impl FormatArea {
    fn style_for(&self, header: bool, numeric: bool) -> CellStyle {
        let (font, fill) = if header {
            (self.header_font.clone(), self.header_fill.clone())
        } else {
            (self.font.clone(), None)
        };
        CellStyle {
            number_format: self.number_format.clone().filter(|_| numeric),
            font,
            fill,
            border: self.border.clone(),
            alignment: self.alignment.clone(),
        }
    }
}

/// Apply every configured area; areas with a bad range or an unknown sheet
/// are skipped.
pub fn format_cells(workbook: &mut XlsxWorkbook, config: &FormatConfig) -> Result<FormatReport> {
    let mut report = FormatReport::default();
    for (i, settings) in config.areas.iter().enumerate() {
        let name = if settings.name.is_empty() {
            format!("#{}", i + 1)
        } else {
            settings.name.clone()
        };

        let (sheet_name, area) = match SheetRange::parse(&settings.range) {
            Ok(SheetRange {
                sheet: Some(sheet),
                area,
            }) => (sheet, area),
            _ => {
                warn!(area = %name, range = %settings.range, "invalid range, expected Sheet:A1:B2");
                report
                    .skipped
                    .push((name, format!("invalid range: {}", settings.range)));
                continue;
            }
        };
        let Ok(index) = workbook.sheet_index(&sheet_name) else {
            warn!(area = %name, sheet = %sheet_name, "worksheet not found");
            report
                .skipped
                .push((name, format!("worksheet not found: {}", sheet_name)));
            continue;
        };
        let freeze = match settings.freeze_panes.as_deref().map(CellRef::parse).transpose() {
            Ok(freeze) => freeze,
            Err(e) => {
                warn!(area = %name, error = %e, "invalid freeze cell");
                report.skipped.push((name, e.to_string()));
                continue;
            }
        };

        let sheet = &mut workbook.sheets[index];
        let Some(area) = sheet.worksheet.used_part(area) else {
            debug!(area = %name, "area outside used range");
            continue;
        };

        let mut derived: HashMap<(u32, bool, bool), u32> = HashMap::new();
        let mut cells = 0;
        for at in area.cells() {
            let header = settings.header_row && at.row == area.min_row;
            let (base, numeric) = match sheet.worksheet.cell(at) {
                Some(c) => (
                    cell::style_index(c),
                    matches!(cell::read_value(c, &workbook.strings), cell::CellValue::Number(_)),
                ),
                None => (0, false),
            };
            let style = *derived
                .entry((base, header, numeric))
                .or_insert_with(|| workbook.styles.derive(base, &settings.style_for(header, numeric)));
            sheet.worksheet.set_style(at, style);
            cells += 1;
        }

        if settings.auto_filter {
            sheet.worksheet.set_auto_filter(area);
        }
        if let Some(at) = freeze {
            sheet.worksheet.freeze_panes(at);
        }
        info!(area = %name, sheet = %sheet_name, range = %area, cells, "formatted area");
        report.areas.push(FormattedArea {
            name,
            sheet: sheet_name,
            range: area.to_string(),
            cells,
            auto_filter: settings.auto_filter,
            frozen_at: freeze.map(|at| at.to_string()),
        });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xlsx::cell::CellValue;

    fn workbook() -> XlsxWorkbook {
        let mut wb = XlsxWorkbook::blank().unwrap();
        let ws = &mut wb.sheets[0].worksheet;
        ws.set_value(CellRef::new(1, 1), &CellValue::Text("产品".into()), &mut wb.strings);
        ws.set_value(CellRef::new(1, 2), &CellValue::Text("金额".into()), &mut wb.strings);
        ws.set_value(CellRef::new(2, 1), &CellValue::Text("甲".into()), &mut wb.strings);
        ws.set_value(CellRef::new(2, 2), &CellValue::Number(1234.5), &mut wb.strings);
        wb
    }

    fn font_of(wb: &XlsxWorkbook, at: CellRef) -> String {
        let xf = wb.styles.xf(wb.sheets[0].worksheet.style(at));
        xf.attr("fontId").unwrap_or("0").to_string()
    }

    #[test]
    fn test_default_config_formats_first_area() {
        let mut wb = workbook();
        let report = format_cells(&mut wb, &FormatConfig::default()).unwrap();
        assert_eq!(report.areas.len(), 1);
        assert_eq!(report.areas[0].cells, 70);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].1.contains("Sheet2"));

        let a1 = CellRef::new(1, 1);
        let a2 = CellRef::new(2, 1);
        let b2 = CellRef::new(2, 2);
        assert_ne!(font_of(&wb, a1), font_of(&wb, a2));
        assert_eq!(font_of(&wb, a2), font_of(&wb, b2));

        let ws = &wb.sheets[0].worksheet;
        assert_eq!(wb.styles.format_code(wb.styles.num_fmt_id(ws.style(b2))).as_deref(), Some("#,##0.00"));
        assert_eq!(wb.styles.num_fmt_id(ws.style(a2)), 0);
        // empty cells in the area get the border too
        assert_ne!(ws.style(CellRef::new(10, 7)), 0);

        let root = &ws.document().root;
        assert_eq!(root.child("autoFilter").unwrap().attr("ref"), Some("A1:G10"));
        assert_eq!(root.find("pane").unwrap().attr("topLeftCell"), Some("A2"));
    }

    #[test]
    fn test_repeated_formatting_reuses_records() {
        let mut wb = workbook();
        format_cells(&mut wb, &FormatConfig::default()).unwrap();
        let count = wb.styles.xf_count();
        format_cells(&mut wb, &FormatConfig::default()).unwrap();
        assert_eq!(wb.styles.xf_count(), count);
    }

    #[test]
    fn test_invalid_range_skipped() {
        let mut wb = workbook();
        let config: FormatConfig = toml::from_str(
            r##"
[[areas]]
name = "坏区域"
range = "A1:B2"

[[areas]]
name = "列"
range = "Sheet1:B:B"
number_format = "0.0"

[areas.border]
style = "dashed"
color = "#FF0000"
"##,
        )
        .unwrap();
        let report = format_cells(&mut wb, &config).unwrap();
        assert_eq!(report.skipped[0].0, "坏区域");
        assert_eq!(report.areas[0].range, "B1:B2");
        let ws = &wb.sheets[0].worksheet;
        let xf = wb.styles.xf(ws.style(CellRef::new(2, 2)));
        assert_eq!(xf.attr("applyBorder"), Some("1"));
    }
}
