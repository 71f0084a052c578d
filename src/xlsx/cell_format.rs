//! Named format templates, type-driven formatting, conditional formats and
//! other per-range format operations.

use super::cell::{self, CellValue};
use super::reference::{Area, CellRef};
use super::styles::{CellAlignment, CellBorder, CellFill, CellFont, CellStyle};
use super::worksheet::Worksheet;
use super::XlsxWorkbook;
use crate::error::{Error, Result};
use crate::model::Color;
use crate::xml::Element;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static CURRENCY_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[$¥€£]").expect("invalid regex"));
static CURRENCY_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+(\.[0-9]{2})?\s*[$¥€£]$").expect("invalid regex"));
static PERCENTAGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9.]+%$").expect("invalid regex"));
static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{4}[-/]\d{1,2}[-/]\d{1,2}|\d{1,2}[-/]\d{1,2}[-/]\d{4}|\d{1,2}[-/]\d{1,2}[-/]\d{2})")
        .expect("invalid regex")
});

/// What a cell value looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Number,
    Percentage,
    Date,
    Currency,
    Text,
}

impl CellKind {
    /// Format applied by `smart_format` for this kind.
    fn style(self) -> CellStyle {
        let (number_format, horizontal) = match self {
            CellKind::Number | CellKind::Currency => (Some("#,##0.00"), "right"),
            CellKind::Percentage => (Some("0.00%"), "center"),
            CellKind::Date => (Some("yyyy-mm-dd"), "center"),
            CellKind::Text => (None, "left"),
        };
        CellStyle {
            number_format: number_format.map(String::from),
            alignment: Some(CellAlignment::new(horizontal, "center")),
            ..Default::default()
        }
    }
}

/// Classify a value; numbers between 0 and 1 count as percentages.
pub fn detect_kind(value: &CellValue, is_date_style: bool) -> CellKind {
    match value {
        CellValue::Number(_) if is_date_style => CellKind::Date,
        CellValue::Number(n) if (0.0..=1.0).contains(n) => CellKind::Percentage,
        CellValue::Number(_) => CellKind::Number,
        CellValue::Text(s) => {
            if CURRENCY_PREFIX.is_match(s) || CURRENCY_SUFFIX.is_match(s) {
                CellKind::Currency
            } else if PERCENTAGE.is_match(s) {
                CellKind::Percentage
            } else if DATE.is_match(s) {
                CellKind::Date
            } else {
                CellKind::Text
            }
        }
        _ => CellKind::Text,
    }
}

fn default_detect_types() -> Vec<CellKind> {
    vec![CellKind::Number, CellKind::Date, CellKind::Percentage, CellKind::Text]
}

fn default_even_color() -> Color {
    Color([0xF2, 0xF2, 0xF2])
}

fn default_odd_color() -> Color {
    Color([0xFF, 0xFF, 0xFF])
}

fn default_validation_type() -> String {
    "list".to_string()
}

fn default_rule_type() -> String {
    "cell_value".to_string()
}

/// A conditional format rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRule {
    /// Only `cell_value` (a `cellIs` rule) is supported.
    #[serde(rename = "type", default = "default_rule_type")]
    pub kind: String,
    pub operator: String,
    pub formula: String,
    /// Second bound for `between` and `notBetween`.
    #[serde(default)]
    pub formula2: Option<String>,
    #[serde(default)]
    pub font_color: Option<Color>,
    #[serde(default)]
    pub fill_color: Option<Color>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormatOperation {
    ApplyTemplate {
        sheet: String,
        range: String,
        template: String,
    },
    SmartFormat {
        sheet: String,
        range: String,
        #[serde(default = "default_detect_types")]
        detect_types: Vec<CellKind>,
    },
    ConditionalFormat {
        sheet: String,
        range: String,
        rules: Vec<ConditionRule>,
    },
    CopyFormat {
        sheet: String,
        source_range: String,
        target_range: String,
    },
    ClearFormat {
        sheet: String,
        range: String,
    },
    AlternateRows {
        sheet: String,
        range: String,
        #[serde(default = "default_even_color")]
        even_color: Color,
        #[serde(default = "default_odd_color")]
        odd_color: Color,
    },
    DataValidation {
        sheet: String,
        range: String,
        #[serde(default = "default_validation_type")]
        validation_type: String,
        formula1: String,
    },
}

impl FormatOperation {
    pub fn name(&self) -> &'static str {
        match self {
            FormatOperation::ApplyTemplate { .. } => "apply_template",
            FormatOperation::SmartFormat { .. } => "smart_format",
            FormatOperation::ConditionalFormat { .. } => "conditional_format",
            FormatOperation::CopyFormat { .. } => "copy_format",
            FormatOperation::ClearFormat { .. } => "clear_format",
            FormatOperation::AlternateRows { .. } => "alternate_rows",
            FormatOperation::DataValidation { .. } => "data_validation",
        }
    }

    pub fn sheet(&self) -> &str {
        match self {
            FormatOperation::ApplyTemplate { sheet, .. }
            | FormatOperation::SmartFormat { sheet, .. }
            | FormatOperation::ConditionalFormat { sheet, .. }
            | FormatOperation::CopyFormat { sheet, .. }
            | FormatOperation::ClearFormat { sheet, .. }
            | FormatOperation::AlternateRows { sheet, .. }
            | FormatOperation::DataValidation { sheet, .. } => sheet,
        }
    }
}

fn template(
    number_format: Option<&str>,
    font: CellFont,
    alignment: (&str, &str),
    fill: Option<Color>,
    border: Option<(&str, Color)>,
) -> CellStyle {
    CellStyle {
        number_format: number_format.map(String::from),
        font: Some(font),
        fill: fill.map(CellFill::solid),
        border: border.map(|(style, color)| CellBorder {
            style: style.to_string(),
            color,
        }),
        alignment: Some(CellAlignment::new(alignment.0, alignment.1)),
    }
}

/// The built-in templates.
pub fn default_templates() -> BTreeMap<String, CellStyle> {
    let black = Color([0, 0, 0]);
    let arial = |size: f64, bold: bool| CellFont {
        size,
        bold,
        ..Default::default()
    };
    BTreeMap::from([
        (
            "货币".to_string(),
            template(Some("#,##0.00"), arial(10.0, false), ("right", "center"), None, None),
        ),
        (
            "百分比".to_string(),
            template(Some("0.00%"), arial(10.0, false), ("center", "center"), None, None),
        ),
        (
            "日期".to_string(),
            template(Some("yyyy-mm-dd"), arial(10.0, false), ("center", "center"), None, None),
        ),
        (
            "标题".to_string(),
            template(
                None,
                arial(12.0, true),
                ("center", "center"),
                Some(Color([0xDD, 0xEB, 0xF7])),
                Some(("thin", black)),
            ),
        ),
        (
            "正文".to_string(),
            template(None, arial(10.0, false), ("left", "center"), None, Some(("thin", black))),
        ),
        (
            "强调".to_string(),
            template(
                None,
                CellFont {
                    color: Color([0xFF, 0, 0]),
                    ..arial(10.0, true)
                },
                ("center", "center"),
                None,
                Some(("medium", black)),
            ),
        ),
    ])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellFormatConfig {
    pub templates: BTreeMap<String, CellStyle>,
    pub operations: Vec<FormatOperation>,
}

impl Default for CellFormatConfig {
    fn default() -> Self {
        let green = Color([0x00, 0xFF, 0x00]);
        let red = Color([0xFF, 0x00, 0x00]);
        Self {
            templates: default_templates(),
            operations: vec![
                FormatOperation::ApplyTemplate {
                    sheet: "Sheet1".to_string(),
                    range: "A1:G1".to_string(),
                    template: "标题".to_string(),
                },
                FormatOperation::SmartFormat {
                    sheet: "Sheet1".to_string(),
                    range: "B2:B20".to_string(),
                    detect_types: default_detect_types(),
                },
                FormatOperation::ConditionalFormat {
                    sheet: "Sheet1".to_string(),
                    range: "C2:C20".to_string(),
                    rules: vec![
                        ConditionRule {
                            kind: default_rule_type(),
                            operator: "greaterThan".to_string(),
                            formula: "100".to_string(),
                            formula2: None,
                            font_color: Some(green),
                            fill_color: Some(Color([0xE2, 0xEF, 0xDA])),
                        },
                        ConditionRule {
                            kind: default_rule_type(),
                            operator: "lessThan".to_string(),
                            formula: "0".to_string(),
                            formula2: None,
                            font_color: Some(red),
                            fill_color: Some(Color([0xFF, 0xCC, 0xCC])),
                        },
                    ],
                },
                FormatOperation::CopyFormat {
                    sheet: "Sheet1".to_string(),
                    source_range: "A1:G1".to_string(),
                    target_range: "A10:G10".to_string(),
                },
                FormatOperation::ClearFormat {
                    sheet: "Sheet1".to_string(),
                    range: "D5:D15".to_string(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    /// Position in the operation list, from 1.
    pub index: usize,
    pub operation: &'static str,
    pub sheet: String,
    /// Cells touched, or rules added for conditional formats.
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CellFormatReport {
    pub applied: Vec<OperationResult>,
    /// Skipped operations by position, with the reason.
    pub skipped: Vec<(usize, String)>,
}

/// Derives styles for a sheet, reusing results for repeated base styles.
struct Styler<'a> {
    workbook: &'a mut XlsxWorkbook,
    sheet: usize,
}

impl Styler<'_> {
    fn worksheet(&mut self) -> &mut Worksheet {
        &mut self.workbook.sheets[self.sheet].worksheet
    }

    /// The parsed range, whole rows and columns cut to the used extent.
    fn used_area(&mut self, range: &str) -> Result<Option<Area>> {
        let area = Area::parse(range)?;
        Ok(self.worksheet().used_part(area))
    }

    /// Apply `style` on top of each cell's format; cells are created as needed.
    fn apply(&mut self, cells: impl Iterator<Item = CellRef>, style: &CellStyle) -> usize {
        let mut derived: HashMap<u32, u32> = HashMap::new();
        let mut count = 0;
        for at in cells {
            let base = self.worksheet().style(at);
            let index = *derived
                .entry(base)
                .or_insert_with(|| self.workbook.styles.derive(base, style));
            self.worksheet().set_style(at, index);
            count += 1;
        }
        count
    }
}

fn run_operation(
    workbook: &mut XlsxWorkbook,
    sheet: usize,
    operation: &FormatOperation,
    templates: &BTreeMap<String, CellStyle>,
) -> Result<usize> {
    let mut styler = Styler { workbook, sheet };
    let count = match operation {
        FormatOperation::ApplyTemplate { range, template, .. } => {
            let area = styler.used_area(range)?;
            match (area, templates.get(template)) {
                (None, _) => 0,
                (Some(area), Some(style)) => styler.apply(area.cells(), style),
                (Some(_), None) => {
                    warn!(template = %template, "unknown template, nothing applied");
                    0
                }
            }
        }
        FormatOperation::SmartFormat {
            range, detect_types, ..
        } => {
            let Some(area) = styler.used_area(range)? else {
                return Ok(0);
            };
            let mut groups: BTreeMap<CellKind, Vec<CellRef>> = BTreeMap::new();
            {
                let wb = &*styler.workbook;
                let ws = &wb.sheets[sheet].worksheet;
                for at in area.cells() {
                    let Some(c) = ws.cell(at) else { continue };
                    let value = cell::read_value(c, &wb.strings);
                    if value.is_empty() {
                        continue;
                    }
                    let kind = detect_kind(&value, wb.styles.is_date_style(cell::style_index(c)));
                    if detect_types.contains(&kind) {
                        groups.entry(kind).or_default().push(at);
                    }
                }
            }
            let mut count = 0;
            for (kind, cells) in groups {
                debug!(kind = ?kind, cells = cells.len(), "smart format");
                count += styler.apply(cells.into_iter(), &kind.style());
            }
            count
        }
        FormatOperation::ConditionalFormat { range, rules, .. } => {
            let area = Area::parse(range)?;
            let mut elements = Vec::new();
            for rule in rules {
                if rule.kind != "cell_value" {
                    warn!(kind = %rule.kind, "unsupported conditional rule skipped");
                    continue;
                }
                let dxf = styler.workbook.styles.add_dxf(rule.font_color, rule.fill_color);
                let mut element = Element::new("cfRule")
                    .with_attr("type", "cellIs")
                    .with_attr("dxfId", dxf.to_string())
                    .with_attr("operator", rule.operator.as_str())
                    .with_child(Element::new("formula").with_text(rule.formula.as_str()));
                if let Some(second) = &rule.formula2 {
                    element.push(Element::new("formula").with_text(second.as_str()));
                }
                elements.push(element);
            }
            let count = elements.len();
            if count > 0 {
                styler.worksheet().add_conditional_format(area, elements);
            }
            count
        }
        FormatOperation::CopyFormat {
            source_range,
            target_range,
            ..
        } => {
            let Some(source) = styler.used_area(source_range)? else {
                return Ok(0);
            };
            let target = Area::parse(target_range)?;
            let rows = source.rows().min(target.rows());
            let cols = source.cols().min(target.cols());
            let ws = styler.worksheet();
            for r in 0..rows {
                for c in 0..cols {
                    let style = ws.style(CellRef::new(source.min_row + r, source.min_col + c));
                    ws.set_style(CellRef::new(target.min_row + r, target.min_col + c), style);
                }
            }
            rows as usize * cols as usize
        }
        FormatOperation::ClearFormat { range, .. } => {
            let Some(area) = styler.used_area(range)? else {
                return Ok(0);
            };
            let ws = styler.worksheet();
            let mut count = 0;
            for at in area.cells() {
                if let Some(c) = ws.cell_mut(at) {
                    cell::set_style_index(c, 0);
                    count += 1;
                }
            }
            count
        }
        FormatOperation::AlternateRows {
            range,
            even_color,
            odd_color,
            ..
        } => {
            let Some(area) = styler.used_area(range)? else {
                return Ok(0);
            };
            let mut count = 0;
            for (i, row) in (area.min_row..=area.max_row).enumerate() {
                let color = if i % 2 == 0 { *even_color } else { *odd_color };
                let style = CellStyle {
                    fill: Some(CellFill::solid(color)),
                    ..Default::default()
                };
                let cells = (area.min_col..=area.max_col).map(|col| CellRef::new(row, col));
                count += styler.apply(cells, &style);
            }
            count
        }
        FormatOperation::DataValidation {
            range,
            validation_type,
            formula1,
            ..
        } => {
            let area = Area::parse(range)?;
            let formula = validation_formula(validation_type, formula1);
            styler.worksheet().add_data_validation(
                Element::new("dataValidation")
                    .with_attr("type", validation_type.as_str())
                    .with_attr("allowBlank", "1")
                    .with_attr("showErrorMessage", "1")
                    .with_attr("sqref", area.to_string())
                    .with_child(Element::new("formula1").with_text(formula)),
            );
            area.rows() as usize * area.cols() as usize
        }
    };
    Ok(count)
}

/// A list of literal choices is quoted; references and formulas are kept.
fn validation_formula(validation_type: &str, formula: &str) -> String {
    let formula = formula.trim();
    if let Some(expression) = formula.strip_prefix('=') {
        return expression.to_string();
    }
    if validation_type == "list" && !formula.starts_with('"') && !formula.contains('!') && !formula.contains('$') {
        return format!("\"{}\"", formula);
    }
    formula.to_string()
}

/// Run the configured operations in order. Operations naming an unknown sheet
/// or an invalid range are skipped.
pub fn apply_cell_formats(workbook: &mut XlsxWorkbook, config: &CellFormatConfig) -> Result<CellFormatReport> {
    let mut report = CellFormatReport::default();
    for (i, operation) in config.operations.iter().enumerate() {
        let index = i + 1;
        let sheet_name = operation.sheet();
        let Ok(sheet) = workbook.sheet_index(sheet_name) else {
            warn!(operation = index, sheet = %sheet_name, "worksheet not found, operation skipped");
            report
                .skipped
                .push((index, format!("worksheet not found: {}", sheet_name)));
            continue;
        };
        match run_operation(workbook, sheet, operation, &config.templates) {
            Ok(count) => {
                info!(operation = index, kind = operation.name(), sheet = %sheet_name, count, "format operation done");
                report.applied.push(OperationResult {
                    index,
                    operation: operation.name(),
                    sheet: sheet_name.to_string(),
                    count,
                });
            }
            Err(Error::InvalidReference(reference)) => {
                warn!(operation = index, reference = %reference, "invalid range, operation skipped");
                report
                    .skipped
                    .push((index, format!("invalid range: {}", reference)));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workbook() -> XlsxWorkbook {
        let mut wb = XlsxWorkbook::blank().unwrap();
        let values = [
            ("A1", CellValue::Text("项目".into())),
            ("B2", CellValue::Number(1234.5)),
            ("B3", CellValue::Number(0.25)),
            ("B4", CellValue::Text("2024-03-01".into())),
            ("B5", CellValue::Text("¥300".into())),
            ("B6", CellValue::Text("备注".into())),
            ("C2", CellValue::Number(150.0)),
        ];
        for (at, value) in values {
            wb.sheets[0]
                .worksheet
                .set_value(CellRef::parse(at).unwrap(), &value, &mut wb.strings);
        }
        wb
    }

    fn format_of(wb: &XlsxWorkbook, at: &str) -> Option<String> {
        let style = wb.sheets[0].worksheet.style(CellRef::parse(at).unwrap());
        wb.styles.format_code(wb.styles.num_fmt_id(style))
    }

    #[test]
    fn test_detect_kind() {
        assert_eq!(detect_kind(&CellValue::Number(0.5), false), CellKind::Percentage);
        assert_eq!(detect_kind(&CellValue::Number(12.0), false), CellKind::Number);
        assert_eq!(detect_kind(&CellValue::Number(45000.0), true), CellKind::Date);
        assert_eq!(detect_kind(&"$12".into(), false), CellKind::Currency);
        assert_eq!(detect_kind(&"12.50 €".into(), false), CellKind::Currency);
        assert_eq!(detect_kind(&"12.5%".into(), false), CellKind::Percentage);
        assert_eq!(detect_kind(&"01/02/2024".into(), false), CellKind::Date);
        assert_eq!(detect_kind(&"2024/1/2 备注".into(), false), CellKind::Date);
        assert_eq!(detect_kind(&"编号 2024-01-02".into(), false), CellKind::Text);
    }

    #[test]
    fn test_default_operations() {
        let mut wb = workbook();
        let report = apply_cell_formats(&mut wb, &CellFormatConfig::default()).unwrap();
        assert_eq!(report.applied.len(), 5);
        assert!(report.skipped.is_empty());

        // smart format: currency is not in the default detect types
        assert_eq!(format_of(&wb, "B2").as_deref(), Some("#,##0.00"));
        assert_eq!(format_of(&wb, "B3").as_deref(), Some("0.00%"));
        assert_eq!(format_of(&wb, "B4").as_deref(), Some("yyyy-mm-dd"));
        assert_eq!(format_of(&wb, "B5").as_deref(), Some("General"));
        assert_eq!(report.applied[1].count, 4);

        // the title format was copied to row 10
        let ws = &wb.sheets[0].worksheet;
        assert_ne!(ws.style(CellRef::parse("A1").unwrap()), 0);
        assert_eq!(
            ws.style(CellRef::parse("A10").unwrap()),
            ws.style(CellRef::parse("A1").unwrap())
        );

        let rules = ws.document().root.find_all("cfRule");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].attr("operator"), Some("greaterThan"));
        assert_eq!(rules[1].attr("priority"), Some("2"));
        assert_eq!(wb.styles.document().root.child("dxfs").unwrap().attr("count"), Some("2"));
    }

    #[test]
    fn test_operations_from_json() {
        let mut wb = workbook();
        let config: CellFormatConfig = serde_json::from_str(
            r#"{
                "operations": [
                    {"type": "alternate_rows", "sheet": "Sheet1", "range": "A2:B3"},
                    {"type": "data_validation", "sheet": "Sheet1", "range": "E2:E20", "formula1": "是,否"},
                    {"type": "clear_format", "sheet": "Sheet1", "range": "A2:B2"},
                    {"type": "apply_template", "sheet": "缺失", "range": "A1", "template": "正文"},
                    {"type": "apply_template", "sheet": "Sheet1", "range": "坏", "template": "正文"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.templates.len(), 6);
        let report = apply_cell_formats(&mut wb, &config).unwrap();
        assert_eq!(report.applied.len(), 3);
        assert_eq!(report.skipped.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![4, 5]);

        let ws = &wb.sheets[0].worksheet;
        // A2 and B2 were cleared again, row 3 keeps the odd fill
        assert_eq!(ws.style(CellRef::parse("B2").unwrap()), 0);
        assert_ne!(ws.style(CellRef::parse("B3").unwrap()), 0);
        let validation = ws.document().root.find("dataValidation").unwrap();
        assert_eq!(validation.attr("sqref"), Some("E2:E20"));
        assert_eq!(validation.child("formula1").unwrap().text(), "\"是,否\"");
    }

    #[test]
    fn test_whole_lines_stay_in_used_range() {
        let mut wb = workbook();
        let config: CellFormatConfig = serde_json::from_str(
            r#"{
                "operations": [
                    {"type": "apply_template", "sheet": "Sheet1", "range": "5:5", "template": "正文"},
                    {"type": "alternate_rows", "sheet": "Sheet1", "range": "C:C"},
                    {"type": "copy_format", "sheet": "Sheet1", "source_range": "C:C", "target_range": "H:H"},
                    {"type": "clear_format", "sheet": "Sheet1", "range": "1:1048576"},
                    {"type": "apply_template", "sheet": "Sheet1", "range": "K:K", "template": "正文"},
                    {"type": "data_validation", "sheet": "Sheet1", "range": "1:1048576", "formula1": "1"}
                ]
            }"#,
        )
        .unwrap();
        let report = apply_cell_formats(&mut wb, &config).unwrap();
        let counts: Vec<usize> = report.applied.iter().map(|r| r.count).collect();
        assert_eq!(counts, vec![3, 6, 6, 19, 0, 1_048_576 * 16_384]);
        assert_eq!(wb.sheets[0].worksheet.extent(), (6, 8));
    }

    #[test]
    fn test_validation_formula() {
        assert_eq!(validation_formula("list", "是,否"), "\"是,否\"");
        assert_eq!(validation_formula("list", "=$A$1:$A$5"), "$A$1:$A$5");
        assert_eq!(validation_formula("list", "Sheet2!A1:A5"), "Sheet2!A1:A5");
        assert_eq!(validation_formula("whole", "100"), "100");
    }
}
