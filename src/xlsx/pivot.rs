//! Preparing a workbook for a pivot table: a named table over the source
//! data and a sheet describing the intended layout.
//!
//! No pivot cache is written; the table is created in the application from
//! the instructions placed on the pivot sheet.

use super::cell::CellValue;
use super::reference::{Area, CellRef};
use super::styles::{CellFont, CellStyle};
use super::worksheet::{RELATIONSHIPS_NS, SPREADSHEET_NS};
use super::XlsxWorkbook;
use crate::error::Result;
use crate::package::relative_target;
use crate::xml::{Element, XmlDocument};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const TABLE_NAME: &str = "DataTable";
const TABLE_STYLE: &str = "TableStyleMedium9";
const TABLE_REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/table";
const TABLE_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.table+xml";
const COLUMN_WIDTH: f64 = 15.0;
const WIDENED_COLUMNS: u32 = 19;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PivotSource {
    pub sheet: String,
    pub range: String,
    pub has_headers: bool,
}

impl Default for PivotSource {
    fn default() -> Self {
        Self {
            sheet: "数据".to_string(),
            range: "A1:F100".to_string(),
            has_headers: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PivotLayout {
    /// Created when missing.
    pub sheet: String,
    pub location: String,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    /// Field and aggregation, e.g. `["销售额", "sum"]`.
    pub values: Vec<(String, String)>,
    pub filters: Vec<String>,
}

impl Default for PivotLayout {
    fn default() -> Self {
        Self {
            sheet: "数据透视表".to_string(),
            location: "A3".to_string(),
            rows: vec!["部门".to_string(), "姓名".to_string()],
            columns: vec!["月份".to_string()],
            values: vec![
                ("销售额".to_string(), "sum".to_string()),
                ("数量".to_string(), "count".to_string()),
            ],
            filters: vec!["产品类别".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PivotConfig {
    pub source: PivotSource,
    pub pivot: PivotLayout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PivotReport {
    /// `'Sheet'!A1:F100`
    pub source: String,
    /// False when a table of the same name already existed.
    pub table_created: bool,
    pub pivot_sheet: String,
    pub sheet_created: bool,
}

/// Names of the tables already in the package.
fn table_names(workbook: &XlsxWorkbook) -> Result<Vec<(String, u32)>> {
    let package = workbook.package();
    let mut names = Vec::new();
    for part in package.list_files_with_prefix("xl/tables/") {
        if !part.ends_with(".xml") {
            continue;
        }
        let doc = package.parse_xml_part(&part)?;
        let id = doc.root.attr("id").and_then(|v| v.parse().ok()).unwrap_or(0);
        if let Some(name) = doc.root.attr("displayName").or_else(|| doc.root.attr("name")) {
            names.push((name.to_string(), id));
        }
    }
    Ok(names)
}

/// Column names for the table header; blanks and repeats are made unique.
fn column_names(workbook: &XlsxWorkbook, sheet: usize, area: Area, has_headers: bool) -> Vec<String> {
    let worksheet = &workbook.sheets[sheet].worksheet;
    let mut names: Vec<String> = Vec::new();
    for (i, col) in (area.min_col..=area.max_col).enumerate() {
        let header = if has_headers {
            worksheet.value(CellRef::new(area.min_row, col), &workbook.strings)
        } else {
            CellValue::Empty
        };
        let base = match header {
            CellValue::Empty => format!("Column{}", i + 1),
            value => value.to_string(),
        };
        let mut name = base.clone();
        let mut n = 2;
        while names.iter().any(|existing| existing.eq_ignore_ascii_case(&name)) {
            name = format!("{}{}", base, n);
            n += 1;
        }
        names.push(name);
    }
    names
}

fn add_table(workbook: &mut XlsxWorkbook, sheet: usize, area: Area, has_headers: bool) -> Result<()> {
    let id = table_names(workbook)?.iter().map(|(_, id)| *id).max().unwrap_or(0) + 1;
    let reference = area.to_string();

    let mut columns = Element::new("tableColumns").with_attr("count", area.cols().to_string());
    for (i, name) in column_names(workbook, sheet, area, has_headers).into_iter().enumerate() {
        columns.push(
            Element::new("tableColumn")
                .with_attr("id", (i + 1).to_string())
                .with_attr("name", name),
        );
    }
    let mut table = Element::new("table")
        .with_attr("xmlns", SPREADSHEET_NS)
        .with_attr("id", id.to_string())
        .with_attr("name", TABLE_NAME)
        .with_attr("displayName", TABLE_NAME)
        .with_attr("ref", reference.as_str());
    if has_headers {
        table.push(Element::new("autoFilter").with_attr("ref", reference.as_str()));
    } else {
        table.set_attr("headerRowCount", "0");
    }
    table.push(columns);
    table.push(
        Element::new("tableStyleInfo")
            .with_attr("name", TABLE_STYLE)
            .with_attr("showFirstColumn", "0")
            .with_attr("showLastColumn", "0")
            .with_attr("showRowStripes", "1")
            .with_attr("showColumnStripes", "0"),
    );

    let sheet_part = workbook.sheets[sheet].worksheet.part.clone();
    let package = workbook.package_mut();
    let part = package.next_part_name("xl/tables", "table", "xml");
    package.write_xml_part(&part, &XmlDocument::new(table))?;
    package.add_override(&part, TABLE_CONTENT_TYPE)?;
    let rel_id = package.add_relationship(&sheet_part, TABLE_REL_TYPE, &relative_target(&sheet_part, &part))?;

    let worksheet = &mut workbook.sheets[sheet].worksheet;
    let root = worksheet.root_mut();
    if root.attr("xmlns:r").is_none() {
        root.set_attr("xmlns:r", RELATIONSHIPS_NS);
    }
    worksheet.add_table_part(&rel_id);
    debug!(part = %part, reference = %reference, "added table");
    Ok(())
}

/// Add the `DataTable` table over the source range and write the pivot sheet.
pub fn create_pivot_table(workbook: &mut XlsxWorkbook, config: &PivotConfig) -> Result<PivotReport> {
    let source_sheet = workbook.sheet_index(&config.source.sheet)?;
    let area = Area::parse(&config.source.range)?;
    let location = CellRef::parse(&config.pivot.location)?;
    let source = format!("'{}'!{}", config.source.sheet, area);

    let table_created = if table_names(workbook)?.iter().any(|(name, _)| name == TABLE_NAME) {
        info!(table = TABLE_NAME, "table already exists, reusing it");
        false
    } else {
        add_table(workbook, source_sheet, area, config.source.has_headers)?;
        true
    };

    let layout = &config.pivot;
    let (sheet, sheet_created) = match workbook.sheet_index(&layout.sheet) {
        Ok(index) => (index, false),
        Err(_) => (workbook.add_sheet(&layout.sheet)?, true),
    };

    let title = workbook.styles.derive(
        0,
        &CellStyle {
            font: Some(CellFont {
                size: 14.0,
                bold: true,
                ..Default::default()
            }),
            ..Default::default()
        },
    );
    let bold = workbook.styles.derive(
        0,
        &CellStyle {
            font: Some(CellFont {
                bold: true,
                ..Default::default()
            }),
            ..Default::default()
        },
    );

    let rows = layout.rows.join(", ");
    let columns = layout.columns.join(", ");
    let values = layout
        .values
        .iter()
        .map(|(field, aggregate)| format!("{}({})", field, aggregate))
        .collect::<Vec<_>>()
        .join(", ");
    let filters = layout.filters.join(", ");

    // (label, value, bold)
    let mut lines: Vec<(String, Option<String>, bool)> = vec![
        ("数据透视表设置:".to_string(), None, true),
        ("数据源:".to_string(), Some(source.clone()), false),
        ("行字段:".to_string(), Some(rows.clone()), false),
        ("列字段:".to_string(), Some(columns.clone()), false),
        ("值字段:".to_string(), Some(values.clone()), false),
    ];
    if !layout.filters.is_empty() {
        lines.push(("筛选字段:".to_string(), Some(filters.clone()), false));
    }
    let mut steps = vec![
        "使用说明:".to_string(),
        "1. 此文件包含数据透视表的定义，但数据透视表结果需要在Excel中计算。".to_string(),
        "2. 请在Excel中打开此文件，然后按照以下步骤创建数据透视表:".to_string(),
        "   a. 选择'插入'选项卡".to_string(),
        format!("   b. 点击'数据透视表'，数据源选择{}", source),
        format!("   c. 位置选择'{}'!{}", layout.sheet, location),
        "   d. 在数据透视表字段列表中，将字段拖到相应的区域".to_string(),
        format!("      - 行区域: {}", rows),
        format!("      - 列区域: {}", columns),
        format!("      - 值区域: {}", values),
    ];
    if !layout.filters.is_empty() {
        steps.push(format!("      - 筛选区域: {}", filters));
    }

    let worksheet = &mut workbook.sheets[sheet].worksheet;
    let strings = &mut workbook.strings;
    let a1 = CellRef::new(1, 1);
    worksheet.set_value(a1, &CellValue::Text("数据透视表".into()), strings);
    worksheet.set_style(a1, title);
    worksheet.set_columns_width(1, WIDENED_COLUMNS, COLUMN_WIDTH);
    worksheet.set_value(location, &CellValue::Text("数据透视表将在此处创建".into()), strings);

    let mut row = location.row + 2;
    for (label, value, is_bold) in lines {
        let at = CellRef::new(row, 1);
        worksheet.set_value(at, &CellValue::Text(label), strings);
        if is_bold {
            worksheet.set_style(at, bold);
        }
        if let Some(value) = value {
            worksheet.set_value(CellRef::new(row, 2), &CellValue::Text(value), strings);
        }
        row += 1;
    }
    row += 2;
    for (i, step) in steps.into_iter().enumerate() {
        let at = CellRef::new(row, 1);
        worksheet.set_value(at, &CellValue::Text(step), strings);
        if i == 0 {
            worksheet.set_style(at, bold);
        }
        row += 1;
    }

    info!(source = %source, sheet = %layout.sheet, table_created, "pivot table prepared");
    Ok(PivotReport {
        source,
        table_created,
        pivot_sheet: layout.sheet.clone(),
        sheet_created,
    })
}
