//! Cell formats in `xl/styles.xml`.
//!
//! [`Stylesheet`] edits the parsed part directly. New fonts, fills, borders,
//! number formats and `xf` records are appended only when no identical record
//! exists, so repeated formatting of the same range does not grow the file.

use super::cell::CellValue;
use crate::error::Result;
use crate::model::Color;
use crate::xml::{Element, XmlDocument};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

const STYLESHEET_ORDER: &[&str] = &[
    "numFmts",
    "fonts",
    "fills",
    "borders",
    "cellStyleXfs",
    "cellXfs",
    "cellStyles",
    "dxfs",
    "tableStyles",
    "colors",
    "extLst",
];

const XF_ORDER: &[&str] = &["alignment", "protection", "extLst"];

/// First id available to custom number formats.
const FIRST_CUSTOM_FORMAT: u32 = 164;

const BUILTIN_FORMATS: &[(u32, &str)] = &[
    (0, "General"),
    (1, "0"),
    (2, "0.00"),
    (3, "#,##0"),
    (4, "#,##0.00"),
    (9, "0%"),
    (10, "0.00%"),
    (11, "0.00E+00"),
    (12, "# ?/?"),
    (13, "# ??/??"),
    (14, "mm-dd-yy"),
    (15, "d-mmm-yy"),
    (16, "d-mmm"),
    (17, "mmm-yy"),
    (18, "h:mm AM/PM"),
    (19, "h:mm:ss AM/PM"),
    (20, "h:mm"),
    (21, "h:mm:ss"),
    (22, "m/d/yy h:mm"),
    (37, "#,##0 ;(#,##0)"),
    (38, "#,##0 ;[Red](#,##0)"),
    (39, "#,##0.00;(#,##0.00)"),
    (40, "#,##0.00;[Red](#,##0.00)"),
    (45, "mm:ss"),
    (46, "[h]:mm:ss"),
    (47, "mmss.0"),
    (48, "##0.0E+0"),
    (49, "@"),
];

fn black() -> Color {
    Color([0, 0, 0])
}

fn argb(color: &Color) -> String {
    format!("FF{}", color.hex())
}

fn color_element(color: &Color) -> Element {
    Element::new("color").with_attr("rgb", argb(color))
}

/// Font of a cell format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellFont {
    pub name: String,
    pub size: f64,
    pub bold: bool,
    pub italic: bool,
    pub color: Color,
}

impl Default for CellFont {
    fn default() -> Self {
        Self {
            name: "Arial".to_string(),
            size: 11.0,
            bold: false,
            italic: false,
            color: black(),
        }
    }
}

impl CellFont {
    pub fn to_element(&self) -> Element {
        let mut font = Element::new("font");
        if self.bold {
            font.push(Element::new("b"));
        }
        if self.italic {
            font.push(Element::new("i"));
        }
        font.push(Element::new("sz").with_attr("val", super::cell::format_number(self.size)));
        font.push(color_element(&self.color));
        font.push(Element::new("name").with_attr("val", self.name.as_str()));
        font
    }
}

/// Pattern fill; only `solid` carries a colour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellFill {
    #[serde(rename = "type")]
    pub pattern: String,
    pub color: Color,
}

impl Default for CellFill {
    fn default() -> Self {
        Self {
            pattern: "solid".to_string(),
            color: Color([0xFF, 0xFF, 0xFF]),
        }
    }
}

impl CellFill {
    pub fn solid(color: Color) -> Self {
        Self {
            pattern: "solid".to_string(),
            color,
        }
    }

    pub fn to_element(&self) -> Element {
        let mut pattern = Element::new("patternFill").with_attr("patternType", self.pattern.as_str());
        if self.pattern != "none" {
            pattern.push(Element::new("fgColor").with_attr("rgb", argb(&self.color)));
            pattern.push(Element::new("bgColor").with_attr("indexed", "64"));
        }
        Element::new("fill").with_child(pattern)
    }
}

/// The same line on all four sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellBorder {
    pub style: String,
    pub color: Color,
}

impl Default for CellBorder {
    fn default() -> Self {
        Self {
            style: "thin".to_string(),
            color: black(),
        }
    }
}

impl CellBorder {
    pub fn to_element(&self) -> Element {
        let mut border = Element::new("border");
        for side in ["left", "right", "top", "bottom"] {
            border.push(
                Element::new(side)
                    .with_attr("style", self.style.as_str())
                    .with_child(color_element(&self.color)),
            );
        }
        border.push(Element::new("diagonal"));
        border
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellAlignment {
    pub horizontal: String,
    pub vertical: String,
    pub wrap_text: bool,
}

impl Default for CellAlignment {
    fn default() -> Self {
        Self {
            horizontal: "general".to_string(),
            vertical: "bottom".to_string(),
            wrap_text: false,
        }
    }
}

impl CellAlignment {
    pub fn new(horizontal: &str, vertical: &str) -> Self {
        Self {
            horizontal: horizontal.to_string(),
            vertical: vertical.to_string(),
            wrap_text: false,
        }
    }

    pub fn to_element(&self) -> Element {
        let mut alignment = Element::new("alignment");
        if self.horizontal != "general" {
            alignment.set_attr("horizontal", self.horizontal.as_str());
        }
        if self.vertical != "bottom" {
            alignment.set_attr("vertical", self.vertical.as_str());
        }
        if self.wrap_text {
            alignment.set_attr("wrapText", "1");
        }
        alignment
    }
}

/// A set of format changes; absent parts keep the cell's current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellStyle {
    pub number_format: Option<String>,
    pub font: Option<CellFont>,
    pub fill: Option<CellFill>,
    pub border: Option<CellBorder>,
    pub alignment: Option<CellAlignment>,
}

impl CellStyle {
    pub fn is_empty(&self) -> bool {
        self == &CellStyle::default()
    }
}

/// The parsed style part of a workbook.
#[derive(Debug, Clone)]
pub struct Stylesheet {
    doc: XmlDocument,
    modified: bool,
}

impl Stylesheet {
    pub fn parse(xml: &str) -> Result<Self> {
        Ok(Self::from_document(XmlDocument::parse(xml)?))
    }

    pub fn from_document(doc: XmlDocument) -> Self {
        Self {
            doc,
            modified: false,
        }
    }

    pub fn document(&self) -> &XmlDocument {
        &self.doc
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    fn records(&self, collection: &str) -> Vec<&Element> {
        self.doc
            .root
            .child(collection)
            .map(|c| c.elements().collect())
            .unwrap_or_default()
    }

    fn record(&self, collection: &str, index: u32) -> Option<&Element> {
        self.records(collection).get(index as usize).copied()
    }

    /// Index of `record` in `collection`, appending it when no equal record exists.
    fn add_record(&mut self, collection: &str, record: Element) -> u32 {
        if let Some(i) = self.records(collection).iter().position(|e| **e == record) {
            return i as u32;
        }
        let list = self.doc.root.ensure_child_ordered(collection, STYLESHEET_ORDER);
        list.push(record);
        let count = list.elements().count();
        list.set_attr("count", count.to_string());
        self.modified = true;
        (count - 1) as u32
    }

    pub fn xf_count(&self) -> usize {
        self.records("cellXfs").len()
    }

    /// The `xf` at `index`, or the default record when out of range.
    pub fn xf(&self, index: u32) -> Element {
        self.record("cellXfs", index).cloned().unwrap_or_else(|| {
            Element::new("xf")
                .with_attr("numFmtId", "0")
                .with_attr("fontId", "0")
                .with_attr("fillId", "0")
                .with_attr("borderId", "0")
                .with_attr("xfId", "0")
        })
    }

    fn xf_attr(&self, index: u32, key: &str) -> u32 {
        self.record("cellXfs", index)
            .and_then(|xf| xf.attr(key))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Number format id of a cell style index.
    pub fn num_fmt_id(&self, style_index: u32) -> u32 {
        self.xf_attr(style_index, "numFmtId")
    }

    /// Format code for a number format id, built-in or custom.
    pub fn format_code(&self, num_fmt_id: u32) -> Option<String> {
        if let Some((_, code)) = BUILTIN_FORMATS.iter().find(|(id, _)| *id == num_fmt_id) {
            return Some(code.to_string());
        }
        self.records("numFmts")
            .into_iter()
            .find(|e| e.attr("numFmtId").and_then(|v| v.parse().ok()) == Some(num_fmt_id))
            .and_then(|e| e.attr("formatCode"))
            .map(String::from)
    }

    /// Id for a format code, registering a custom format when needed.
    pub fn number_format(&mut self, code: &str) -> u32 {
        if let Some((id, _)) = BUILTIN_FORMATS.iter().find(|(_, c)| *c == code) {
            return *id;
        }
        let custom = self.records("numFmts");
        if let Some(id) = custom
            .iter()
            .find(|e| e.attr("formatCode") == Some(code))
            .and_then(|e| e.attr("numFmtId"))
            .and_then(|v| v.parse().ok())
        {
            return id;
        }
        let id = custom
            .iter()
            .filter_map(|e| e.attr("numFmtId").and_then(|v| v.parse::<u32>().ok()))
            .max()
            .map_or(FIRST_CUSTOM_FORMAT, |max| (max + 1).max(FIRST_CUSTOM_FORMAT));
        self.add_record(
            "numFmts",
            Element::new("numFmt")
                .with_attr("numFmtId", id.to_string())
                .with_attr("formatCode", code),
        );
        id
    }

    pub fn add_font(&mut self, font: &CellFont) -> u32 {
        self.add_record("fonts", font.to_element())
    }

    pub fn add_fill(&mut self, fill: &CellFill) -> u32 {
        self.add_record("fills", fill.to_element())
    }

    pub fn add_border(&mut self, border: &CellBorder) -> u32 {
        self.add_record("borders", border.to_element())
    }

    /// Style index for `base` with `style` applied on top.
    pub fn derive(&mut self, base: u32, style: &CellStyle) -> u32 {
        if style.is_empty() {
            return base;
        }
        let mut xf = self.xf(base);
        if let Some(code) = &style.number_format {
            let id = self.number_format(code);
            xf.set_attr("numFmtId", id.to_string());
            xf.set_attr("applyNumberFormat", "1");
        }
        if let Some(font) = &style.font {
            xf.set_attr("fontId", self.add_font(font).to_string());
            xf.set_attr("applyFont", "1");
        }
        if let Some(fill) = &style.fill {
            xf.set_attr("fillId", self.add_fill(fill).to_string());
            xf.set_attr("applyFill", "1");
        }
        if let Some(border) = &style.border {
            xf.set_attr("borderId", self.add_border(border).to_string());
            xf.set_attr("applyBorder", "1");
        }
        if let Some(alignment) = &style.alignment {
            xf.replace_child_ordered(alignment.to_element(), XF_ORDER);
            xf.set_attr("applyAlignment", "1");
        }
        self.add_record("cellXfs", xf)
    }

    /// A differential format for conditional formatting.
    pub fn add_dxf(&mut self, font_color: Option<Color>, fill_color: Option<Color>) -> u32 {
        let mut dxf = Element::new("dxf");
        if let Some(color) = font_color {
            dxf.push(Element::new("font").with_child(color_element(&color)));
        }
        if let Some(color) = fill_color {
            dxf.push(
                Element::new("fill").with_child(
                    Element::new("patternFill")
                        .with_attr("patternType", "solid")
                        .with_child(Element::new("fgColor").with_attr("rgb", argb(&color)))
                        .with_child(Element::new("bgColor").with_attr("rgb", argb(&color))),
                ),
            );
        }
        self.add_record("dxfs", dxf)
    }

    /// Copy the format at `index` of another workbook into this one.
    pub fn import_xf(&mut self, other: &Stylesheet, index: u32) -> u32 {
        if index == 0 {
            return 0;
        }
        let mut xf = other.xf(index);
        for (collection, key) in [("fonts", "fontId"), ("fills", "fillId"), ("borders", "borderId")] {
            let id = other.xf_attr(index, key);
            if let Some(record) = other.record(collection, id) {
                let local = self.add_record(collection, record.clone());
                xf.set_attr(key, local.to_string());
            } else {
                xf.set_attr(key, "0");
            }
        }
        let fmt = other.num_fmt_id(index);
        let local_fmt = other
            .format_code(fmt)
            .map_or(0, |code| self.number_format(&code));
        xf.set_attr("numFmtId", local_fmt.to_string());
        xf.set_attr("xfId", "0");
        self.add_record("cellXfs", xf)
    }

    /// Check if a numFmtId represents a date format.
    pub fn is_date_format(&self, num_fmt_id: u32) -> bool {
        // Built-in date formats (14-22) and time formats (45-47)
        if (14..=22).contains(&num_fmt_id) || (45..=47).contains(&num_fmt_id) {
            return true;
        }
        if num_fmt_id < FIRST_CUSTOM_FORMAT {
            return false;
        }
        self.format_code(num_fmt_id)
            .is_some_and(|code| Self::is_date_format_code(&code))
    }

    pub fn is_date_style(&self, style_index: u32) -> bool {
        self.is_date_format(self.num_fmt_id(style_index))
    }

    /// Check if a format code string represents a date format.
    ///
    /// Text in square brackets (`[Red]`, `[$-409]`) and quotes is ignored.
    fn is_date_format_code(format_code: &str) -> bool {
        let lower_format = format_code.to_lowercase();
        let mut in_bracket = false;
        let mut in_quote = false;

        for c in format_code.chars() {
            match c {
                '[' if !in_quote => in_bracket = true,
                ']' if !in_quote => in_bracket = false,
                '"' => in_quote = !in_quote,
                _ if !in_bracket && !in_quote => match c.to_ascii_lowercase() {
                    'd' | 'y' => return true,
                    // month or minute: a month when the code also has days or years
                    'm' if lower_format.contains('d') || lower_format.contains('y') => {
                        return true
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        false
    }

    /// Convert an Excel serial date to ISO 8601 text.
    ///
    /// Serial 1 is 1900-01-01; the fictitious 1900-02-29 (serial 60) is skipped.
    pub fn serial_to_date(serial: f64) -> Option<String> {
        if serial < 1.0 {
            return None;
        }
        let base = if serial < 61.0 {
            NaiveDate::from_ymd_opt(1899, 12, 31)?
        } else {
            NaiveDate::from_ymd_opt(1899, 12, 30)?
        };
        let date = base.checked_add_signed(Duration::try_days(serial.floor() as i64)?)?;

        let time_fraction = serial.fract();
        if time_fraction > 0.0001 {
            let seconds = (time_fraction * 86400.0).round() as i64;
            let datetime = date.and_hms_opt(0, 0, 0)? + Duration::seconds(seconds);
            Some(datetime.format("%Y-%m-%dT%H:%M:%S").to_string())
        } else {
            Some(date.format("%Y-%m-%d").to_string())
        }
    }

    /// Cell value as shown to users: dates for date-formatted numbers.
    pub fn display(&self, value: &CellValue, style_index: u32) -> String {
        match value {
            CellValue::Number(n) if self.is_date_style(style_index) => {
                Self::serial_to_date(*n).unwrap_or_else(|| value.to_string())
            }
            _ => value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLES: &str = r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><numFmts count="1"><numFmt numFmtId="165" formatCode="yyyy/mm/dd"/></numFmts><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="165" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#;

    fn sheet() -> Stylesheet {
        Stylesheet::parse(STYLES).unwrap()
    }

    #[test]
    fn test_builtin_date_formats() {
        let styles = sheet();

        assert!(styles.is_date_format(14)); // m/d/yyyy
        assert!(styles.is_date_format(15)); // d-mmm-yy
        assert!(styles.is_date_format(22)); // m/d/yy h:mm
        assert!(styles.is_date_format(165));

        assert!(!styles.is_date_format(0)); // General
        assert!(!styles.is_date_format(2)); // 0.00
        assert!(styles.is_date_style(1));
        assert!(!styles.is_date_style(0));
    }

    #[test]
    fn test_custom_date_format_detection() {
        assert!(Stylesheet::is_date_format_code("mmmm\\ d\\,\\ yyyy"));
        assert!(Stylesheet::is_date_format_code("yyyy-mm-dd"));
        assert!(Stylesheet::is_date_format_code("[$-409]mmmm\\ d\\,\\ yyyy;@"));

        assert!(!Stylesheet::is_date_format_code("0.00"));
        assert!(!Stylesheet::is_date_format_code("#,##0"));
        assert!(!Stylesheet::is_date_format_code("\"$\"#,##0.00"));
        assert!(!Stylesheet::is_date_format_code("[Red]0.00"));
    }

    #[test]
    fn test_serial_to_date() {
        assert_eq!(Stylesheet::serial_to_date(1.0), Some("1900-01-01".to_string()));
        assert_eq!(Stylesheet::serial_to_date(59.0), Some("1900-02-28".to_string()));
        assert_eq!(Stylesheet::serial_to_date(61.0), Some("1900-03-01".to_string()));
        assert_eq!(Stylesheet::serial_to_date(44197.0), Some("2021-01-01".to_string()));
        assert_eq!(Stylesheet::serial_to_date(45658.0), Some("2025-01-01".to_string()));
        assert_eq!(
            Stylesheet::serial_to_date(44197.5),
            Some("2021-01-01T12:00:00".to_string())
        );
        assert_eq!(Stylesheet::serial_to_date(-3.0), None);
    }

    #[test]
    fn test_number_formats() {
        let mut styles = sheet();
        assert_eq!(styles.number_format("0.00%"), 10);
        assert_eq!(styles.number_format("yyyy/mm/dd"), 165);
        assert!(!styles.is_modified());
        assert_eq!(styles.number_format("yyyy-mm-dd"), 166);
        assert_eq!(styles.number_format("yyyy-mm-dd"), 166);
        assert_eq!(styles.format_code(166).as_deref(), Some("yyyy-mm-dd"));
        assert_eq!(styles.format_code(4).as_deref(), Some("#,##0.00"));
    }

    #[test]
    fn test_derive_deduplicates() {
        let mut styles = sheet();
        let style = CellStyle {
            number_format: Some("#,##0.00".to_string()),
            font: Some(CellFont {
                bold: true,
                ..Default::default()
            }),
            border: Some(CellBorder::default()),
            alignment: Some(CellAlignment::new("center", "center")),
            ..Default::default()
        };
        let first = styles.derive(0, &style);
        let second = styles.derive(0, &style);
        assert_eq!(first, 2);
        assert_eq!(first, second);
        assert_eq!(styles.xf_count(), 3);

        let xf = styles.xf(first);
        assert_eq!(xf.attr("numFmtId"), Some("4"));
        assert_eq!(xf.attr("fontId"), Some("1"));
        assert_eq!(xf.attr("borderId"), Some("1"));
        assert_eq!(xf.child("alignment").unwrap().attr("horizontal"), Some("center"));
        assert_eq!(styles.derive(1, &CellStyle::default()), 1);
    }

    #[test]
    fn test_import_between_workbooks() {
        let mut source = sheet();
        let filled = source.derive(
            1,
            &CellStyle {
                fill: Some(CellFill::solid(Color([0xDD, 0xEB, 0xF7]))),
                ..Default::default()
            },
        );

        let mut target = Stylesheet::parse(STYLES.replace("yyyy/mm/dd", "0.0").as_str()).unwrap();
        let imported = target.import_xf(&source, filled);
        let xf = target.xf(imported);
        assert_eq!(xf.attr("fillId"), Some("2"));
        let fmt: u32 = xf.attr("numFmtId").unwrap().parse().unwrap();
        assert_eq!(target.format_code(fmt).as_deref(), Some("yyyy/mm/dd"));
        assert!(target.is_date_style(imported));
    }

    #[test]
    fn test_display_dates() {
        let styles = sheet();
        assert_eq!(styles.display(&CellValue::Number(45658.0), 1), "2025-01-01");
        assert_eq!(styles.display(&CellValue::Number(3.0), 0), "3");
    }
}
