//! One worksheet part: rows, cells and the sheet-level records around them.

use super::cell::{self, CellValue};
use super::reference::{Area, CellRef, MAX_COLUMNS, MAX_ROWS};
use super::shared_strings::SharedStrings;
use crate::xml::{Element, Node, XmlDocument};

pub const SPREADSHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
pub const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Child order of `<worksheet>`.
const WORKSHEET_ORDER: &[&str] = &[
    "sheetPr",
    "dimension",
    "sheetViews",
    "sheetFormatPr",
    "cols",
    "sheetData",
    "sheetCalcPr",
    "sheetProtection",
    "protectedRanges",
    "scenarios",
    "autoFilter",
    "sortState",
    "dataConsolidate",
    "customSheetViews",
    "mergeCells",
    "phoneticPr",
    "conditionalFormatting",
    "dataValidations",
    "hyperlinks",
    "printOptions",
    "pageMargins",
    "pageSetup",
    "headerFooter",
    "rowBreaks",
    "colBreaks",
    "customProperties",
    "cellWatches",
    "ignoredErrors",
    "smartTags",
    "drawing",
    "legacyDrawing",
    "legacyDrawingHF",
    "picture",
    "oleObjects",
    "controls",
    "webPublishItems",
    "tableParts",
    "extLst",
];

const SHEET_VIEW_ORDER: &[&str] = &["pane", "selection", "pivotSelection", "extLst"];

/// A `<col>` record: width for columns `min..=max`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnWidth {
    pub min: u32,
    pub max: u32,
    pub width: f64,
}

fn row_number(row: &Element) -> u32 {
    row.attr("r").and_then(|r| r.parse().ok()).unwrap_or(0)
}

fn new_row(number: u32) -> Element {
    Element::new("row").with_attr("r", number.to_string())
}

fn cell_column(c: &Element) -> u32 {
    cell::position(c).map(|at| at.col).unwrap_or(u32::MAX)
}

/// Binary search over element children ordered by `key`; other nodes sort last.
fn search(parent: &Element, name: &str, target: u32, key: fn(&Element) -> u32) -> Result<usize, usize> {
    parent.children.binary_search_by_key(&target, |node| match node {
        Node::Element(e) if e.is(name) => key(e),
        _ => u32::MAX,
    })
}

fn element_at(parent: &Element, index: usize) -> Option<&Element> {
    match parent.children.get(index)? {
        Node::Element(e) => Some(e),
        _ => None,
    }
}

fn element_at_mut(parent: &mut Element, index: usize) -> Option<&mut Element> {
    match parent.children.get_mut(index)? {
        Node::Element(e) => Some(e),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Worksheet {
    pub part: String,
    doc: XmlDocument,
}

impl Worksheet {
    /// Wrap a parsed part; rows and cells without an `r` attribute get one.
    ///
    /// Rows are sorted by number and cells by column so lookups can bisect.
    pub fn from_document(part: impl Into<String>, mut doc: XmlDocument) -> Self {
        if let Some(data) = doc.root.child_mut("sheetData") {
            data.children.retain(|n| matches!(n, Node::Element(_)));
            let mut next_row = 1;
            for row in data.elements_mut().filter(|e| e.is("row")) {
                let number = match row.attr("r").and_then(|r| r.parse::<u32>().ok()) {
                    Some(n) => n,
                    None => {
                        row.set_attr("r", next_row.to_string());
                        next_row
                    }
                };
                next_row = number + 1;
                let mut next_col = 1;
                for c in row.elements_mut().filter(|e| e.is("c")) {
                    let col = match cell::position(c) {
                        Some(at) => at.col,
                        None => {
                            c.set_attr("r", CellRef::new(number, next_col).to_string());
                            next_col
                        }
                    };
                    next_col = col + 1;
                }
                row.children.retain(|n| matches!(n, Node::Element(_)));
                row.children.sort_by_key(|n| match n {
                    Node::Element(c) if c.is("c") => cell_column(c),
                    _ => u32::MAX,
                });
            }
            data.children.sort_by_key(|n| match n {
                Node::Element(row) if row.is("row") => row_number(row),
                _ => u32::MAX,
            });
        }
        Self {
            part: part.into(),
            doc,
        }
    }

    /// An empty worksheet.
    pub fn blank(part: impl Into<String>) -> Self {
        let root = Element::new("worksheet")
            .with_attr("xmlns", SPREADSHEET_NS)
            .with_attr("xmlns:r", RELATIONSHIPS_NS)
            .with_child(Element::new("dimension").with_attr("ref", "A1"))
            .with_child(
                Element::new("sheetViews")
                    .with_child(Element::new("sheetView").with_attr("workbookViewId", "0")),
            )
            .with_child(Element::new("sheetFormatPr").with_attr("defaultRowHeight", "15"))
            .with_child(Element::new("sheetData"))
            .with_child(
                Element::new("pageMargins")
                    .with_attr("left", "0.7")
                    .with_attr("right", "0.7")
                    .with_attr("top", "0.75")
                    .with_attr("bottom", "0.75")
                    .with_attr("header", "0.3")
                    .with_attr("footer", "0.3"),
            );
        Self::from_document(part, XmlDocument::new(root))
    }

    pub fn document(&self) -> &XmlDocument {
        &self.doc
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.doc.root
    }

    fn sheet_data_mut(&mut self) -> &mut Element {
        self.doc.root.ensure_child_ordered("sheetData", WORKSHEET_ORDER)
    }

    /// `<row>` elements in order.
    pub fn rows(&self) -> Vec<&Element> {
        self.doc
            .root
            .child("sheetData")
            .map(|d| d.children_named("row").collect())
            .unwrap_or_default()
    }

    /// Every `<c>` with its position, row by row.
    pub fn cells(&self) -> Vec<(CellRef, &Element)> {
        self.rows()
            .into_iter()
            .flat_map(|row| row.children_named("c"))
            .filter_map(|c| cell::position(c).map(|at| (at, c)))
            .collect()
    }

    fn row(&self, number: u32) -> Option<&Element> {
        let data = self.doc.root.child("sheetData")?;
        element_at(data, search(data, "row", number, row_number).ok()?)
    }

    pub fn cell(&self, at: CellRef) -> Option<&Element> {
        let row = self.row(at.row)?;
        element_at(row, search(row, "c", at.col, cell_column).ok()?)
    }

    pub fn cell_mut(&mut self, at: CellRef) -> Option<&mut Element> {
        let data = self.doc.root.child_mut("sheetData")?;
        let index = search(data, "row", at.row, row_number).ok()?;
        let row = element_at_mut(data, index)?;
        let index = search(row, "c", at.col, cell_column).ok()?;
        element_at_mut(row, index)
    }

    fn row_or_insert(&mut self, number: u32) -> &mut Element {
        let data = self.sheet_data_mut();
        let index = search(data, "row", number, row_number).unwrap_or_else(|pos| {
            data.children.insert(pos, Node::Element(new_row(number)));
            pos
        });
        match &mut data.children[index] {
            Node::Element(row) => row,
            _ => unreachable!("rows are element nodes"),
        }
    }

    /// The cell at `at`, created in column order when absent.
    pub fn cell_or_insert(&mut self, at: CellRef) -> &mut Element {
        let row = self.row_or_insert(at.row);
        let index = search(row, "c", at.col, cell_column).unwrap_or_else(|pos| {
            row.children.insert(pos, Node::Element(cell::new_cell(at)));
            pos
        });
        match &mut row.children[index] {
            Node::Element(c) => c,
            _ => unreachable!("cells are element nodes"),
        }
    }

    /// Apply `f` to every existing cell.
    pub fn for_each_cell_mut(&mut self, mut f: impl FnMut(CellRef, &mut Element)) {
        let Some(data) = self.doc.root.child_mut("sheetData") else {
            return;
        };
        for row in data.elements_mut().filter(|e| e.is("row")) {
            for c in row.elements_mut().filter(|e| e.is("c")) {
                if let Some(at) = cell::position(c) {
                    f(at, c);
                }
            }
        }
    }

    /// Remove every cell, keeping row records.
    pub fn clear_cells(&mut self) {
        if let Some(data) = self.doc.root.child_mut("sheetData") {
            for row in data.elements_mut().filter(|e| e.is("row")) {
                row.retain_children(|c| !c.is("c"));
            }
        }
    }

    /// Largest row and column holding a cell; `(0, 0)` for an empty sheet.
    pub fn extent(&self) -> (u32, u32) {
        self.cells()
            .iter()
            .fold((0, 0), |(r, c), (at, _)| (r.max(at.row), c.max(at.col)))
    }

    /// Whole rows and columns cut down to the used extent; `None` when nothing is left.
    pub fn used_part(&self, area: Area) -> Option<Area> {
        if area.max_row < MAX_ROWS && area.max_col < MAX_COLUMNS {
            return Some(area);
        }
        let (max_row, max_col) = self.extent();
        area.clamp(max_row, max_col)
    }

    pub fn value(&self, at: CellRef, strings: &SharedStrings) -> CellValue {
        self.cell(at)
            .map(|c| cell::read_value(c, strings))
            .unwrap_or_default()
    }

    pub fn set_value(&mut self, at: CellRef, value: &CellValue, strings: &mut SharedStrings) {
        cell::write_value(self.cell_or_insert(at), value, strings);
    }

    pub fn style(&self, at: CellRef) -> u32 {
        self.cell(at).map(cell::style_index).unwrap_or(0)
    }

    pub fn set_style(&mut self, at: CellRef, style: u32) {
        if style == 0 && self.cell(at).is_none() {
            return;
        }
        cell::set_style_index(self.cell_or_insert(at), style);
    }

    pub fn merged_areas(&self) -> Vec<Area> {
        self.doc
            .root
            .child("mergeCells")
            .map(|m| {
                m.children_named("mergeCell")
                    .filter_map(|e| e.attr("ref"))
                    .filter_map(|r| Area::parse(r).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn add_merged_area(&mut self, area: Area) {
        let merges = self.doc.root.ensure_child_ordered("mergeCells", WORKSHEET_ORDER);
        merges.push(Element::new("mergeCell").with_attr("ref", area.to_string()));
        let count = merges.count_named("mergeCell");
        merges.set_attr("count", count.to_string());
    }

    pub fn column_widths(&self) -> Vec<ColumnWidth> {
        self.doc
            .root
            .child("cols")
            .map(|cols| {
                cols.children_named("col")
                    .filter_map(|c| {
                        Some(ColumnWidth {
                            min: c.attr("min")?.parse().ok()?,
                            max: c.attr("max")?.parse().ok()?,
                            width: c.attr("width")?.parse().ok()?,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_column_width(&mut self, col: u32, width: f64) {
        self.set_columns_width(col, col, width);
    }

    /// Set a custom width for columns `min..=max`, splitting `<col>` ranges that overlap.
    pub fn set_columns_width(&mut self, min: u32, max: u32, width: f64) {
        let cols = self.doc.root.ensure_child_ordered("cols", WORKSHEET_ORDER);
        let bounds = |e: &Element, key: &str| e.attr(key).and_then(|v| v.parse::<u32>().ok()).unwrap_or(0);
        let mut split = Vec::with_capacity(cols.children.len() + 2);
        for record in cols.elements() {
            let (lo, hi) = (bounds(record, "min"), bounds(record, "max"));
            if hi < min || lo > max {
                split.push(record.clone());
                continue;
            }
            if lo < min {
                split.push(record.clone().with_attr("max", (min - 1).to_string()));
            }
            if max < hi {
                split.push(record.clone().with_attr("min", (max + 1).to_string()));
            }
        }
        split.push(
            Element::new("col")
                .with_attr("min", min.to_string())
                .with_attr("max", max.to_string())
                .with_attr("width", cell::format_number(width))
                .with_attr("customWidth", "1"),
        );
        split.sort_by_key(|e| bounds(e, "min"));
        cols.children = split.into_iter().map(Node::Element).collect();
    }

    pub fn row_height(&self, row: u32) -> Option<f64> {
        self.row(row)?
            .attr("ht")?
            .parse()
            .ok()
    }

    pub fn set_row_height(&mut self, row: u32, height: f64) {
        let row = self.row_or_insert(row);
        row.set_attr("ht", cell::format_number(height));
        row.set_attr("customHeight", "1");
    }

    pub fn set_auto_filter(&mut self, area: Area) {
        self.doc.root.replace_child_ordered(
            Element::new("autoFilter").with_attr("ref", area.to_string()),
            WORKSHEET_ORDER,
        );
    }

    /// Freeze rows above and columns left of `at`; `A1` unfreezes.
    pub fn freeze_panes(&mut self, at: CellRef) {
        let views = self.doc.root.ensure_child_ordered("sheetViews", WORKSHEET_ORDER);
        if !views.has_child("sheetView") {
            views.push(Element::new("sheetView").with_attr("workbookViewId", "0"));
        }
        let Some(view) = views.child_mut("sheetView") else {
            return;
        };
        view.remove_children("pane");
        view.remove_children("selection");
        let (x_split, y_split) = (at.col - 1, at.row - 1);
        if x_split == 0 && y_split == 0 {
            return;
        }
        let active = match (x_split > 0, y_split > 0) {
            (true, true) => "bottomRight",
            (true, false) => "topRight",
            _ => "bottomLeft",
        };
        let mut pane = Element::new("pane");
        if x_split > 0 {
            pane.set_attr("xSplit", x_split.to_string());
        }
        if y_split > 0 {
            pane.set_attr("ySplit", y_split.to_string());
        }
        pane.set_attr("topLeftCell", at.to_string());
        pane.set_attr("activePane", active);
        pane.set_attr("state", "frozen");
        view.insert_ordered(pane, SHEET_VIEW_ORDER);
        view.insert_ordered(
            Element::new("selection")
                .with_attr("pane", active)
                .with_attr("activeCell", at.to_string())
                .with_attr("sqref", at.to_string()),
            SHEET_VIEW_ORDER,
        );
    }

    /// Add a `<conditionalFormatting>` block; rule priorities continue after existing ones.
    pub fn add_conditional_format(&mut self, area: Area, rules: Vec<Element>) {
        let mut priority = self
            .doc
            .root
            .find_all("cfRule")
            .iter()
            .filter_map(|r| r.attr("priority").and_then(|p| p.parse::<u32>().ok()))
            .max()
            .unwrap_or(0);
        let mut block = Element::new("conditionalFormatting").with_attr("sqref", area.to_string());
        for mut rule in rules {
            priority += 1;
            rule.set_attr("priority", priority.to_string());
            block.push(rule);
        }
        self.doc.root.insert_ordered(block, WORKSHEET_ORDER);
    }

    pub fn add_data_validation(&mut self, validation: Element) {
        let list = self.doc.root.ensure_child_ordered("dataValidations", WORKSHEET_ORDER);
        list.push(validation);
        let count = list.count_named("dataValidation");
        list.set_attr("count", count.to_string());
    }

    pub fn add_table_part(&mut self, rel_id: &str) {
        let parts = self.doc.root.ensure_child_ordered("tableParts", WORKSHEET_ORDER);
        parts.push(Element::new("tablePart").with_attr("r:id", rel_id));
        let count = parts.count_named("tablePart");
        parts.set_attr("count", count.to_string());
    }

    /// Bring `<dimension>` in line with the cells present.
    pub fn update_dimension(&mut self) {
        let reference = match self.cells().first().map(|(at, _)| *at) {
            None => "A1".to_string(),
            Some(first) => {
                let (min_row, mut min_col) = (first.row, first.col);
                for (at, _) in self.cells() {
                    min_col = min_col.min(at.col);
                }
                let (max_row, max_col) = self.extent();
                Area::new(min_row, min_col, max_row, max_col).to_string()
            }
        };
        self.doc.root.replace_child_ordered(
            Element::new("dimension").with_attr("ref", reference),
            WORKSHEET_ORDER,
        );
    }

    /// The part with its dimension refreshed, ready to be written.
    pub fn to_document(&mut self) -> &XmlDocument {
        self.update_dimension();
        &self.doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(data: &str) -> Worksheet {
        let xml = format!(
            r#"<worksheet xmlns="{}"><sheetViews><sheetView workbookViewId="0"/></sheetViews><sheetData>{}</sheetData><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#,
            SPREADSHEET_NS, data
        );
        Worksheet::from_document("xl/worksheets/sheet1.xml", XmlDocument::parse(&xml).unwrap())
    }

    #[test]
    fn test_missing_references_are_filled() {
        let ws = sheet(r#"<row><c><v>1</v></c><c><v>2</v></c></row><row r="4"><c r="C4"><v>3</v></c><c><v>4</v></c></row>"#);
        let refs: Vec<String> = ws.cells().iter().map(|(at, _)| at.to_string()).collect();
        assert_eq!(refs, vec!["A1", "B1", "C4", "D4"]);
        assert_eq!(ws.extent(), (4, 4));
    }

    #[test]
    fn test_insert_cells_in_order() {
        let mut ws = sheet(r#"<row r="2"><c r="B2"><v>1</v></c></row>"#);
        let mut sst = SharedStrings::default();
        ws.set_value(CellRef::new(2, 4), &CellValue::Number(4.0), &mut sst);
        ws.set_value(CellRef::new(2, 1), &CellValue::Text("a".into()), &mut sst);
        ws.set_value(CellRef::new(1, 1), &CellValue::Bool(true), &mut sst);
        ws.set_value(CellRef::new(5, 1), &CellValue::Number(5.0), &mut sst);

        let refs: Vec<String> = ws.cells().iter().map(|(at, _)| at.to_string()).collect();
        assert_eq!(refs, vec!["A1", "A2", "B2", "D2", "A5"]);
        assert_eq!(ws.value(CellRef::new(2, 1), &sst), CellValue::Text("a".into()));
        assert_eq!(ws.value(CellRef::new(9, 9), &sst), CellValue::Empty);

        ws.update_dimension();
        assert_eq!(ws.document().root.child("dimension").unwrap().attr("ref"), Some("A1:D5"));
        let names: Vec<&str> = ws.document().root.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["dimension", "sheetViews", "sheetData", "pageMargins"]);
    }

    #[test]
    fn test_unordered_rows_are_sorted_on_load() {
        let ws = sheet(
            "<row r=\"3\"><c r=\"B3\"><v>2</v></c><c r=\"A3\"><v>1</v></c></row>\n  <row r=\"1\"><c r=\"A1\"><v>0</v></c></row>",
        );
        let refs: Vec<String> = ws.cells().iter().map(|(at, _)| at.to_string()).collect();
        assert_eq!(refs, vec!["A1", "A3", "B3"]);
        let sst = SharedStrings::default();
        assert_eq!(ws.value(CellRef::new(3, 2), &sst), CellValue::Number(2.0));
        assert_eq!(ws.value(CellRef::new(1, 1), &sst), CellValue::Number(0.0));
    }

    #[test]
    fn test_wide_row_lookups() {
        let mut ws = sheet("");
        let mut sst = SharedStrings::default();
        for col in (1..=MAX_COLUMNS).step_by(3) {
            ws.set_value(CellRef::new(7, col), &CellValue::Number(col as f64), &mut sst);
        }
        for col in (1..=MAX_COLUMNS).step_by(3) {
            ws.set_style(CellRef::new(7, col), 1);
        }
        ws.set_style(CellRef::new(7, 2), 2);
        ws.set_style(CellRef::new(7, 9000), 2);

        let cells = ws.cells();
        assert_eq!(cells.len(), 5464);
        assert!(cells.windows(2).all(|w| w[0].0.col < w[1].0.col));
        assert_eq!(ws.value(CellRef::new(7, MAX_COLUMNS), &sst), CellValue::Number(MAX_COLUMNS as f64));
        assert_eq!(ws.value(CellRef::new(7, 3), &sst), CellValue::Empty);
        assert_eq!(ws.style(CellRef::new(7, 4)), 1);
        assert_eq!(ws.style(CellRef::new(7, 9000)), 2);
        assert!(ws.cell_mut(CellRef::new(8, 1)).is_none());
        assert_eq!(ws.extent(), (7, MAX_COLUMNS));
    }

    #[test]
    fn test_used_part() {
        let ws = sheet(r#"<row r="2"><c r="B2"><v>1</v></c><c r="C2"><v>2</v></c></row>"#);
        let used = |r: &str| ws.used_part(Area::parse(r).unwrap());
        assert_eq!(used("B:B"), Some(Area::new(1, 2, 2, 2)));
        assert_eq!(used("2:2"), Some(Area::new(2, 1, 2, 3)));
        assert_eq!(used("E:F"), None);
        assert_eq!(used("E1:F9"), Some(Area::new(1, 5, 9, 6)));
        assert_eq!(sheet("").used_part(Area::parse("A:A").unwrap()), None);
    }

    #[test]
    fn test_column_widths_split_ranges() {
        let mut ws = sheet("");
        ws.root_mut().insert_ordered(
            Element::parse(r#"<cols><col min="1" max="5" width="9" customWidth="1"/></cols>"#).unwrap(),
            WORKSHEET_ORDER,
        );
        ws.set_column_width(3, 15.0);
        let widths = ws.column_widths();
        assert_eq!(
            widths,
            vec![
                ColumnWidth { min: 1, max: 2, width: 9.0 },
                ColumnWidth { min: 3, max: 3, width: 15.0 },
                ColumnWidth { min: 4, max: 5, width: 9.0 },
            ]
        );
        let names: Vec<&str> = ws.document().root.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["sheetViews", "cols", "sheetData", "pageMargins"]);
    }

    #[test]
    fn test_sheet_records_in_schema_order() {
        let mut ws = sheet(r#"<row r="1" ht="30" customHeight="1"><c r="A1"/></row>"#);
        ws.add_data_validation(Element::new("dataValidation").with_attr("sqref", "E2:E20"));
        ws.add_merged_area(Area::parse("A1:B1").unwrap());
        ws.add_conditional_format(
            Area::parse("C2:C20").unwrap(),
            vec![Element::new("cfRule"), Element::new("cfRule")],
        );
        ws.set_auto_filter(Area::parse("A1:G10").unwrap());
        ws.freeze_panes(CellRef::parse("A2").unwrap());

        let names: Vec<&str> = ws.document().root.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "sheetViews",
                "sheetData",
                "autoFilter",
                "mergeCells",
                "conditionalFormatting",
                "dataValidations",
                "pageMargins"
            ]
        );
        let priorities: Vec<&str> = ws
            .document()
            .root
            .find_all("cfRule")
            .iter()
            .filter_map(|r| r.attr("priority"))
            .collect();
        assert_eq!(priorities, vec!["1", "2"]);

        let pane = ws.document().root.find("pane").unwrap();
        assert_eq!(pane.attr("ySplit"), Some("1"));
        assert_eq!(pane.attr("xSplit"), None);
        assert_eq!(pane.attr("activePane"), Some("bottomLeft"));

        assert_eq!(ws.row_height(1), Some(30.0));
        assert_eq!(ws.merged_areas(), vec![Area::new(1, 1, 1, 2)]);
    }
}
