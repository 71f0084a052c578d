//! The workbook part, its sheets, and the shared string and style parts.

use super::shared_strings::SharedStrings;
use super::styles::Stylesheet;
use super::template;
use super::worksheet::Worksheet;
use crate::error::{Error, Result};
use crate::package::{relative_target, resolve_path, OoxmlPackage};
use crate::xml::{Element, XmlDocument};
use std::path::Path;
use tracing::debug;

pub const WORKSHEET_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
pub const WORKSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
const SHARED_STRINGS_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";
const SHARED_STRINGS_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml";
const STYLES_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const STYLES_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";

const MAX_SHEET_NAME: usize = 31;
const INVALID_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

const WORKBOOK_ORDER: &[&str] = &[
    "fileVersion",
    "fileSharing",
    "workbookPr",
    "workbookProtection",
    "bookViews",
    "sheets",
    "functionGroups",
    "externalReferences",
    "definedNames",
    "calcPr",
    "oleSize",
    "customWorkbookViews",
    "pivotCaches",
    "smartTagPr",
    "smartTagTypes",
    "webPublishing",
    "fileRecoveryPr",
    "webPublishObjects",
    "extLst",
];

/// A worksheet with its name from the workbook part.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub worksheet: Worksheet,
}

/// An .xlsx package with its workbook, worksheets, strings and styles parsed.
///
/// Fields are public so that an operation can edit one sheet while interning
/// strings or deriving styles.
#[derive(Debug, Clone)]
pub struct XlsxWorkbook {
    package: OoxmlPackage,
    workbook_part: String,
    workbook: XmlDocument,
    pub sheets: Vec<Sheet>,
    pub strings: SharedStrings,
    pub styles: Stylesheet,
    strings_part: Option<String>,
    styles_part: String,
    styles_created: bool,
}

impl XlsxWorkbook {
    /// Open a .xlsx file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use redoc::xlsx::XlsxWorkbook;
    ///
    /// let workbook = XlsxWorkbook::open("data.xlsx")?;
    /// for name in workbook.sheet_names() {
    ///     println!("{}", name);
    /// }
    /// # Ok::<(), redoc::Error>(())
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_package(OoxmlPackage::open(path)?)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_package(OoxmlPackage::from_bytes(data)?)
    }

    pub fn from_package(package: OoxmlPackage) -> Result<Self> {
        let workbook_part = package
            .read_relationships("")?
            .of_kind("officeDocument")
            .next()
            .map(|r| resolve_path("", &r.target))
            .unwrap_or_else(|| "xl/workbook.xml".to_string());
        let workbook = package.parse_xml_part(&workbook_part)?;
        let rels = package.read_relationships(&workbook_part)?;

        let mut sheets = Vec::new();
        if let Some(list) = workbook.root.child("sheets") {
            for entry in list.children_named("sheet") {
                let name = entry.attr("name").unwrap_or_default().to_string();
                let Some(rel) = entry.attr("r:id").and_then(|id| rels.get(id)) else {
                    debug!(sheet = %name, "sheet without relationship");
                    continue;
                };
                if !rel.is_kind("worksheet") {
                    debug!(sheet = %name, kind = %rel.rel_type, "skipping non-worksheet sheet");
                    continue;
                }
                let part = resolve_path(&workbook_part, &rel.target);
                let doc = package.parse_xml_part(&part)?;
                sheets.push(Sheet {
                    name,
                    worksheet: Worksheet::from_document(part, doc),
                });
            }
        }

        let strings_part = rels
            .of_kind("sharedStrings")
            .next()
            .map(|r| resolve_path(&workbook_part, &r.target));
        let strings = match &strings_part {
            Some(part) if package.exists(part) => SharedStrings::parse(&package.read_xml(part)?)?,
            _ => SharedStrings::default(),
        };

        let styles_part = rels
            .of_kind("styles")
            .next()
            .map(|r| resolve_path(&workbook_part, &r.target));
        let (styles, styles_part, styles_created) = match styles_part {
            Some(part) if package.exists(&part) => {
                (Stylesheet::parse(&package.read_xml(&part)?)?, part, false)
            }
            _ => {
                let blank = template::blank_package()?;
                let styles = Stylesheet::parse(&blank.read_xml("xl/styles.xml")?)?;
                (styles, "xl/styles.xml".to_string(), true)
            }
        };

        Ok(Self {
            package,
            workbook_part,
            workbook,
            sheets,
            strings,
            styles,
            strings_part,
            styles_part,
            styles_created,
        })
    }

    /// A workbook with one empty sheet named `Sheet1`.
    pub fn blank() -> Result<Self> {
        Self::from_package(template::blank_package()?)
    }

    pub fn package(&self) -> &OoxmlPackage {
        &self.package
    }

    pub fn package_mut(&mut self) -> &mut OoxmlPackage {
        &mut self.package
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sheet_index(&self, name: &str) -> Result<usize> {
        self.sheets
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| Error::SheetNotFound(name.to_string()))
    }

    pub fn sheet(&self, name: &str) -> Result<&Sheet> {
        Ok(&self.sheets[self.sheet_index(name)?])
    }

    pub fn sheet_mut(&mut self, name: &str) -> Result<&mut Sheet> {
        let index = self.sheet_index(name)?;
        Ok(&mut self.sheets[index])
    }

    /// `wanted` made acceptable as a new sheet name: invalid characters become
    /// `_`, names over 31 characters are cut to 28 plus `...`, and a taken name
    /// gets a `_N` suffix.
    pub fn unique_sheet_name(&self, wanted: &str) -> String {
        let cleaned: String = wanted
            .chars()
            .map(|c| if INVALID_SHEET_CHARS.contains(&c) { '_' } else { c })
            .collect();
        let base = if cleaned.chars().count() > MAX_SHEET_NAME {
            format!("{}...", cleaned.chars().take(MAX_SHEET_NAME - 3).collect::<String>())
        } else {
            cleaned
        };
        let taken = |name: &str| self.sheets.iter().any(|s| s.name.to_lowercase() == name.to_lowercase());
        let mut name = base.clone();
        let mut counter = 1;
        while taken(&name) {
            let suffix = format!("_{}", counter);
            let room = MAX_SHEET_NAME - suffix.len();
            name = format!("{}{}", base.chars().take(room).collect::<String>(), suffix);
            counter += 1;
        }
        name
    }

    /// Append an empty worksheet and return its index.
    pub fn add_sheet(&mut self, name: &str) -> Result<usize> {
        if self.sheets.iter().any(|s| s.name == name) {
            return Err(Error::InvalidData(format!("duplicate sheet name: {}", name)));
        }
        let part = self.package.next_part_name("xl/worksheets", "sheet", "xml");
        let worksheet = Worksheet::blank(part.clone());
        self.package.write_xml_part(&part, worksheet.document())?;
        let target = relative_target(&self.workbook_part, &part);
        let rel_id = self
            .package
            .add_relationship(&self.workbook_part, WORKSHEET_REL_TYPE, &target)?;
        self.package.add_override(&part, WORKSHEET_CONTENT_TYPE)?;

        let list = self.workbook.root.ensure_child_ordered("sheets", WORKBOOK_ORDER);
        let sheet_id = list
            .children_named("sheet")
            .filter_map(|s| s.attr("sheetId").and_then(|v| v.parse::<u32>().ok()))
            .max()
            .unwrap_or(0)
            + 1;
        list.push(
            Element::new("sheet")
                .with_attr("name", name)
                .with_attr("sheetId", sheet_id.to_string())
                .with_attr("r:id", rel_id),
        );
        debug!(sheet = %name, part = %part, "added worksheet");

        self.sheets.push(Sheet {
            name: name.to_string(),
            worksheet,
        });
        Ok(self.sheets.len() - 1)
    }

    pub fn rename_sheet(&mut self, index: usize, name: &str) -> Result<()> {
        let old = self
            .sheets
            .get(index)
            .map(|s| s.name.clone())
            .ok_or_else(|| Error::SheetNotFound(format!("#{}", index + 1)))?;
        if let Some(list) = self.workbook.root.child_mut("sheets") {
            for entry in list.elements_mut() {
                if entry.attr("name") == Some(old.as_str()) {
                    entry.set_attr("name", name);
                }
            }
        }
        self.sheets[index].name = name.to_string();
        Ok(())
    }

    /// Remove a worksheet with its part and relationship; the last sheet cannot go.
    pub fn remove_sheet(&mut self, index: usize) -> Result<Sheet> {
        if index >= self.sheets.len() {
            return Err(Error::SheetNotFound(format!("#{}", index + 1)));
        }
        if self.sheets.len() == 1 {
            return Err(Error::InvalidData(
                "a workbook needs at least one sheet".to_string(),
            ));
        }
        let sheet = self.sheets.remove(index);
        let part = sheet.worksheet.part.clone();
        let ids: Vec<String> = self
            .package
            .read_relationships(&self.workbook_part)?
            .ordered
            .iter()
            .filter(|r| resolve_path(&self.workbook_part, &r.target) == part)
            .map(|r| r.id.clone())
            .collect();
        let workbook_part = self.workbook_part.clone();
        self.package.remove_relationships(&workbook_part, |r| {
            resolve_path(&workbook_part, &r.target) == part
        })?;
        if let Some(list) = self.workbook.root.child_mut("sheets") {
            list.retain_children(|e| !e.attr("r:id").is_some_and(|id| ids.iter().any(|i| i == id)));
        }
        if let Some(views) = self.workbook.root.child_mut("bookViews") {
            for view in views.elements_mut() {
                view.remove_attr("activeTab");
                view.remove_attr("firstSheet");
            }
        }
        self.package.remove_part(&part);
        self.package.remove_part(&crate::package::rels_path_for(&part));
        let name = format!("/{}", part);
        self.package.remove_overrides(|n| n == name)?;
        debug!(sheet = %sheet.name, part = %part, "removed worksheet");
        Ok(sheet)
    }

    /// Drop the calculation chain so the application rebuilds it.
    pub fn remove_calc_chain(&mut self) -> Result<bool> {
        let mut chains: Vec<String> = self
            .package
            .read_relationships(&self.workbook_part)?
            .of_kind("calcChain")
            .map(|r| resolve_path(&self.workbook_part, &r.target))
            .collect();
        if chains.is_empty() {
            chains.push("xl/calcChain.xml".to_string());
        }
        let mut removed = false;
        for part in &chains {
            removed |= self.package.remove_part(part);
        }
        self.package
            .remove_relationships(&self.workbook_part, |r| r.is_kind("calcChain"))?;
        self.package
            .remove_overrides(|name| name.trim_start_matches('/').ends_with("calcChain.xml"))?;
        if removed {
            debug!("removed calculation chain");
        }
        Ok(removed)
    }

    fn flush(&mut self) -> Result<()> {
        for sheet in &mut self.sheets {
            let part = sheet.worksheet.part.clone();
            self.package
                .write_xml_part(&part, sheet.worksheet.to_document())?;
        }
        self.package
            .write_xml_part(&self.workbook_part, &self.workbook)?;

        if self.strings.is_modified() {
            let part = self
                .strings_part
                .clone()
                .unwrap_or_else(|| "xl/sharedStrings.xml".to_string());
            let existing = if self.package.exists(&part) {
                Some(self.package.parse_xml_part(&part)?)
            } else {
                None
            };
            let doc = self.strings.to_document(existing);
            self.package.write_xml_part(&part, &doc)?;
            if self.strings_part.is_none() {
                let target = relative_target(&self.workbook_part, &part);
                self.package
                    .add_relationship(&self.workbook_part, SHARED_STRINGS_REL_TYPE, &target)?;
                self.package.add_override(&part, SHARED_STRINGS_CONTENT_TYPE)?;
                self.strings_part = Some(part);
            }
            self.strings.mark_saved();
        }

        if self.styles.is_modified() || self.styles_created {
            self.package
                .write_xml_part(&self.styles_part, self.styles.document())?;
            if self.styles_created {
                let target = relative_target(&self.workbook_part, &self.styles_part);
                self.package
                    .add_relationship(&self.workbook_part, STYLES_REL_TYPE, &target)?;
                self.package
                    .add_override(&self.styles_part, STYLES_CONTENT_TYPE)?;
                self.styles_created = false;
            }
        }
        Ok(())
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.flush()?;
        self.package.to_bytes()
    }

    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.flush()?;
        self.package.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xlsx::cell::CellValue;
    use crate::xlsx::reference::CellRef;

    #[test]
    fn test_add_sheet_and_round_trip() {
        let mut wb = XlsxWorkbook::blank().unwrap();
        let index = wb.add_sheet("数据").unwrap();
        assert_eq!(index, 1);
        assert!(matches!(wb.add_sheet("数据"), Err(Error::InvalidData(_))));

        let sheet = &mut wb.sheets[index];
        sheet
            .worksheet
            .set_value(CellRef::new(1, 1), &CellValue::Text("名称".into()), &mut wb.strings);
        wb.rename_sheet(0, "首页").unwrap();

        let bytes = wb.to_bytes().unwrap();
        let mut reopened = XlsxWorkbook::from_bytes(bytes).unwrap();
        assert_eq!(reopened.sheet_names(), vec!["首页", "数据"]);
        let sheet = reopened.sheet("数据").unwrap();
        assert_eq!(
            sheet.worksheet.value(CellRef::new(1, 1), &reopened.strings),
            CellValue::Text("名称".into())
        );
        assert!(reopened.package().exists("xl/sharedStrings.xml"));
        assert!(matches!(reopened.sheet("缺失"), Err(Error::SheetNotFound(_))));

        // saving twice does not duplicate appended strings
        reopened.strings.intern("追加");
        let bytes = reopened.to_bytes().unwrap();
        let bytes = XlsxWorkbook::from_bytes(bytes).unwrap().to_bytes().unwrap();
        let again = XlsxWorkbook::from_bytes(bytes).unwrap();
        assert_eq!(again.strings.len(), 2);
    }

    #[test]
    fn test_remove_sheet() {
        let mut wb = XlsxWorkbook::blank().unwrap();
        wb.add_sheet("临时").unwrap();
        let removed = wb.remove_sheet(0).unwrap();
        assert_eq!(removed.name, "Sheet1");
        assert!(matches!(wb.remove_sheet(0), Err(Error::InvalidData(_))));

        let bytes = wb.to_bytes().unwrap();
        let reopened = XlsxWorkbook::from_bytes(bytes).unwrap();
        assert_eq!(reopened.sheet_names(), vec!["临时"]);
        assert!(!reopened.package().exists("xl/worksheets/sheet1.xml"));
    }

    #[test]
    fn test_unique_sheet_name() {
        let mut wb = XlsxWorkbook::blank().unwrap();
        assert_eq!(wb.unique_sheet_name("sheet1"), "sheet1_1");
        assert_eq!(wb.unique_sheet_name("报表/2024"), "报表_2024");
        let long = "quarterly_results_by_region_and_product";
        let cut = wb.unique_sheet_name(long);
        assert_eq!(cut, "quarterly_results_by_region_...");
        wb.add_sheet(&cut).unwrap();
        let again = wb.unique_sheet_name(long);
        assert_eq!(again, "quarterly_results_by_region_._1");
        assert_eq!(again.chars().count(), 31);
    }

    #[test]
    fn test_remove_calc_chain() {
        let mut wb = XlsxWorkbook::blank().unwrap();
        wb.package_mut()
            .set_part("xl/calcChain.xml", b"<calcChain/>".to_vec());
        wb.package_mut()
            .add_relationship(
                "xl/workbook.xml",
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain",
                "calcChain.xml",
            )
            .unwrap();
        assert!(wb.remove_calc_chain().unwrap());
        assert!(!wb.package().exists("xl/calcChain.xml"));
        assert!(!wb.remove_calc_chain().unwrap());
    }
}
