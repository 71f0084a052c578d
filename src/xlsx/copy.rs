//! Copying cells from one workbook into another.

use super::cell;
use super::reference::CellRef;
use super::XlsxWorkbook;
use crate::xml::Element;
use std::collections::HashMap;

/// Copies cell values and formats out of `source`, importing each distinct
/// format into the target once.
///
/// Formulas are not carried over; the cached result is written instead.
pub(crate) struct CellCopier<'a> {
    source: &'a XlsxWorkbook,
    formats: HashMap<u32, u32>,
}

impl<'a> CellCopier<'a> {
    pub fn new(source: &'a XlsxWorkbook) -> Self {
        Self {
            source,
            formats: HashMap::new(),
        }
    }

    pub fn copy(&mut self, from: &Element, target: &mut XlsxWorkbook, sheet: usize, to: CellRef) {
        let source = self.source;
        let value = cell::read_value(from, &source.strings);
        let source_style = cell::style_index(from);
        let style = *self
            .formats
            .entry(source_style)
            .or_insert_with(|| target.styles.import_xf(&source.styles, source_style));
        let worksheet = &mut target.sheets[sheet].worksheet;
        worksheet.set_value(to, &value, &mut target.strings);
        worksheet.set_style(to, style);
    }
}
