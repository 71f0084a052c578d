//! Excel workbooks (.xlsx).
//!
//! [`XlsxWorkbook`] holds the package with its worksheets, shared strings and
//! styles parsed. Operations edit those in memory and the workbook writes the
//! changed parts back on save.
//!
//! # Example
//!
//! ```no_run
//! use redoc::xlsx::{fill_empty_cells, FillConfig, XlsxWorkbook};
//!
//! let mut workbook = XlsxWorkbook::open("data.xlsx")?;
//! let report = fill_empty_cells(&mut workbook, &FillConfig::default())?;
//! println!("filled {} cells", report.total());
//! workbook.save("data（已修改）.xlsx")?;
//! # Ok::<(), redoc::Error>(())
//! ```

pub mod cell;
mod cell_format;
mod copy;
mod fill;
mod format;
mod formulas;
mod merge;
mod pivot;
pub mod reference;
mod reorder;
mod shared_strings;
mod sheets;
pub mod styles;
mod template;
mod transpose;
mod workbook;
pub mod worksheet;

pub use cell::CellValue;
pub use cell_format::{
    apply_cell_formats, default_templates, detect_kind, CellFormatConfig, CellFormatReport, CellKind,
    ConditionRule, FormatOperation, OperationResult,
};
pub use fill::{fill_empty_cells, EmptyConditions, FillConfig, FillReport, SheetFill};
pub use format::{format_cells, FormatArea, FormatConfig, FormatReport, FormattedArea};
pub use formulas::{formula_to_value, FormulaConfig, FormulaReport, SheetFormulas};
pub use merge::{merge_opened, merge_workbooks, MergeReport, MergedFile, MergedSheet};
pub use pivot::{create_pivot_table, PivotConfig, PivotLayout, PivotReport, PivotSource};
pub use reference::{Area, CellRef, SheetRange};
pub use reorder::{reorder_columns, ReorderConfig, ReorderReport, SheetReorder};
pub use shared_strings::SharedStrings;
pub use sheets::{list_worksheets, SheetEntry, SheetListing};
pub use styles::Stylesheet;
pub use transpose::{transpose_worksheet, TransposeReport};
pub use workbook::{Sheet, XlsxWorkbook};
pub use worksheet::Worksheet;
