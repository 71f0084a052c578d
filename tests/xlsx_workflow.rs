//! Workbooks edited on disk the way the CLI does it.

use redoc::output::{modified_path, transposed_path};
use redoc::xlsx::{self, CellRef, CellValue, FillConfig, XlsxWorkbook};
use redoc::config;
use std::path::{Path, PathBuf};

fn write_workbook(dir: &Path, name: &str, values: &[(u32, u32, CellValue)]) -> PathBuf {
    let mut wb = XlsxWorkbook::blank().unwrap();
    for (row, col, value) in values {
        wb.sheets[0]
            .worksheet
            .set_value(CellRef::new(*row, *col), value, &mut wb.strings);
    }
    let path = dir.join(name);
    wb.save(&path).unwrap();
    path
}

#[test]
fn test_transpose_to_new_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_workbook(
        dir.path(),
        "数据.xlsx",
        &[
            (1, 1, CellValue::Text("姓名".into())),
            (1, 2, CellValue::Text("分数".into())),
            (2, 1, CellValue::Text("张三".into())),
            (2, 2, CellValue::Number(90.0)),
        ],
    );

    let wb = XlsxWorkbook::open(&input).unwrap();
    let (mut transposed, report) = xlsx::transpose_worksheet(&wb, "Sheet1").unwrap();
    let output = transposed_path(&input);
    transposed.save(&output).unwrap();
    assert_eq!(output.file_name().unwrap(), "数据（转置）.xlsx");
    assert_eq!(report.before, (2, 2));

    let reopened = XlsxWorkbook::open(&output).unwrap();
    assert_eq!(reopened.sheet_names(), vec!["Sheet1_转置"]);
    let ws = &reopened.sheets[0].worksheet;
    assert_eq!(
        ws.value(CellRef::new(2, 1), &reopened.strings),
        CellValue::Text("分数".into())
    );
    assert_eq!(
        ws.value(CellRef::new(2, 2), &reopened.strings),
        CellValue::Number(90.0)
    );
}

#[test]
fn test_fill_with_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_workbook(
        dir.path(),
        "填充.xlsx",
        &[
            (1, 1, CellValue::Text("A".into())),
            (3, 1, CellValue::Text("C".into())),
        ],
    );
    let settings = dir.path().join("fill.toml");
    std::fs::write(&settings, "areas = [\"A1:A3\"]\nfill_value = \"-\"\n").unwrap();

    let config: FillConfig = config::load(&settings).unwrap();
    let mut wb = XlsxWorkbook::open(&input).unwrap();
    let report = xlsx::fill_empty_cells(&mut wb, &config).unwrap();
    assert_eq!(report.total(), 1);
    let output = modified_path(&input);
    wb.save(&output).unwrap();

    let reopened = XlsxWorkbook::open(&output).unwrap();
    assert_eq!(
        reopened.sheets[0]
            .worksheet
            .value(CellRef::new(2, 1), &reopened.strings),
        CellValue::Text("-".into())
    );
}

#[test]
fn test_merge_workbooks_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_workbook(dir.path(), "一月.xlsx", &[(1, 1, CellValue::Number(1.0))]);
    let second = write_workbook(dir.path(), "二月.xlsx", &[(1, 1, CellValue::Number(2.0))]);

    let (mut merged, report) = xlsx::merge_workbooks(&[&first, &second]).unwrap();
    assert_eq!(report.total_sheets(), 2);
    let output = dir.path().join("合并.xlsx");
    merged.save(&output).unwrap();

    let listing = xlsx::list_worksheets(&XlsxWorkbook::open(&output).unwrap());
    assert_eq!(listing.names(), vec!["一月_Sheet1", "二月_Sheet1"]);
    assert_eq!((listing.sheets[1].rows, listing.sheets[1].columns), (1, 1));
}
