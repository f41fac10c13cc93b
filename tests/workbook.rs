use std::fs;
use std::path::Path;

use calamine::{DataType, Range, Reader, Xlsx, open_workbook};
use rust_xlsxwriter::{Format, Workbook};
use size_pivot::ToolError;
use size_pivot::convert::{self, ColumnSelection, MeltRequest, ValueColumns, WidenRequest};
use size_pivot::io::excel_read::{ReadOptions, read_table};
use size_pivot::model::CellValue;
use tempfile::tempdir;

fn write_order_sheet(path: &Path) {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("dd/mm/yyyy");
    let sheet = workbook.add_worksheet();
    sheet.set_name("Ordini").expect("sheet renamed");

    sheet.write_string(0, 0, "Order export").expect("title written");
    for (col, header) in ["Codice", "Taglia", "Qty"].iter().enumerate() {
        sheet.write_string(2, col as u16, *header).expect("header written");
    }

    sheet.write_string(3, 0, "A1").expect("cell written");
    sheet.write_number(3, 1, 6.0).expect("cell written");
    sheet.write_number(3, 2, 3.0).expect("cell written");

    sheet.write_string(4, 0, "A1").expect("cell written");
    sheet.write_string(4, 1, "6,5").expect("cell written");
    sheet.write_number(4, 2, 2.0).expect("cell written");

    sheet.write_string(5, 0, "A1").expect("cell written");
    sheet
        .write_number_with_format(5, 1, 46_150.0, &date_format)
        .expect("cell written");
    sheet.write_number(5, 2, 4.0).expect("cell written");

    sheet.write_string(6, 0, "B1").expect("cell written");
    sheet.write_number(6, 1, 6.0).expect("cell written");
    sheet.write_number(6, 2, 5.0).expect("cell written");

    sheet.write_string(7, 0, "B1").expect("cell written");
    sheet.write_number(7, 1, 42.0).expect("cell written");
    sheet.write_number(7, 2, 1.0).expect("cell written");

    sheet.write_string(8, 0, " ").expect("cell written");
    sheet.write_number(8, 1, 7.0).expect("cell written");
    sheet.write_number(8, 2, 9.0).expect("cell written");

    workbook.save(path).expect("input workbook saved");
}

fn order_request() -> WidenRequest {
    let mut request = WidenRequest::default();
    request.read.header_row = 3;
    request
}

fn read_sheet(path: &Path, name: &str) -> Range<DataType> {
    let mut workbook: Xlsx<_> = open_workbook(path).expect("output workbook opened");
    workbook
        .worksheet_range(name)
        .expect("sheet present")
        .expect("sheet readable")
}

fn row(range: &Range<DataType>, index: usize) -> Vec<DataType> {
    range.rows().nth(index).expect("row present").to_vec()
}

#[test]
fn widen_workbook_writes_result_sheet() {
    let temp_dir = tempdir().expect("temporary directory");
    let input = temp_dir.path().join("orders.xlsx");
    let output = temp_dir.path().join("wide.xlsx");
    write_order_sheet(&input);

    let pivoted =
        convert::widen_workbook(&input, &output, &order_request()).expect("conversion succeeds");

    let reconciliation = &pivoted.reconciliation;
    assert_eq!(reconciliation.source_total, 24.0);
    assert_eq!(reconciliation.output_total, 14.0);
    assert_eq!(reconciliation.dropped_total, 10.0);
    assert!(reconciliation.is_balanced());

    let result = read_sheet(&output, "RESULT");
    assert_eq!(
        row(&result, 0),
        [
            DataType::String("Codice".into()),
            DataType::String("TOT".into()),
            DataType::Float(6.0),
            DataType::Float(6.5),
            DataType::Float(9.0),
        ]
    );
    assert_eq!(
        row(&result, 1),
        [
            DataType::String("A1".into()),
            DataType::Float(9.0),
            DataType::Float(3.0),
            DataType::Float(2.0),
            DataType::Float(4.0),
        ]
    );
    assert_eq!(
        row(&result, 2),
        [
            DataType::String("B1".into()),
            DataType::Float(5.0),
            DataType::Float(5.0),
            DataType::Float(0.0),
            DataType::Float(0.0),
        ]
    );
    assert_eq!(result.rows().count(), 3);
}

#[test]
fn dropped_rows_are_listed_with_sheet_row_numbers() {
    let temp_dir = tempdir().expect("temporary directory");
    let input = temp_dir.path().join("orders.xlsx");
    let output = temp_dir.path().join("wide.xlsx");
    write_order_sheet(&input);

    let mut request = order_request();
    request.layout.include_dropped = true;
    convert::widen_workbook(&input, &output, &request).expect("conversion succeeds");

    let dropped = read_sheet(&output, "DROPPED");
    assert_eq!(dropped.rows().count(), 3);
    assert_eq!(
        row(&dropped, 1),
        [
            DataType::Float(8.0),
            DataType::String("B1".into()),
            DataType::String("42".into()),
            DataType::Float(42.0),
            DataType::Float(1.0),
            DataType::String("size out of range".into()),
        ]
    );
    assert_eq!(row(&dropped, 2)[0], DataType::Float(9.0));
    assert_eq!(row(&dropped, 2)[5], DataType::String("empty key".into()));
}

#[test]
fn report_records_reconciliation() {
    let temp_dir = tempdir().expect("temporary directory");
    let input = temp_dir.path().join("orders.xlsx");
    let output = temp_dir.path().join("wide.xlsx");
    let report_path = temp_dir.path().join("report.json");
    write_order_sheet(&input);

    let mut request = order_request();
    request.report = Some(report_path.clone());
    convert::widen_workbook(&input, &output, &request).expect("conversion succeeds");

    let written = fs::read_to_string(&report_path).expect("report read");
    let report: serde_json::Value = serde_json::from_str(&written).expect("report parsed");

    assert_eq!(report["key_column"], "Codice");
    assert_eq!(report["size_column"], "Taglia");
    assert_eq!(report["source_total"], 24.0);
    assert_eq!(report["output_total"], 14.0);
    assert_eq!(report["balanced"], true);
    assert_eq!(report["size_labels"], serde_json::json!(["6", "6.5", "9"]));
    assert_eq!(
        report["dropped_rows"].as_array().map(Vec::len),
        Some(2)
    );
}

#[test]
fn failed_report_leaves_no_workbook_behind() {
    let temp_dir = tempdir().expect("temporary directory");
    let input = temp_dir.path().join("orders.xlsx");
    let output = temp_dir.path().join("wide.xlsx");
    write_order_sheet(&input);

    let mut request = order_request();
    request.report = Some(temp_dir.path().join("missing").join("report.json"));
    let result = convert::widen_workbook(&input, &output, &request);

    assert!(matches!(result, Err(ToolError::Io(_))));
    assert!(!output.exists());
}

#[test]
fn dropped_rows_after_a_blank_row_keep_their_sheet_row() {
    let temp_dir = tempdir().expect("temporary directory");
    let input = temp_dir.path().join("gaps.xlsx");
    let output = temp_dir.path().join("wide.xlsx");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in ["SKU", "Size", "Qty"].iter().enumerate() {
        sheet.write_string(0, col as u16, *header).expect("header written");
    }
    sheet.write_string(1, 0, "A1").expect("cell written");
    sheet.write_number(1, 1, 6.0).expect("cell written");
    sheet.write_number(1, 2, 2.0).expect("cell written");
    sheet.write_string(3, 0, "A1").expect("cell written");
    sheet.write_string(3, 1, "XL").expect("cell written");
    sheet.write_number(3, 2, 1.0).expect("cell written");
    workbook.save(&input).expect("input workbook saved");

    let pivoted = convert::widen_workbook(&input, &output, &WidenRequest::default())
        .expect("conversion succeeds");

    let dropped = &pivoted.reconciliation.dropped_rows;
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].row, 4);
}

#[test]
fn typed_date_cells_are_read_as_temporal() {
    let temp_dir = tempdir().expect("temporary directory");
    let input = temp_dir.path().join("orders.xlsx");
    write_order_sheet(&input);

    let table = read_table(
        &input,
        &ReadOptions {
            sheet: Some("Ordini".into()),
            header_row: 3,
        },
    )
    .expect("sheet read");

    assert_eq!(table.columns(), ["Codice", "Taglia", "Qty"]);
    assert_eq!(table.len(), 6);
    assert_eq!(table.first_data_row(), 4);
    assert!(matches!(table.rows()[2][1], CellValue::Temporal(_)));
}

#[test]
fn unknown_column_aborts_without_output() {
    let temp_dir = tempdir().expect("temporary directory");
    let input = temp_dir.path().join("orders.xlsx");
    let output = temp_dir.path().join("wide.xlsx");
    write_order_sheet(&input);

    let mut request = order_request();
    request.columns = ColumnSelection {
        key: Some("SKU".into()),
        ..ColumnSelection::default()
    };
    let result = convert::widen_workbook(&input, &output, &request);

    assert!(matches!(result, Err(ToolError::MissingColumn { column, .. }) if column == "SKU"));
    assert!(!output.exists());
}

#[test]
fn missing_input_and_sheet_are_reported() {
    let temp_dir = tempdir().expect("temporary directory");
    let input = temp_dir.path().join("orders.xlsx");
    let output = temp_dir.path().join("wide.xlsx");

    let result = convert::widen_workbook(&input, &output, &order_request());
    assert!(matches!(result, Err(ToolError::MissingInput(_))));

    write_order_sheet(&input);
    let mut request = order_request();
    request.read.sheet = Some("Foglio2".into());
    let result = convert::widen_workbook(&input, &output, &request);
    assert!(matches!(result, Err(ToolError::MissingSheet(name)) if name == "Foglio2"));
}

#[test]
fn melt_then_widen_restores_the_wide_sheet() {
    let temp_dir = tempdir().expect("temporary directory");
    let wide_input = temp_dir.path().join("wide_in.xlsx");
    let long_output = temp_dir.path().join("long.xlsx");
    let wide_output = temp_dir.path().join("wide_out.xlsx");

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "SKU").expect("header written");
    sheet.write_string(0, 1, "Descrizione").expect("header written");
    sheet.write_number(0, 2, 6.0).expect("header written");
    sheet.write_number(0, 3, 6.5).expect("header written");
    sheet.write_number(0, 4, 7.0).expect("header written");
    sheet.write_string(1, 0, "A1").expect("cell written");
    sheet.write_string(1, 1, "Sneaker").expect("cell written");
    sheet.write_number(1, 2, 3.0).expect("cell written");
    sheet.write_number(1, 4, 1.0).expect("cell written");
    sheet.write_string(2, 0, "B1").expect("cell written");
    sheet.write_string(2, 1, "Boot").expect("cell written");
    sheet.write_number(2, 3, 2.0).expect("cell written");
    workbook.save(&wide_input).expect("wide workbook saved");

    let melt_request = MeltRequest {
        read: ReadOptions::default(),
        id_columns: vec!["SKU".into()],
        value_columns: ValueColumns::Range("C:E".into()),
        var_name: "size".into(),
        value_name: "qty".into(),
        keep_missing: false,
        result_sheet: "RESULT".into(),
    };
    let long = convert::melt_workbook(&wide_input, &long_output, &melt_request)
        .expect("melt succeeds");
    assert_eq!(long.columns(), ["SKU", "size", "qty"]);
    assert_eq!(long.len(), 3);

    let mut request = WidenRequest::default();
    request.columns = ColumnSelection {
        key: Some("SKU".into()),
        size: Some("size".into()),
        quantity: Some("qty".into()),
    };
    let pivoted =
        convert::widen_workbook(&long_output, &wide_output, &request).expect("widen succeeds");

    assert_eq!(pivoted.table.column_names(), ["SKU", "TOT", "6", "6.5", "7"]);
    assert_eq!(pivoted.table.quantity("A1", "6"), Some(3.0));
    assert_eq!(pivoted.table.quantity("A1", "7"), Some(1.0));
    assert_eq!(pivoted.table.quantity("B1", "6.5"), Some(2.0));
    assert_eq!(pivoted.table.row("B1").map(|row| row.total), Some(2.0));
}

#[test]
fn melt_rejects_range_outside_the_header() {
    let temp_dir = tempdir().expect("temporary directory");
    let input = temp_dir.path().join("orders.xlsx");
    let output = temp_dir.path().join("long.xlsx");
    write_order_sheet(&input);

    let request = MeltRequest {
        read: ReadOptions {
            sheet: None,
            header_row: 3,
        },
        id_columns: vec!["Codice".into()],
        value_columns: ValueColumns::Range("B:F".into()),
        var_name: "size".into(),
        value_name: "qty".into(),
        keep_missing: false,
        result_sheet: "RESULT".into(),
    };

    assert!(matches!(
        convert::melt_workbook(&input, &output, &request),
        Err(ToolError::InvalidColumnRange(_))
    ));
}
