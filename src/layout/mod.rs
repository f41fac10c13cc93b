use std::collections::HashSet;

use chrono::NaiveDateTime;

use crate::model::{CellValue, SizeKey, TOTAL_COLUMN, Table, WideTable};
use crate::normalize::spreadsheet_epoch;
use crate::pivot::{DroppedRow, Pivoted};

/// Default name of the sheet holding the wide table.
pub const RESULT_SHEET: &str = "RESULT";
/// Default name of the sheet listing dropped rows.
pub const DROPPED_SHEET: &str = "DROPPED";

const MAX_SHEET_NAME_LEN: usize = 31;

/// A value as it will be written to a worksheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetCell {
    Empty,
    Text(String),
    Number(f64),
    /// Day-serial relative to the spreadsheet epoch, written with a date format.
    Date(f64),
}

/// A table that will be materialised as an Excel sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub sheet_name: String,
    pub columns: Vec<SheetCell>,
    pub rows: Vec<Vec<SheetCell>>,
}

/// Represents all tables required to materialise the Excel workbook.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkbookData {
    pub tables: Vec<SheetTable>,
}

/// Which sheets a conversion writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    pub result_sheet: String,
    /// Also write a sheet listing the rows dropped by the size filter.
    pub include_dropped: bool,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            result_sheet: RESULT_SHEET.to_string(),
            include_dropped: false,
        }
    }
}

/// Lays the pivot result out as workbook sheets: the wide table first, then
/// optionally the dropped rows.
pub fn build_workbook(pivoted: &Pivoted, layout: &SheetLayout) -> WorkbookData {
    let mut sheet_names = SheetNameRegistry::default();

    let mut tables = vec![wide_sheet(
        &pivoted.table,
        sheet_names.assign(&layout.result_sheet),
    )];

    if layout.include_dropped {
        tables.push(dropped_sheet(
            &pivoted.reconciliation.dropped_rows,
            sheet_names.assign(DROPPED_SHEET),
        ));
    }

    WorkbookData { tables }
}

/// Wraps a plain table into a single-sheet workbook.
pub fn table_workbook(table: &Table, sheet_name: &str) -> WorkbookData {
    let mut sheet_names = SheetNameRegistry::default();
    WorkbookData {
        tables: vec![table_sheet(table, sheet_names.assign(sheet_name))],
    }
}

fn wide_sheet(table: &WideTable, sheet_name: String) -> SheetTable {
    let mut columns = Vec::with_capacity(table.sizes.len() + 2);
    columns.push(SheetCell::Text(table.key_column.clone()));
    if table.include_total {
        columns.push(SheetCell::Text(TOTAL_COLUMN.to_string()));
    }
    columns.extend(table.sizes.iter().map(|size| match &size.key {
        SizeKey::Numeric(value) => SheetCell::Number(label_value(&size.label, value.value())),
        SizeKey::Text(text) => SheetCell::Text(text.clone()),
    }));

    let rows = table
        .rows
        .iter()
        .map(|row| {
            let mut cells = Vec::with_capacity(columns.len());
            cells.push(SheetCell::Text(row.key.clone()));
            if table.include_total {
                cells.push(SheetCell::Number(row.total));
            }
            cells.extend(row.quantities.iter().map(|quantity| SheetCell::Number(*quantity)));
            cells
        })
        .collect();

    SheetTable {
        sheet_name,
        columns,
        rows,
    }
}

// Integral labels are written as the integer so the header cell shows `6`.
fn label_value(label: &str, value: f64) -> f64 {
    label.parse::<i64>().map(|integer| integer as f64).unwrap_or(value)
}

fn dropped_sheet(dropped: &[DroppedRow], sheet_name: String) -> SheetTable {
    let columns = ["row", "key", "size", "normalized", "qty", "reason"]
        .into_iter()
        .map(|name| SheetCell::Text(name.to_string()))
        .collect();

    let rows = dropped
        .iter()
        .map(|row| {
            vec![
                SheetCell::Number(row.row as f64),
                text_or_empty(&row.item_key),
                row.size_value
                    .clone()
                    .map_or(SheetCell::Empty, SheetCell::Text),
                row.normalized.map_or(SheetCell::Empty, SheetCell::Number),
                SheetCell::Number(row.quantity),
                SheetCell::Text(row.reason.to_string()),
            ]
        })
        .collect();

    SheetTable {
        sheet_name,
        columns,
        rows,
    }
}

fn text_or_empty(value: &str) -> SheetCell {
    if value.is_empty() {
        SheetCell::Empty
    } else {
        SheetCell::Text(value.to_string())
    }
}

fn table_sheet(table: &Table, sheet_name: String) -> SheetTable {
    let columns = table
        .columns()
        .iter()
        .map(|name| SheetCell::Text(name.clone()))
        .collect();

    let rows = table
        .rows()
        .iter()
        .map(|row| row.iter().map(cell_to_sheet).collect())
        .collect();

    SheetTable {
        sheet_name,
        columns,
        rows,
    }
}

fn cell_to_sheet(cell: &CellValue) -> SheetCell {
    match cell {
        CellValue::Missing => SheetCell::Empty,
        CellValue::Number(value) => SheetCell::Number(*value),
        CellValue::Text(value) => SheetCell::Text(value.clone()),
        CellValue::Temporal(value) => SheetCell::Date(to_serial(value)),
    }
}

fn to_serial(timestamp: &NaiveDateTime) -> f64 {
    let epoch = spreadsheet_epoch().and_time(chrono::NaiveTime::MIN);
    (*timestamp - epoch).num_milliseconds() as f64 / 86_400_000.0
}

#[derive(Debug, Default)]
struct SheetNameRegistry {
    used: HashSet<String>,
}

impl SheetNameRegistry {
    fn assign(&mut self, raw: &str) -> String {
        let base = sanitize_sheet_name(raw);
        if self.used.insert(base.clone()) {
            return base;
        }

        let mut counter = 1;
        loop {
            let suffix = format!("_{counter}");
            let prefix: String = base
                .chars()
                .take(MAX_SHEET_NAME_LEN - suffix.len())
                .collect();
            let candidate = format!("{prefix}{suffix}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }
}

/// Replaces characters Excel forbids in sheet names and enforces the
/// 31-character limit.
pub fn sanitize_sheet_name(raw: &str) -> String {
    let invalid = [':', '\\', '/', '?', '*', '[', ']', '\''];
    let sanitized: String = raw
        .chars()
        .map(|ch| {
            if invalid.contains(&ch) || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect();

    let sanitized = sanitized.trim();
    if sanitized.is_empty() {
        return RESULT_SHEET.to_string();
    }

    sanitized.chars().take(MAX_SHEET_NAME_LEN).collect()
}
