use std::path::Path;

use calamine::{DataType, Range, Reader, Xlsx, open_workbook};
use chrono::{Duration, NaiveDateTime, NaiveTime};
use tracing::{debug, instrument};

use crate::error::{Result, ToolError};
use crate::model::{CellValue, Table};
use crate::normalize::{parse_date_text, spreadsheet_epoch};

/// Default 1-based row holding the column names.
pub const DEFAULT_HEADER_ROW: usize = 1;

/// Where the table lives inside the workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Sheet to read; the first sheet when `None`.
    pub sheet: Option<String>,
    /// 1-based sheet row holding the column names. Rows above it are ignored.
    pub header_row: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            sheet: None,
            header_row: DEFAULT_HEADER_ROW,
        }
    }
}

/// Reads one sheet of an `.xlsx` workbook as a long-form [`Table`].
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn read_table(path: &Path, options: &ReadOptions) -> Result<Table> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;

    let sheet_name = match &options.sheet {
        Some(name) => name.clone(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ToolError::EmptySheet(path.display().to_string()))?,
    };

    let range = read_required_sheet(&mut workbook, &sheet_name)?;
    let table = range_to_table(&range, &sheet_name, options.header_row)?;
    debug!(
        sheet = %sheet_name,
        columns = table.columns().len(),
        rows = table.len(),
        "read sheet"
    );
    Ok(table)
}

fn read_required_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| ToolError::MissingSheet(name.to_string()))?;
    let range = range_result.map_err(ToolError::from)?;
    Ok(range)
}

/// Converts a sheet range into a table whose header sits on the 1-based
/// `header_row` of the sheet. Rows where every cell is empty are skipped.
pub fn range_to_table(range: &Range<DataType>, sheet_name: &str, header_row: usize) -> Result<Table> {
    if header_row == 0 {
        return Err(ToolError::InvalidConfig(
            "header row is 1-based and must be at least 1".into(),
        ));
    }

    let Some((start_row, start_col)) = range.start() else {
        return Err(ToolError::EmptySheet(sheet_name.to_string()));
    };
    let (height, _) = range.get_size();
    let start_row = start_row as usize;
    let last_row = start_row + height;

    let header_index = header_row - 1;
    if header_index < start_row || header_index >= last_row {
        return Err(ToolError::HeaderOutOfRange {
            header_row,
            last_row,
        });
    }

    let mut rows = range.rows().skip(header_index - start_row);
    let columns: Vec<String> = rows
        .next()
        .map(|header| {
            header
                .iter()
                .map(|cell| cell_value(cell).display_text().unwrap_or_default())
                .collect()
        })
        .unwrap_or_default();

    let (row_numbers, data): (Vec<usize>, Vec<Vec<CellValue>>) = rows
        .enumerate()
        .map(|(offset, row)| {
            let cells: Vec<CellValue> = row.iter().map(cell_value).collect();
            (header_row + 1 + offset, cells)
        })
        .filter(|(_, cells)| !cells.iter().all(CellValue::is_missing))
        .unzip();

    Ok(Table::new(columns, data)
        .with_first_data_row(header_row + 1)
        .with_row_numbers(row_numbers)
        .with_first_column(start_col as usize))
}

/// Maps a calamine cell onto the tagged cell variant used by the pipeline.
pub fn cell_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::Empty | DataType::Error(_) => CellValue::Missing,
        DataType::String(value) if value.is_empty() => CellValue::Missing,
        DataType::String(value) => CellValue::Text(value.clone()),
        DataType::Float(value) => CellValue::Number(*value),
        DataType::Int(value) => CellValue::Number(*value as f64),
        DataType::Bool(value) => CellValue::Number(if *value { 1.0 } else { 0.0 }),
        DataType::DateTime(serial) => match serial_to_datetime(*serial) {
            Some(timestamp) => CellValue::Temporal(timestamp),
            None => CellValue::Number(*serial),
        },
        DataType::DateTimeIso(value) => match parse_date_text(value) {
            Some(timestamp) => CellValue::Temporal(timestamp),
            None => CellValue::Text(value.clone()),
        },
        other => CellValue::Text(other.to_string()),
    }
}

/// Converts a 1900-system day-serial into a timestamp.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let millis = (serial * 86_400_000.0).round();
    if millis.abs() > i64::MAX as f64 / 2.0 {
        return None;
    }
    spreadsheet_epoch()
        .and_time(NaiveTime::MIN)
        .checked_add_signed(Duration::milliseconds(millis as i64))
}
