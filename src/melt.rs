//! Unpivot of a contiguous block of columns into long form.
//!
//! This is the inverse layout of [`crate::pivot`]: each selected value column
//! becomes one output row per input row, tagged with the column header. No size
//! normalization happens here.

use tracing::{debug, instrument};

use crate::error::{Result, ToolError};
use crate::model::{CellValue, Table};

/// Default header of the column holding the melted column names.
pub const DEFAULT_VAR_NAME: &str = "size";
/// Default header of the column holding the melted values.
pub const DEFAULT_VALUE_NAME: &str = "qty";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeltOptions {
    /// Columns copied onto every output row.
    pub id_columns: Vec<String>,
    /// Columns unpivoted, in output order.
    pub value_columns: Vec<String>,
    pub var_name: String,
    pub value_name: String,
    /// Emit rows for empty value cells too.
    pub keep_missing: bool,
}

impl MeltOptions {
    pub fn new(id_columns: Vec<String>, value_columns: Vec<String>) -> Self {
        Self {
            id_columns,
            value_columns,
            var_name: DEFAULT_VAR_NAME.to_string(),
            value_name: DEFAULT_VALUE_NAME.to_string(),
            keep_missing: false,
        }
    }
}

/// Turns `value_columns` into `(var, value)` pairs, one row per input row and
/// value column.
#[instrument(level = "debug", skip_all, fields(rows = table.len()))]
pub fn melt(table: &Table, options: &MeltOptions) -> Result<Table> {
    if options.value_columns.is_empty() {
        return Err(ToolError::InvalidColumnRange(
            "at least one value column is required".into(),
        ));
    }

    let id_indices = resolve(table, &options.id_columns)?;
    let value_indices = resolve(table, &options.value_columns)?;

    let mut columns = options.id_columns.clone();
    columns.push(options.var_name.clone());
    columns.push(options.value_name.clone());

    let mut rows = Vec::with_capacity(table.len() * value_indices.len());
    for row in table.rows() {
        for (&index, name) in value_indices.iter().zip(&options.value_columns) {
            let value = &row[index];
            if value.is_missing() && !options.keep_missing {
                continue;
            }

            let mut cells: Vec<CellValue> = id_indices.iter().map(|&id| row[id].clone()).collect();
            cells.push(CellValue::Text(name.clone()));
            cells.push(value.clone());
            rows.push(cells);
        }
    }

    debug!(output_rows = rows.len(), "melted value columns");
    Ok(Table::new(columns, rows))
}

/// Resolves a spreadsheet column range such as `D:H` (or a single letter) to
/// the header names of those columns, in sheet order.
pub fn parse_column_range(range: &str, table: &Table) -> Result<Vec<String>> {
    let (start, end) = match range.split_once(':') {
        Some((start, end)) => (start, end),
        None => (range, range),
    };

    let start = column_letter_index(start)?;
    let end = column_letter_index(end)?;
    if start > end {
        return Err(ToolError::InvalidColumnRange(format!(
            "'{range}' ends before it starts"
        )));
    }

    let offset = table.first_column();
    let last = offset + table.columns().len();
    if start < offset || end >= last {
        return Err(ToolError::InvalidColumnRange(format!(
            "'{range}' lies outside the used columns {}:{}",
            column_letter(offset),
            column_letter(last.saturating_sub(1)),
        )));
    }

    Ok(table.columns()[start - offset..=end - offset].to_vec())
}

/// 0-based index of a column letter: `A` is 0, `Z` is 25, `AA` is 26.
pub fn column_letter_index(letters: &str) -> Result<usize> {
    let letters = letters.trim();
    if letters.is_empty() || !letters.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return Err(ToolError::InvalidColumnRange(format!(
            "'{letters}' is not a column letter"
        )));
    }

    let mut index = 0usize;
    for ch in letters.chars() {
        let digit = (ch.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index
            .checked_mul(26)
            .and_then(|value| value.checked_add(digit))
            .ok_or_else(|| ToolError::InvalidColumnRange(format!("'{letters}' is too large")))?;
    }
    Ok(index - 1)
}

fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (index % 26) as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().collect()
}

fn resolve(table: &Table, names: &[String]) -> Result<Vec<usize>> {
    names
        .iter()
        .map(|name| {
            table
                .column_index(name)
                .ok_or_else(|| ToolError::MissingColumn {
                    column: name.clone(),
                    available: table.columns().to_vec(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_map_to_indices() {
        assert_eq!(column_letter_index("A").unwrap(), 0);
        assert_eq!(column_letter_index("z").unwrap(), 25);
        assert_eq!(column_letter_index("AA").unwrap(), 26);
        assert_eq!(column_letter_index("AZ").unwrap(), 51);
        assert!(column_letter_index("A1").is_err());
        assert!(column_letter_index("").is_err());
    }

    #[test]
    fn indices_map_back_to_letters() {
        for index in [0, 25, 26, 51, 52, 701, 702] {
            assert_eq!(column_letter_index(&column_letter(index)).unwrap(), index);
        }
    }
}
