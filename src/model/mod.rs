use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Header of the per-row total column.
pub const TOTAL_COLUMN: &str = "TOT";

/// A single cell as read from the input table.
///
/// The variant is decided once when the sheet is ingested so that later stages
/// never need to inspect the runtime type of a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum CellValue {
    /// Empty cell, error cell or anything without a usable value.
    Missing,
    /// Numeric cell. Booleans are stored as `1.0` / `0.0`.
    Number(f64),
    /// Free text, untrimmed.
    Text(String),
    /// A cell the reader typed as a calendar date or timestamp.
    Temporal(NaiveDateTime),
}

impl CellValue {
    /// Renders the cell as plain text, `None` when there is nothing to render.
    ///
    /// Integral numbers drop the trailing `.0` so that a numeric SKU `1234`
    /// reads the same whether it was typed as a number or as text.
    pub fn display_text(&self) -> Option<String> {
        match self {
            CellValue::Missing => None,
            CellValue::Number(value) => Some(format_number(*value)),
            CellValue::Text(value) => Some(value.clone()),
            CellValue::Temporal(value) => {
                if value.time().num_seconds_from_midnight() == 0 && value.nanosecond() == 0 {
                    Some(value.format("%Y-%m-%d").to_string())
                } else {
                    Some(value.format("%Y-%m-%d %H:%M:%S").to_string())
                }
            }
        }
    }

    /// Coerces the cell into a whole quantity, truncated toward zero.
    /// Anything that is not a number or a numeric string counts as zero.
    pub fn as_quantity(&self) -> f64 {
        let quantity = match self {
            CellValue::Number(value) if value.is_finite() => *value,
            CellValue::Text(value) => value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|parsed| parsed.is_finite())
                .unwrap_or(0.0),
            _ => 0.0,
        };
        quantity.trunc() + 0.0
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }
}

/// Formats a number without a trailing `.0` when it is integral.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Long-form table: ordered, unique column names and rows of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
    first_data_row: usize,
    /// Sheet row of each data row, when rows were skipped while reading.
    row_numbers: Vec<usize>,
    first_column: usize,
}

impl Table {
    /// Builds a table from a header and its data rows.
    ///
    /// Empty headers become `Unnamed: <index>` and repeated headers receive a
    /// `.1`, `.2`, ... suffix. Short rows are padded with [`CellValue::Missing`]
    /// and cells past the last header are discarded.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let columns = dedupe_headers(columns);
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Missing);
                row
            })
            .collect();

        Self {
            columns,
            rows,
            first_data_row: 2,
            row_numbers: Vec::new(),
            first_column: 0,
        }
    }

    /// Records the 1-based sheet row number of the first data row. Used to
    /// report dropped rows by the row number the operator sees.
    pub fn with_first_data_row(mut self, row: usize) -> Self {
        self.first_data_row = row;
        self
    }

    /// Records the 1-based sheet row number of every data row, for sheets
    /// where blank rows were skipped. Must have one entry per row.
    pub fn with_row_numbers(mut self, row_numbers: Vec<usize>) -> Self {
        if let Some(first) = row_numbers.first() {
            self.first_data_row = *first;
        }
        self.row_numbers = row_numbers;
        self
    }

    /// Records the 0-based sheet column of the first table column, so that
    /// spreadsheet column letters can be resolved against the header.
    pub fn with_first_column(mut self, column: usize) -> Self {
        self.first_column = column;
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn first_data_row(&self) -> usize {
        self.first_data_row
    }

    /// 1-based sheet row number of the data row at `index`.
    pub fn row_number(&self, index: usize) -> usize {
        self.row_numbers
            .get(index)
            .copied()
            .unwrap_or(self.first_data_row + index)
    }

    pub fn first_column(&self) -> usize {
        self.first_column
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the column with exactly this name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }
}

fn dedupe_headers(columns: Vec<String>) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut result = Vec::with_capacity(columns.len());

    for (index, raw) in columns.into_iter().enumerate() {
        let base = if raw.trim().is_empty() {
            format!("Unnamed: {index}")
        } else {
            raw
        };

        let mut candidate = base.clone();
        let mut counter = 1;
        while used.contains(&candidate) {
            candidate = format!("{base}.{counter}");
            counter += 1;
        }
        used.insert(candidate.clone());
        result.push(candidate);
    }

    result
}

/// Normalized numeric size used as the pivot key.
///
/// Ordering and equality follow [`f64::total_cmp`]; negative zero is folded
/// into positive zero on construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CanonicalSize(f64);

impl CanonicalSize {
    pub fn new(value: f64) -> Self {
        Self(value + 0.0)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for CanonicalSize {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CanonicalSize {}

impl PartialOrd for CanonicalSize {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CanonicalSize {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Pivot key of one output column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "value")]
pub enum SizeKey {
    /// Canonical numeric size.
    Numeric(CanonicalSize),
    /// Trimmed raw size text, used when numeric interpretation is disabled.
    Text(String),
}

/// One size column of the wide table together with its rendered header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeColumn {
    pub key: SizeKey,
    pub label: String,
}

/// One output row: an item key, its quantity per size column and the row total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WideRow {
    pub key: String,
    /// Quantities aligned with [`WideTable::sizes`].
    pub quantities: Vec<f64>,
    pub total: f64,
}

/// Wide-form result: one row per item key, one column per size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WideTable {
    pub key_column: String,
    pub include_total: bool,
    /// Size columns in ascending order.
    pub sizes: Vec<SizeColumn>,
    /// Rows in ascending item key order.
    pub rows: Vec<WideRow>,
}

impl WideTable {
    /// Header names in output order: key, `TOT` when enabled, then sizes.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.sizes.len() + 2);
        names.push(self.key_column.clone());
        if self.include_total {
            names.push(TOTAL_COLUMN.to_string());
        }
        names.extend(self.sizes.iter().map(|size| size.label.clone()));
        names
    }

    pub fn row(&self, key: &str) -> Option<&WideRow> {
        self.rows.iter().find(|row| row.key == key)
    }

    /// Quantity of `key` under the size column rendered as `label`.
    pub fn quantity(&self, key: &str, label: &str) -> Option<f64> {
        let position = self.sizes.iter().position(|size| size.label == label)?;
        self.row(key).map(|row| row.quantities[position])
    }

    /// Sum of the `TOT` column, or of every size cell when totals are off.
    pub fn output_total(&self) -> f64 {
        if self.include_total {
            self.rows.iter().map(|row| row.total).sum()
        } else {
            self.rows
                .iter()
                .flat_map(|row| row.quantities.iter())
                .sum()
        }
    }
}
