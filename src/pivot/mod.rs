//! Long-to-wide aggregation of inventory rows.
//!
//! [`aggregate`] groups rows by item key and canonical size, sums quantities and
//! lays the result out as one row per item key and one column per size.

mod guess;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{Result, ToolError};
use crate::model::{CanonicalSize, CellValue, SizeColumn, SizeKey, Table, WideRow, WideTable};
use crate::normalize::{Calibration, normalize, render_size_label};

pub use guess::{ColumnGuess, guess_columns};

/// Default lower bound of the accepted size range.
pub const DEFAULT_SIZE_MIN: f64 = 0.0;
/// Default upper bound of the accepted size range.
pub const DEFAULT_SIZE_MAX: f64 = 20.0;

/// Inclusive range of accepted canonical sizes. A missing bound is open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Default for SizeRange {
    fn default() -> Self {
        Self {
            min: Some(DEFAULT_SIZE_MIN),
            max: Some(DEFAULT_SIZE_MAX),
        }
    }
}

impl SizeRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// A range that accepts every parsable size.
    pub fn unbounded() -> Self {
        Self {
            min: None,
            max: None,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }

    pub fn validate(&self) -> Result<()> {
        for bound in [self.min, self.max].into_iter().flatten() {
            if !bound.is_finite() {
                return Err(ToolError::InvalidConfig(format!(
                    "size range bound {bound} is not a finite number"
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(ToolError::InvalidConfig(format!(
                    "size range minimum {min} is greater than maximum {max}"
                )));
            }
        }
        Ok(())
    }
}

/// How size cells become pivot keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeMode {
    /// Normalize to canonical numeric sizes and apply the size range.
    #[default]
    Numeric,
    /// Use the trimmed cell text as is; columns sort lexicographically.
    Text,
}

/// Parameters of one aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotOptions {
    pub key_column: String,
    pub size_column: String,
    pub quantity_column: String,
    pub range: SizeRange,
    pub include_total: bool,
    pub mode: SizeMode,
    pub calibration: Calibration,
}

impl PivotOptions {
    /// Options with the default range `[0, 20]`, totals on and numeric sizes.
    pub fn new(
        key_column: impl Into<String>,
        size_column: impl Into<String>,
        quantity_column: impl Into<String>,
    ) -> Self {
        Self {
            key_column: key_column.into(),
            size_column: size_column.into(),
            quantity_column: quantity_column.into(),
            range: SizeRange::default(),
            include_total: true,
            mode: SizeMode::default(),
            calibration: Calibration::default(),
        }
    }
}

/// Why a row did not reach the wide table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The item key was missing or blank.
    EmptyKey,
    /// The size could not be interpreted.
    Unparsable,
    /// The canonical size fell outside the accepted range.
    OutOfRange,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::EmptyKey => write!(f, "empty key"),
            DropReason::Unparsable => write!(f, "unparsable size"),
            DropReason::OutOfRange => write!(f, "size out of range"),
        }
    }
}

/// A row excluded from the output, kept so totals can be reconciled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedRow {
    /// 1-based row number in the source sheet.
    pub row: usize,
    pub item_key: String,
    /// The size cell as text, `None` when it was empty.
    pub size_value: Option<String>,
    /// The canonical size, when one could be computed.
    pub normalized: Option<f64>,
    pub quantity: f64,
    pub reason: DropReason,
}

/// Source-vs-output quantity totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    /// Coerced quantity summed over every input row.
    pub source_total: f64,
    /// Sum of the `TOT` column, or of all size cells when totals are off.
    pub output_total: f64,
    /// Quantity carried by dropped rows.
    pub dropped_total: f64,
    pub rows_read: usize,
    pub rows_kept: usize,
    pub dropped_rows: Vec<DroppedRow>,
}

impl Reconciliation {
    /// True when every source unit is either in the output or accounted for
    /// by a dropped row.
    pub fn is_balanced(&self) -> bool {
        let difference = self.source_total - self.output_total - self.dropped_total;
        difference.abs() <= 1e-9 * self.source_total.abs().max(1.0)
    }
}

/// Result of [`aggregate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pivoted {
    pub table: WideTable,
    pub reconciliation: Reconciliation,
}

/// Pivots a long-form table into wide form.
///
/// Fails only when one of the named columns is missing; row-level problems
/// are recorded in [`Reconciliation::dropped_rows`]. The input is not modified.
#[instrument(
    level = "debug",
    skip_all,
    fields(rows = table.len(), key = %options.key_column, size = %options.size_column)
)]
pub fn aggregate(table: &Table, options: &PivotOptions) -> Result<Pivoted> {
    let key_idx = require_column(table, &options.key_column)?;
    let size_idx = require_column(table, &options.size_column)?;
    let qty_idx = require_column(table, &options.quantity_column)?;
    options.range.validate()?;
    options.calibration.validate()?;

    let mut groups: BTreeMap<String, BTreeMap<SizeKey, f64>> = BTreeMap::new();
    let mut size_keys: BTreeSet<SizeKey> = BTreeSet::new();
    let mut dropped_rows: Vec<DroppedRow> = Vec::new();
    let mut source_total = 0.0;

    for (offset, row) in table.rows().iter().enumerate() {
        let quantity = row[qty_idx].as_quantity();
        source_total += quantity;

        let size_cell = &row[size_idx];
        let item_key = row[key_idx]
            .display_text()
            .map(|text| text.trim().to_string())
            .unwrap_or_default();

        let record = |reason: DropReason, normalized: Option<f64>| DroppedRow {
            row: table.row_number(offset),
            item_key: item_key.clone(),
            size_value: size_cell.display_text(),
            normalized,
            quantity,
            reason,
        };

        if item_key.is_empty() {
            dropped_rows.push(record(DropReason::EmptyKey, None));
            continue;
        }

        let size_key = match size_key_for(size_cell, options) {
            Ok(key) => key,
            Err((reason, normalized)) => {
                dropped_rows.push(record(reason, normalized));
                continue;
            }
        };

        size_keys.insert(size_key.clone());
        *groups
            .entry(item_key)
            .or_default()
            .entry(size_key)
            .or_insert(0.0) += quantity;
    }

    let sizes: Vec<SizeColumn> = size_keys
        .into_iter()
        .map(|key| {
            let label = match &key {
                SizeKey::Numeric(size) => {
                    render_size_label(size.value(), options.calibration.label_epsilon)
                }
                SizeKey::Text(text) => text.clone(),
            };
            SizeColumn { key, label }
        })
        .collect();

    let rows: Vec<WideRow> = groups
        .into_iter()
        .map(|(key, cells)| {
            let quantities: Vec<f64> = sizes
                .iter()
                .map(|size| cells.get(&size.key).copied().unwrap_or(0.0))
                .collect();
            let total = quantities.iter().sum();
            WideRow {
                key,
                quantities,
                total,
            }
        })
        .collect();

    let wide = WideTable {
        key_column: options.key_column.clone(),
        include_total: options.include_total,
        sizes,
        rows,
    };

    let dropped_total = dropped_rows.iter().map(|row| row.quantity).sum();
    let reconciliation = Reconciliation {
        source_total,
        output_total: wide.output_total(),
        dropped_total,
        rows_read: table.len(),
        rows_kept: table.len() - dropped_rows.len(),
        dropped_rows,
    };

    debug!(
        item_count = wide.rows.len(),
        size_count = wide.sizes.len(),
        "pivoted rows into wide layout"
    );
    if !reconciliation.dropped_rows.is_empty() {
        warn!(
            dropped = reconciliation.dropped_rows.len(),
            dropped_total = reconciliation.dropped_total,
            "rows excluded from the wide table"
        );
    }

    Ok(Pivoted {
        table: wide,
        reconciliation,
    })
}

fn size_key_for(
    cell: &CellValue,
    options: &PivotOptions,
) -> std::result::Result<SizeKey, (DropReason, Option<f64>)> {
    match options.mode {
        SizeMode::Numeric => {
            let size = normalize(cell, &options.calibration).ok_or((DropReason::Unparsable, None))?;
            if options.range.contains(size) {
                Ok(SizeKey::Numeric(CanonicalSize::new(size)))
            } else {
                Err((DropReason::OutOfRange, Some(size)))
            }
        }
        SizeMode::Text => cell
            .display_text()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .map(SizeKey::Text)
            .ok_or((DropReason::Unparsable, None)),
    }
}

fn require_column(table: &Table, name: &str) -> Result<usize> {
    table
        .column_index(name)
        .ok_or_else(|| ToolError::MissingColumn {
            column: name.to_string(),
            available: table.columns().to_vec(),
        })
}
