use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::config::ConversionConfig;
use crate::error::{Result, ToolError};
use crate::io::excel_read::{self, ReadOptions};
use crate::io::excel_write;
use crate::io::report::{ConversionReport, render_report, write_report};
use crate::layout::{SheetLayout, build_workbook, table_workbook};
use crate::melt::{MeltOptions, melt, parse_column_range};
use crate::model::Table;
use crate::normalize::Calibration;
use crate::pivot::{PivotOptions, Pivoted, SizeMode, SizeRange, aggregate, guess_columns};

/// Column names chosen by the caller; `None` lets the header decide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSelection {
    pub key: Option<String>,
    pub size: Option<String>,
    pub quantity: Option<String>,
}

/// Everything needed to turn a long-form workbook into a wide-form one.
#[derive(Debug, Clone, PartialEq)]
pub struct WidenRequest {
    pub read: ReadOptions,
    pub columns: ColumnSelection,
    pub range: SizeRange,
    pub include_total: bool,
    pub mode: SizeMode,
    pub calibration: Calibration,
    pub layout: SheetLayout,
    /// Optional JSON report path.
    pub report: Option<PathBuf>,
}

impl WidenRequest {
    /// Builds a request from configuration values; columns are left to the
    /// caller or to header guessing.
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            read: ReadOptions {
                sheet: config.sheet.clone(),
                header_row: config.header_row,
            },
            columns: ColumnSelection::default(),
            range: config.size_range,
            include_total: config.include_total,
            mode: config.size_mode,
            calibration: config.calibration.clone(),
            layout: SheetLayout {
                result_sheet: config.result_sheet.clone(),
                include_dropped: config.dropped_sheet,
            },
            report: None,
        }
    }

    /// Resolves the column selection against the table header.
    pub fn pivot_options(&self, table: &Table) -> PivotOptions {
        let guess = guess_columns(table);
        let pick = |chosen: &Option<String>, guessed: Option<String>| {
            chosen.clone().or(guessed).unwrap_or_default()
        };

        PivotOptions {
            key_column: pick(&self.columns.key, guess.key_column),
            size_column: pick(&self.columns.size, guess.size_column),
            quantity_column: pick(&self.columns.quantity, guess.quantity_column),
            range: self.range,
            include_total: self.include_total,
            mode: self.mode,
            calibration: self.calibration.clone(),
        }
    }
}

impl Default for WidenRequest {
    fn default() -> Self {
        Self::from_config(&ConversionConfig::default())
    }
}

/// Reads a long-form workbook, pivots it and writes the wide-form workbook.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), output = %output.display())
)]
pub fn widen_workbook(input: &Path, output: &Path, request: &WidenRequest) -> Result<Pivoted> {
    if !input.exists() {
        return Err(ToolError::MissingInput(input.to_path_buf()));
    }

    let table = excel_read::read_table(input, &request.read)?;
    info!(row_count = table.len(), "read long-form rows");

    let options = request.pivot_options(&table);
    debug!(
        key = %options.key_column,
        size = %options.size_column,
        qty = %options.quantity_column,
        "resolved columns"
    );

    let pivoted = aggregate(&table, &options)?;
    let reconciliation = &pivoted.reconciliation;

    let rendered_report = match &request.report {
        Some(report_path) => {
            let report = ConversionReport {
                input: input.display().to_string(),
                output: output.display().to_string(),
                key_column: &options.key_column,
                size_column: &options.size_column,
                quantity_column: &options.quantity_column,
                item_count: pivoted.table.rows.len(),
                size_labels: pivoted
                    .table
                    .sizes
                    .iter()
                    .map(|size| size.label.as_str())
                    .collect(),
                balanced: reconciliation.is_balanced(),
                reconciliation,
            };
            Some((report_path, render_report(&report)?))
        }
        None => None,
    };

    let workbook = build_workbook(&pivoted, &request.layout);
    excel_write::write_workbook(output, &workbook)?;

    if let Some((report_path, rendered)) = &rendered_report {
        if let Err(error) = write_report(report_path, rendered) {
            if let Err(cleanup) = fs::remove_file(output) {
                warn!(error = %cleanup, "could not remove workbook after report failure");
            }
            return Err(error);
        }
        debug!(report = %report_path.display(), "report written");
    }

    info!(
        item_count = pivoted.table.rows.len(),
        size_count = pivoted.table.sizes.len(),
        source_total = reconciliation.source_total,
        output_total = reconciliation.output_total,
        "wide workbook written"
    );
    if reconciliation.source_total != reconciliation.output_total {
        warn!(
            difference = reconciliation.source_total - reconciliation.output_total,
            "output total differs from source total"
        );
    }

    Ok(pivoted)
}

/// Which columns to unpivot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueColumns {
    /// Spreadsheet letters such as `D:H`.
    Range(String),
    /// Explicit header names.
    Names(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeltRequest {
    pub read: ReadOptions,
    pub id_columns: Vec<String>,
    pub value_columns: ValueColumns,
    pub var_name: String,
    pub value_name: String,
    pub keep_missing: bool,
    pub result_sheet: String,
}

/// Reads a wide workbook and writes the selected columns back in long form.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), output = %output.display())
)]
pub fn melt_workbook(input: &Path, output: &Path, request: &MeltRequest) -> Result<Table> {
    if !input.exists() {
        return Err(ToolError::MissingInput(input.to_path_buf()));
    }

    let table = excel_read::read_table(input, &request.read)?;
    info!(row_count = table.len(), "read wide rows");

    let value_columns = match &request.value_columns {
        ValueColumns::Range(range) => parse_column_range(range, &table)?,
        ValueColumns::Names(names) => names.clone(),
    };
    debug!(?value_columns, "resolved value columns");

    let options = MeltOptions {
        id_columns: request.id_columns.clone(),
        value_columns,
        var_name: request.var_name.clone(),
        value_name: request.value_name.clone(),
        keep_missing: request.keep_missing,
    };
    let long = melt(&table, &options)?;

    excel_write::write_workbook(output, &table_workbook(&long, &request.result_sheet))?;
    info!(row_count = long.len(), "long workbook written");
    Ok(long)
}
