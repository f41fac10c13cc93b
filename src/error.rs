use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the different failure cases that can occur when the
/// tool reads a workbook, reshapes it, or writes the result.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when a configuration file or report cannot be (de)serialised.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when a column named by the caller does not exist in the table.
    #[error("column not found: '{column}' (available: {})", available.join(", "))]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    /// Raised when the requested worksheet is absent from the workbook.
    #[error("sheet not found: '{0}'")]
    MissingSheet(String),

    /// Raised when the workbook has no worksheet or the sheet holds no cells.
    #[error("sheet '{0}' is empty")]
    EmptySheet(String),

    /// Raised when the header row lies outside the used area of the sheet.
    #[error("header row {header_row} is outside the sheet (last used row is {last_row})")]
    HeaderOutOfRange { header_row: usize, last_row: usize },

    /// Raised when a melt column range cannot be resolved.
    #[error("invalid column range: {0}")]
    InvalidColumnRange(String),

    /// Raised when configuration values are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
