use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::pivot::Reconciliation;

/// JSON document describing one conversion, written next to the workbook so
/// dropped rows can be audited after the fact.
#[derive(Debug, Serialize)]
pub struct ConversionReport<'a> {
    pub input: String,
    pub output: String,
    pub key_column: &'a str,
    pub size_column: &'a str,
    pub quantity_column: &'a str,
    pub item_count: usize,
    pub size_labels: Vec<&'a str>,
    pub balanced: bool,
    #[serde(flatten)]
    pub reconciliation: &'a Reconciliation,
}

/// Serializes the report so it can be validated before any output is written.
pub fn render_report(report: &ConversionReport<'_>) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn write_report(path: &Path, rendered: &str) -> Result<()> {
    fs::write(path, rendered)?;
    Ok(())
}
