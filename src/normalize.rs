//! Interpretation of raw size cells as canonical numeric sizes.
//!
//! Spreadsheet tools often turn a small size such as `9` into a calendar date
//! (or into the day-serial number behind that date) when the column carries a
//! date format. The [`Calibration`] recovers the intended size from such
//! values. Its defaults are fixed: the anchor is serial day 46150 ⇒ size 9.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolError};
use crate::model::CellValue;

/// Day zero of the spreadsheet date system.
pub fn spreadsheet_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).expect("1899-12-30 is a valid date")
}

/// Subtracted from a day-serial to recover the size (46150 ⇒ 9).
pub const DEFAULT_SERIAL_OFFSET: f64 = 46_141.0;
/// Numbers whose magnitude exceeds this are treated as day-serials.
pub const DEFAULT_SERIAL_THRESHOLD: f64 = 1_000.0;
/// Distance from an integer under which a size renders as an integer label.
pub const DEFAULT_LABEL_EPSILON: f64 = 1e-9;
/// Decimal places canonical sizes are rounded to before grouping.
pub const DEFAULT_SIZE_DECIMALS: u32 = 6;

const TEXT_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

const TEXT_DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d.%m.%Y", "%d-%m-%Y"];

/// Calibration used to undo date coercion of size values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Epoch day counts are measured from.
    pub epoch: NaiveDate,
    /// Constant subtracted from a day count to obtain the size.
    pub serial_offset: f64,
    /// Magnitude above which a plain number is a day count.
    pub serial_threshold: f64,
    /// Tolerance used when rendering integral headers.
    pub label_epsilon: f64,
    /// Rounding applied right after normalization; `None` keeps raw floats.
    pub size_decimals: Option<u32>,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            epoch: spreadsheet_epoch(),
            serial_offset: DEFAULT_SERIAL_OFFSET,
            serial_threshold: DEFAULT_SERIAL_THRESHOLD,
            label_epsilon: DEFAULT_LABEL_EPSILON,
            size_decimals: Some(DEFAULT_SIZE_DECIMALS),
        }
    }
}

impl Calibration {
    /// Rejects values that would make normalization meaningless.
    pub fn validate(&self) -> Result<()> {
        if !self.serial_offset.is_finite() {
            return Err(ToolError::InvalidConfig(
                "serial_offset must be a finite number".into(),
            ));
        }
        if !self.serial_threshold.is_finite() || self.serial_threshold < 0.0 {
            return Err(ToolError::InvalidConfig(
                "serial_threshold must be a non-negative number".into(),
            ));
        }
        if !self.label_epsilon.is_finite() || self.label_epsilon < 0.0 {
            return Err(ToolError::InvalidConfig(
                "label_epsilon must be a non-negative number".into(),
            ));
        }
        if matches!(self.size_decimals, Some(decimals) if decimals > 12) {
            return Err(ToolError::InvalidConfig(
                "size_decimals must be at most 12".into(),
            ));
        }
        Ok(())
    }

    fn from_date(&self, date: NaiveDate) -> f64 {
        (date - self.epoch).num_days() as f64 - self.serial_offset
    }

    fn from_number(&self, value: f64) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }
        if value.abs() > self.serial_threshold {
            Some(value - self.serial_offset)
        } else {
            Some(value)
        }
    }

    fn round(&self, value: f64) -> f64 {
        match self.size_decimals {
            Some(decimals) => {
                let factor = 10f64.powi(decimals as i32);
                let scaled = value * factor;
                if scaled.is_finite() {
                    scaled.round() / factor
                } else {
                    value
                }
            }
            None => value,
        }
    }
}

/// Maps one size cell to its canonical size, `None` when it is unparsable.
pub fn normalize(value: &CellValue, calibration: &Calibration) -> Option<f64> {
    let raw = match value {
        CellValue::Missing => None,
        CellValue::Temporal(timestamp) => Some(calibration.from_date(timestamp.date())),
        CellValue::Number(number) => calibration.from_number(*number),
        CellValue::Text(text) => normalize_text(text, calibration),
    }?;

    let rounded = calibration.round(raw);
    rounded.is_finite().then_some(rounded + 0.0)
}

fn normalize_text(text: &str, calibration: &Calibration) -> Option<f64> {
    let trimmed = text.trim();
    let decimal = trimmed.replace(',', ".");
    let lowered = decimal.to_ascii_lowercase();
    if lowered.is_empty() || lowered == "nan" || lowered == "none" {
        return None;
    }

    if let Ok(number) = decimal.parse::<f64>() {
        return calibration.from_number(number);
    }

    parse_date_text(trimmed).map(|timestamp| calibration.from_date(timestamp.date()))
}

/// Parses the date spellings commonly produced by spreadsheet exports.
pub fn parse_date_text(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    for format in TEXT_DATETIME_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(text, format) {
            return Some(timestamp);
        }
    }

    TEXT_DATE_FORMATS.iter().find_map(|format| {
        NaiveDate::parse_from_str(text, format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    })
}

/// Renders a canonical size as a column header: `6` rather than `6.0`, and
/// `6.5` for fractional sizes.
pub fn render_size_label(value: f64, epsilon: f64) -> String {
    let nearest = value.round();
    if (value - nearest).abs() < epsilon {
        format!("{}", nearest as i64)
    } else {
        format!("{value}")
    }
}
