//! Conversion settings loaded from an optional JSON file.
//!
//! Values in the file act as defaults that command-line flags override; keys
//! left out fall back to the built-in defaults.
//!
//! ```json
//! {
//!   "header_row": 7,
//!   "size_range": { "min": 0, "max": 20 },
//!   "include_total": true,
//!   "size_mode": "numeric",
//!   "result_sheet": "RESULT",
//!   "calibration": {
//!     "epoch": "1899-12-30",
//!     "serial_offset": 46141,
//!     "serial_threshold": 1000,
//!     "size_decimals": 6
//!   }
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolError};
use crate::io::excel_read::DEFAULT_HEADER_ROW;
use crate::layout::RESULT_SHEET;
use crate::normalize::Calibration;
use crate::pivot::{SizeMode, SizeRange};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConversionConfig {
    /// 1-based sheet row holding the column names.
    pub header_row: usize,
    /// Sheet to read; the first sheet when absent.
    pub sheet: Option<String>,
    pub size_range: SizeRange,
    pub include_total: bool,
    pub size_mode: SizeMode,
    pub result_sheet: String,
    /// Write the dropped rows to a second sheet.
    pub dropped_sheet: bool,
    pub calibration: Calibration,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            header_row: DEFAULT_HEADER_ROW,
            sheet: None,
            size_range: SizeRange::default(),
            include_total: true,
            size_mode: SizeMode::default(),
            result_sheet: RESULT_SHEET.to_string(),
            dropped_sheet: false,
            calibration: Calibration::default(),
        }
    }
}

impl ConversionConfig {
    /// Reads and validates a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.header_row == 0 {
            return Err(ToolError::InvalidConfig(
                "header_row is 1-based and must be at least 1".into(),
            ));
        }
        if self.result_sheet.trim().is_empty() {
            return Err(ToolError::InvalidConfig(
                "result_sheet must not be empty".into(),
            ));
        }
        self.size_range.validate()?;
        self.calibration.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: ConversionConfig =
            serde_json::from_str(r#"{ "header_row": 7, "calibration": { "serial_offset": 46140 } }"#)
                .unwrap();

        assert_eq!(config.header_row, 7);
        assert!(config.include_total);
        assert_eq!(config.size_range, SizeRange::default());
        assert_eq!(config.calibration.serial_offset, 46_140.0);
        assert_eq!(config.calibration.serial_threshold, 1_000.0);
        assert_eq!(config.result_sheet, "RESULT");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(serde_json::from_str::<ConversionConfig>(r#"{ "heder_row": 2 }"#).is_err());
    }

    #[test]
    fn inverted_range_fails_validation() {
        let config = ConversionConfig {
            size_range: SizeRange::new(20.0, 0.0),
            ..ConversionConfig::default()
        };
        assert!(matches!(config.validate(), Err(ToolError::InvalidConfig(_))));
    }
}
