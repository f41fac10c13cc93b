use chrono::{Duration, NaiveTime};
use size_pivot::model::CellValue;
use size_pivot::normalize::{Calibration, normalize, render_size_label, spreadsheet_epoch};

fn size(value: CellValue) -> Option<f64> {
    normalize(&value, &Calibration::default())
}

fn text(value: &str) -> CellValue {
    CellValue::Text(value.to_string())
}

fn serial_day(days: i64) -> chrono::NaiveDateTime {
    spreadsheet_epoch().and_time(NaiveTime::MIN) + Duration::days(days)
}

#[test]
fn decimal_comma_and_whitespace_are_accepted() {
    assert_eq!(size(text("6,5")), Some(6.5));
    assert_eq!(size(CellValue::Number(6.5)), Some(6.5));
    assert_eq!(size(text(" 7 ")), Some(7.0));
    assert_eq!(size(text("8.5")), Some(8.5));
}

#[test]
fn date_serial_anchor_maps_to_size_nine() {
    assert_eq!(size(CellValue::Temporal(serial_day(46_150))), Some(9.0));
    assert_eq!(size(CellValue::Number(46_150.0)), Some(9.0));
    assert_eq!(size(text("46150")), Some(9.0));
}

#[test]
fn temporal_values_count_whole_days() {
    let evening = serial_day(46_150) + Duration::hours(18);
    assert_eq!(size(CellValue::Temporal(evening)), Some(9.0));
    assert_eq!(size(CellValue::Temporal(serial_day(46_151))), Some(10.0));
}

#[test]
fn date_text_is_corrected_like_typed_dates() {
    let date = serial_day(46_150).date();

    assert_eq!(size(text(&date.format("%Y-%m-%d").to_string())), Some(9.0));
    assert_eq!(size(text(&date.format("%d/%m/%Y").to_string())), Some(9.0));
    assert_eq!(
        size(text(&date.format("%Y-%m-%d 00:00:00").to_string())),
        Some(9.0)
    );
}

#[test]
fn threshold_only_applies_above_one_thousand() {
    assert_eq!(size(CellValue::Number(1_000.0)), Some(1_000.0));
    assert_eq!(size(CellValue::Number(1_000.5)), Some(1_000.5 - 46_141.0));
    assert_eq!(size(CellValue::Number(-1_500.0)), Some(-1_500.0 - 46_141.0));
}

#[test]
fn placeholders_and_garbage_are_unparsable() {
    assert_eq!(size(CellValue::Missing), None);
    assert_eq!(size(text("")), None);
    assert_eq!(size(text("   ")), None);
    assert_eq!(size(text("nan")), None);
    assert_eq!(size(text("None")), None);
    assert_eq!(size(text("XL")), None);
    assert_eq!(size(text("inf")), None);
    assert_eq!(size(CellValue::Number(f64::NAN)), None);
}

#[test]
fn calibration_constants_can_be_adjusted() {
    let calibration = Calibration {
        serial_offset: 46_140.0,
        serial_threshold: 50_000.0,
        ..Calibration::default()
    };

    assert_eq!(
        normalize(&CellValue::Temporal(serial_day(46_150)), &calibration),
        Some(10.0)
    );
    assert_eq!(
        normalize(&CellValue::Number(46_150.0), &calibration),
        Some(46_150.0)
    );
}

#[test]
fn near_integers_collapse_after_rounding() {
    assert_eq!(size(CellValue::Number(6.000_000_000_3)), Some(6.0));
    assert_eq!(size(CellValue::Number(6.25)), Some(6.25));
}

#[test]
fn headers_render_integers_without_fraction() {
    assert_eq!(render_size_label(6.0, 1e-9), "6");
    assert_eq!(render_size_label(6.5, 1e-9), "6.5");
    assert_eq!(render_size_label(6.000_000_000_1, 1e-9), "6");
    assert_eq!(render_size_label(0.0, 1e-9), "0");
    assert_eq!(render_size_label(-3.0, 1e-9), "-3");
}
