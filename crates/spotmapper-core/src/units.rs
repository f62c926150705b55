//! Unit conversion and formatting utilities
//!
//! Handles step/millimetre display and the date and index formatting used
//! in capture file names.

use crate::data::AxisSettings;
use chrono::NaiveDate;

/// Format a step count for display, with millimetres when calibrated
pub fn format_steps(steps: i64, axis: &AxisSettings) -> String {
    match axis.steps_to_mm(steps) {
        Some(mm) => format!("{} steps ({:.3} mm)", steps, mm),
        None => format!("{} steps", steps),
    }
}

/// Date stamp used in scan directory and file names (`YYYY-MM-DD`)
pub fn date_stamp(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Number of digits needed to print `total` (i.e. `ceil(log10(total + 1))`)
///
/// Zero needs no digits.
pub fn index_width(total: usize) -> usize {
    let mut width = 0;
    let mut n = total;
    while n > 0 {
        width += 1;
        n /= 10;
    }
    width
}

/// Zero-pad a 1-based capture index to the width needed for `total`
pub fn padded_index(index: usize, total: usize) -> String {
    format!("{:0width$}", index, width = index_width(total))
}

/// Grid label of a wafer-cross point, e.g. `00x20` or `-10x00`
///
/// Coordinates are in millimetres from the wafer centre; zero prints as `00`.
pub fn grid_label(x_mm: i64, y_mm: i64) -> String {
    fn part(v: i64) -> String {
        if v == 0 {
            "00".to_string()
        } else {
            v.to_string()
        }
    }
    format!("{}x{}", part(x_mm), part(y_mm))
}
