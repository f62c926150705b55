//! Output directory and file names
//!
//! Every scan writes into `{out}/{sample}_{date}/`. Captures are named
//! `{sample}_{date}_{index}` for chips, `{sample}_{date}_{label}_{index}`
//! inside a wafer point directory, and `{sample}_{date}_{padded index}` for
//! area scans.

use chrono::NaiveDate;
use spotmapper_core::units::{date_stamp, padded_index};
use spotmapper_core::ScanError;
use std::path::{Path, PathBuf};

/// Reject sample names that cannot be used as a single path component
pub fn validate_sample(sample: &str) -> Result<(), ScanError> {
    let bad = sample.trim().is_empty()
        || sample == "."
        || sample == ".."
        || sample.contains(['/', '\\', '\0']);
    if bad {
        return Err(ScanError::InvalidSample {
            name: sample.to_string(),
        });
    }
    Ok(())
}

/// `{sample}_{YYYY-MM-DD}`, shared by the scan directory and every file in it
pub fn scan_stem(sample: &str, date: NaiveDate) -> String {
    format!("{}_{}", sample, date_stamp(date))
}

/// Chip-grid capture name
pub fn chip_capture(stem: &str, index: usize) -> String {
    format!("{}_{}", stem, index)
}

/// Capture name of one image of a wafer point sub-scan
pub fn point_capture(stem: &str, label: &str, index: usize) -> String {
    format!("{}_{}_{}", stem, label, index)
}

/// Area capture name, zero-padded to the digit count of `total`
pub fn area_capture(stem: &str, index: usize, total: usize) -> String {
    format!("{}_{}", stem, padded_index(index, total))
}

/// Composite file for a chip (no label) or a wafer point
pub fn stitch_output(dir: &Path, stem: &str, label: Option<&str>) -> PathBuf {
    match label {
        Some(label) => dir.join(format!("{}_{}_stitch.png", stem, label)),
        None => dir.join(format!("{}_stitch.png", stem)),
    }
}
