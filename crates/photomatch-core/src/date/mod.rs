pub mod cell;
pub mod exif;
pub mod freeform;
pub mod parse;

pub use cell::CellValue;
pub use self::exif::{extract_capture_time, CaptureTime};
pub use parse::{parse_cell, TimeParseError};

use chrono::NaiveDateTime;

/// Absolute difference between two timestamps in seconds, microsecond precision.
pub fn abs_diff_seconds(a: NaiveDateTime, b: NaiveDateTime) -> f64 {
    let delta = a - b;
    match delta.num_microseconds() {
        Some(us) => us.unsigned_abs() as f64 / 1_000_000.0,
        None => delta.num_seconds().unsigned_abs() as f64,
    }
}

/// Render a timestamp the way exports and manifests show it.
pub fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}
