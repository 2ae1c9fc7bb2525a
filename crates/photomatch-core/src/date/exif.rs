use chrono::{NaiveDate, NaiveDateTime};
use exif::{Exif, Field, In, Reader, Tag, Value};
use log::debug;
use regex::Regex;
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;
use std::sync::LazyLock;

use crate::photo::TimeSource;

/// Capture time plus the EXIF field that supplied it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTime {
    pub time: NaiveDateTime,
    pub source: TimeSource,
}

const PRIORITY: [(Tag, TimeSource); 3] = [
    (Tag::DateTimeOriginal, TimeSource::DateTimeOriginal),
    (Tag::DateTimeDigitized, TimeSource::DateTimeDigitized),
    (Tag::DateTime, TimeSource::DateTime),
];

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})\D(\d{2})\D(\d{2})").unwrap());
static DATE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})\D(\d{2})\D(\d{2})\s+(\d{1,2}):(\d{1,2}):(\d{1,2})$").unwrap()
});

/// Read the capture time of an image file.
/// Never fails: unreadable files and missing or broken metadata yield `None`.
pub fn extract_capture_time(path: &Path) -> Option<CaptureTime> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            debug!("Skipping {}: {}", path.display(), e);
            return None;
        }
    };
    let exif = match Reader::new().read_from_container(&mut BufReader::new(file)) {
        Ok(exif) => exif,
        Err(e) => {
            debug!("Skipping {}: no readable EXIF ({})", path.display(), e);
            return None;
        }
    };

    let result = capture_time_from_exif(&exif);
    if result.is_none() {
        debug!("Skipping {}: no usable EXIF date", path.display());
    }
    result
}

/// Same as [`extract_capture_time`] for an in-memory image.
pub fn extract_capture_time_from_bytes(bytes: &[u8]) -> Option<CaptureTime> {
    let exif = Reader::new().read_from_container(&mut Cursor::new(bytes)).ok()?;
    capture_time_from_exif(&exif)
}

/// EXIF datetimes have no timezone info - they are local time as-is.
/// The first present, non-empty field decides; a bad value there is not
/// rescued by a lower-priority field.
fn capture_time_from_exif(exif: &Exif) -> Option<CaptureTime> {
    for (tag, source) in PRIORITY {
        let Some(field) = exif.get_field(tag, In::PRIMARY) else {
            continue;
        };
        let Some(value) = field_text(field) else {
            continue;
        };
        let time = parse_exif_datetime(&value);
        if time.is_none() {
            debug!("Unparsable {} value '{}'", source, value);
        }
        return time.map(|time| CaptureTime { time, source });
    }

    None
}

fn field_text(field: &Field) -> Option<String> {
    let text = match field.value {
        Value::Ascii(ref parts) => parts
            .iter()
            .map(|p| String::from_utf8_lossy(p).trim().to_string())
            .find(|s| !s.is_empty())?,
        _ => field.display_value().to_string().trim_matches('"').trim().to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// `YYYY:MM:DD HH:MM:SS` with any non-digit date separator, or a bare date at midnight.
pub fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    if s.contains(' ') {
        let caps = DATE_TIME_RE.captures(s)?;
        let n = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();
        let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
        return NaiveDate::from_ymd_opt(year, n(2)?, n(3)?)?.and_hms_opt(n(4)?, n(5)?, n(6)?);
    }

    let caps = DATE_RE.captures(s)?;
    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
    let month = caps.get(2)?.as_str().parse::<u32>().ok()?;
    let day = caps.get(3)?.as_str().parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)
}
