use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use super::cell::CellValue;
use super::freeform;

const EMPTY_MESSAGE: &str = "Empty/NaN value";

/// Why a cell could not be turned into a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TimeParseError(String);

impl TimeParseError {
    fn empty() -> Self {
        Self(EMPTY_MESSAGE.to_string())
    }

    fn exhausted(raw: &str, cell: &CellValue) -> Self {
        Self(format!(
            "Failed all parses (raw: '{}') | Type: {}",
            raw,
            cell.kind()
        ))
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Layout {
    DateTime,
    DateOnly,
}

struct DayFirstFormat {
    format: &'static str,
    /// `true` for `%Y` (exactly four year digits), `false` for `%y` (exactly two).
    century: bool,
    layout: Layout,
}

const fn dt(format: &'static str, century: bool) -> DayFirstFormat {
    DayFirstFormat { format, century, layout: Layout::DateTime }
}

const fn date_only(format: &'static str, century: bool) -> DayFirstFormat {
    DayFirstFormat { format, century, layout: Layout::DateOnly }
}

/// Explicit day-first layouts, tried in order.
static DAY_FIRST_FORMATS: &[DayFirstFormat] = &[
    dt("%d/%m/%Y %H:%M:%S", true),
    dt("%d/%m/%Y %I:%M:%S %p", true),
    dt("%d/%m/%Y %H:%M", true),
    dt("%d/%m/%Y %I:%M %p", true),
    dt("%d/%m/%Y %H:%M:%S%.f", true),
    dt("%d/%m/%Y %I:%M:%S%.f %p", true),
    date_only("%d/%m/%Y", true),
    dt("%d/%m/%y %H:%M:%S", false),
    dt("%d/%m/%y %I:%M:%S %p", false),
    dt("%d/%m/%y %H:%M", false),
    dt("%d/%m/%y %I:%M %p", false),
    dt("%d/%m/%y %H:%M:%S%.f", false),
    dt("%d/%m/%y %I:%M:%S%.f %p", false),
    date_only("%d/%m/%y", false),
];

type Strategy = fn(&str) -> Option<NaiveDateTime>;

/// String strategies in precedence order. First success wins.
static STRATEGIES: &[Strategy] = &[
    parse_serial_text,
    parse_day_first_formats,
    freeform::parse_day_first,
    retry_with_seconds,
];

// chrono's %Y happily reads "24" as year 24, so the year width is checked up front.
static SLASH_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}/\d{1,2}/(?P<year>\d+)").unwrap());

/// Normalize one event-log cell into a timestamp.
///
/// Empty cells fail immediately and typed date/time cells pass through. Numbers
/// are spreadsheet serial dates. Text is tried against [`DAY_FIRST_FORMATS`]
/// and then a free-form day-first parse, in that order.
pub fn parse_cell(cell: &CellValue) -> Result<NaiveDateTime, TimeParseError> {
    if cell.is_empty() {
        return Err(TimeParseError::empty());
    }

    let raw = match cell {
        CellValue::DateTime(dt) => return Ok(*dt),
        CellValue::Number(n) => {
            if let Some(dt) = from_serial(*n) {
                return Ok(dt);
            }
            n.to_string()
        }
        CellValue::Text(s) => s.trim().to_string(),
        CellValue::Empty => return Err(TimeParseError::empty()),
    };

    STRATEGIES
        .iter()
        .find_map(|strategy| strategy(&raw))
        .ok_or_else(|| TimeParseError::exhausted(&raw, cell))
}

/// Convenience wrapper for callers holding plain text.
pub fn parse_text(raw: &str) -> Result<NaiveDateTime, TimeParseError> {
    parse_cell(&CellValue::Text(raw.to_string()))
}

fn serial_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)
}

/// Spreadsheet serial date: days since 1899-12-30, fraction is time of day.
///
/// Results outside the range of a nanosecond `i64` timestamp (1677-09-21 to
/// 2262-04-11) are rejected, so values like `20240403` fall through to the
/// text strategies.
pub fn from_serial(days: f64) -> Option<NaiveDateTime> {
    if !days.is_finite() {
        return None;
    }
    let seconds = (days * 86_400.0).round();
    if seconds.abs() >= i64::MAX as f64 {
        return None;
    }
    let delta = TimeDelta::try_seconds(seconds as i64)?;
    let dt = serial_epoch()?.checked_add_signed(delta)?;

    let earliest = DateTime::from_timestamp_nanos(i64::MIN).naive_utc();
    let latest = DateTime::from_timestamp_nanos(i64::MAX).naive_utc();
    (earliest..=latest).contains(&dt).then_some(dt)
}

fn parse_serial_text(raw: &str) -> Option<NaiveDateTime> {
    raw.parse::<f64>().ok().and_then(from_serial)
}

fn parse_day_first_formats(raw: &str) -> Option<NaiveDateTime> {
    let year_digits = SLASH_DATE_RE.captures(raw)?.name("year")?.as_str().len();

    DAY_FIRST_FORMATS
        .iter()
        .filter(|f| year_digits == if f.century { 4 } else { 2 })
        .find_map(|f| match f.layout {
            Layout::DateTime => NaiveDateTime::parse_from_str(raw, f.format).ok(),
            Layout::DateOnly => NaiveDate::parse_from_str(raw, f.format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
        })
}

/// "<date> <hh>:<mm> ..." with no seconds: keep the first two tokens and pad seconds.
fn retry_with_seconds(raw: &str) -> Option<NaiveDateTime> {
    if raw.matches(':').count() != 1 {
        return None;
    }
    let mut parts = raw.split_whitespace();
    let date = parts.next()?;
    let time = parts.next()?;
    let padded = format!("{} {}:00", date, time);

    parse_day_first_formats(&padded).or_else(|| freeform::parse_day_first(&padded))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_empty_values() {
        for cell in [
            CellValue::Empty,
            CellValue::Text("  ".into()),
            CellValue::Number(f64::NAN),
        ] {
            let err = parse_cell(&cell).unwrap_err();
            assert_eq!(err.message(), "Empty/NaN value");
        }
    }

    #[test]
    fn test_native_datetime_passes_through() {
        let t = at(2024, 5, 6, 7, 8, 9);
        assert_eq!(parse_cell(&CellValue::DateTime(t)), Ok(t));
    }

    #[test]
    fn test_serial_dates() {
        assert_eq!(parse_cell(&CellValue::Number(45292.5)), Ok(at(2024, 1, 1, 12, 0, 0)));
        assert_eq!(parse_cell(&CellValue::Number(0.0)), Ok(at(1899, 12, 30, 0, 0, 0)));
        assert_eq!(parse_cell(&CellValue::Number(1.25)), Ok(at(1899, 12, 31, 6, 0, 0)));
        // Numeric text is a serial date too.
        assert_eq!(parse_text("45292.75"), Ok(at(2024, 1, 1, 18, 0, 0)));
    }

    #[test]
    fn test_serial_rounds_to_nearest_second() {
        // 0.4 s past noon rounds down, 0.6 s rounds up.
        let noon = 45292.5;
        assert_eq!(
            from_serial(noon + 0.4 / 86_400.0),
            Some(at(2024, 1, 1, 12, 0, 0))
        );
        assert_eq!(
            from_serial(noon + 0.6 / 86_400.0),
            Some(at(2024, 1, 1, 12, 0, 1))
        );
    }

    #[test]
    fn test_serial_rejects_non_finite() {
        assert_eq!(from_serial(f64::INFINITY), None);
        assert_eq!(from_serial(1e300), None);
        assert!(parse_text("inf").is_err());
    }

    #[test]
    fn test_out_of_range_serial_falls_through_to_text() {
        assert_eq!(from_serial(20240403.0), None);
        assert_eq!(from_serial(-81_184.0), None);
        assert_eq!(from_serial(132_321.0), None);
        assert_eq!(from_serial(-60_000.0), Some(at(1735, 9, 21, 0, 0, 0)));

        assert_eq!(parse_text("20240403"), Ok(at(2024, 4, 3, 0, 0, 0)));
        assert_eq!(parse_cell(&CellValue::Number(20240403.0)), Ok(at(2024, 4, 3, 0, 0, 0)));
        assert_eq!(parse_text("20240403 101530"), Ok(at(2024, 4, 3, 10, 15, 30)));
        assert_eq!(parse_text("20240403T101530"), Ok(at(2024, 4, 3, 10, 15, 30)));
    }

    #[test]
    fn test_day_first_full() {
        assert_eq!(parse_text("03/04/2024 10:15:30"), Ok(at(2024, 4, 3, 10, 15, 30)));
        assert_eq!(parse_text("03/04/2024 10:15:30 PM"), Ok(at(2024, 4, 3, 22, 15, 30)));
        assert_eq!(parse_text("3/4/2024 9:05:00 am"), Ok(at(2024, 4, 3, 9, 5, 0)));
    }

    #[test]
    fn test_day_first_partial_times() {
        assert_eq!(parse_text("13/01/2024 10:15"), Ok(at(2024, 1, 13, 10, 15, 0)));
        assert_eq!(parse_text("13/01/2024 12:15 AM"), Ok(at(2024, 1, 13, 0, 15, 0)));
    }

    #[test]
    fn test_fractional_seconds() {
        let parsed = parse_text("13/01/2024 10:15:30.250").unwrap();
        assert_eq!(parsed, at(2024, 1, 13, 10, 15, 30) + TimeDelta::milliseconds(250));
    }

    #[test]
    fn test_date_only_is_midnight() {
        assert_eq!(parse_text("03/04/2024"), Ok(at(2024, 4, 3, 0, 0, 0)));
        assert_eq!(parse_text("03/04/24"), Ok(at(2024, 4, 3, 0, 0, 0)));
    }

    #[test]
    fn test_two_digit_years_are_not_year_zero() {
        assert_eq!(parse_text("03/04/24 10:15:30"), Ok(at(2024, 4, 3, 10, 15, 30)));
        assert_eq!(parse_text("03/04/99 10:15 pm"), Ok(at(1999, 4, 3, 22, 15, 0)));
    }

    #[test]
    fn test_free_form_fallback() {
        assert_eq!(parse_text("2024-04-03 10:15:30"), Ok(at(2024, 4, 3, 10, 15, 30)));
        assert_eq!(parse_text("03-04-2024 10:15"), Ok(at(2024, 4, 3, 10, 15, 0)));
        assert_eq!(parse_text("3 Apr 2024 10:15"), Ok(at(2024, 4, 3, 10, 15, 0)));
    }

    #[test]
    fn test_trailing_note_retried_with_seconds() {
        assert_eq!(
            parse_text("03/04/2024 10:15 approx"),
            Ok(at(2024, 4, 3, 10, 15, 0))
        );
    }

    #[test]
    fn test_failure_message_embeds_raw_value() {
        let err = parse_text("  not a time ").unwrap_err();
        assert_eq!(
            err.message(),
            "Failed all parses (raw: 'not a time') | Type: text"
        );
        assert!(parse_text("31/02/2024 10:00:00").is_err());
    }
}
