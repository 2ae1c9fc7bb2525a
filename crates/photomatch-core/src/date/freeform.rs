use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;

// Every date pattern exposes `day`, `month`, `year` and an optional trailing `time`.
static DMY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<day>\d{1,2})[/.\-](?P<month>\d{1,2})[/.\-](?P<year>\d{4}|\d{2})(?:(?:T|\s+)(?P<time>.+))?$").unwrap()
});
static YMD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<year>\d{4})[/.\-](?P<month>\d{1,2})[/.\-](?P<day>\d{1,2})(?:(?:T|\s+)(?P<time>.+))?$").unwrap()
});
static DAY_NAMED_MONTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<day>\d{1,2})(?:st|nd|rd|th)?[\s/.,\-]+(?P<month>[a-z]{3,9})\.?[\s/.,\-]+(?P<year>\d{4}|\d{2})(?:,?\s+(?P<time>.+))?$").unwrap()
});
static NAMED_MONTH_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<month>[a-z]{3,9})\.?\s+(?P<day>\d{1,2})(?:st|nd|rd|th)?,?\s+(?P<year>\d{4})(?:,?\s+(?P<time>.+))?$").unwrap()
});
static COMPACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<year>\d{4})(?P<month>\d{2})(?P<day>\d{2})(?:(?:T|\s+)(?P<time>.+))?$").unwrap()
});
static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<hour>\d{1,2})(?::(?P<minute>\d{2})(?::(?P<second>\d{2})(?:[.,](?P<fraction>\d{1,9}))?)?)?\s*(?:(?P<meridiem>[ap])\.?m\.?)?$").unwrap()
});
static COMPACT_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<hour>\d{2})(?P<minute>\d{2})(?P<second>\d{2})?$").unwrap());

static DATE_PATTERNS: &[&LazyLock<Regex>] = &[
    &DMY_RE,
    &YMD_RE,
    &DAY_NAMED_MONTH_RE,
    &NAMED_MONTH_DAY_RE,
    &COMPACT_RE,
];

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];

/// Lenient day-first parse for strings none of the fixed layouts accepted.
///
/// Numeric dates are always read day-first unless they lead with a
/// four-digit year. A missing time means midnight.
pub fn parse_day_first(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATE_PATTERNS.iter().find_map(|re| {
        let caps = re.captures(raw)?;
        let day: u32 = caps.name("day")?.as_str().parse().ok()?;
        let month = parse_month(caps.name("month")?.as_str())?;
        let year = expand_year(caps.name("year")?.as_str())?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;

        match caps.name("time") {
            Some(time) => parse_time_of_day(date, time.as_str().trim()),
            None => date.and_hms_opt(0, 0, 0),
        }
    })
}

fn parse_month(s: &str) -> Option<u32> {
    if let Ok(n) = s.parse::<u32>() {
        return Some(n);
    }
    let lower = s.to_lowercase();
    if lower == "sept" {
        return Some(9);
    }
    MONTHS
        .iter()
        .position(|name| lower.len() >= 3 && name.starts_with(&lower))
        .map(|i| i as u32 + 1)
}

/// Two-digit years pivot like `%y`: 00-69 is 20xx, 70-99 is 19xx.
fn expand_year(s: &str) -> Option<i32> {
    let year: i32 = s.parse().ok()?;
    match s.len() {
        2 if year < 70 => Some(2000 + year),
        2 => Some(1900 + year),
        4 => Some(year),
        _ => None,
    }
}

fn parse_time_of_day(date: NaiveDate, s: &str) -> Option<NaiveDateTime> {
    let caps = TIME_RE.captures(s).or_else(|| COMPACT_TIME_RE.captures(s))?;
    let mut hour: u32 = caps.name("hour")?.as_str().parse().ok()?;
    let minute: u32 = match caps.name("minute") {
        Some(m) => m.as_str().parse().ok()?,
        // A bare hour is only a time when it carries AM/PM.
        None if caps.name("meridiem").is_some() => 0,
        None => return None,
    };
    let second: u32 = caps.name("second").map_or(Some(0), |m| m.as_str().parse().ok())?;
    let nano = caps.name("fraction").map_or(Some(0), |m| fraction_to_nanos(m.as_str()))?;

    if let Some(meridiem) = caps.name("meridiem") {
        if !(1..=12).contains(&hour) {
            return None;
        }
        let pm = meridiem.as_str().eq_ignore_ascii_case("p");
        hour = match (hour, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };
    }

    date.and_hms_nano_opt(hour, minute, second, nano)
}

fn fraction_to_nanos(digits: &str) -> Option<u32> {
    let padded = format!("{:0<9}", digits);
    padded.get(..9)?.parse().ok()
}
