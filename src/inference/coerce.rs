//! Text → typed value parsers shared by inference and the operators.
//!
//! Each parser takes one raw value and either returns the typed value or a [`ParseError`].
//! Inference turns a `ParseError` into a missing cell; `fill_null` turns it into a
//! `TypeConversion` error.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use regex::Regex;

use crate::error::ParseError;

/// Case-insensitive tokens accepted as `true`.
pub const TRUE_TOKENS: [&str; 4] = ["true", "yes", "t", "1"];
/// Case-insensitive tokens accepted as `false`.
pub const FALSE_TOKENS: [&str; 4] = ["false", "no", "f", "0"];

static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,4})([/.\-])(\d{1,2})([/.\-])(\d{1,4})$").expect("valid date regex")
});

static CLOCK_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+)\s*days?,?\s*)?(\d+):(\d{2}):(\d{2})(?:\.(\d{1,9}))?$")
        .expect("valid clock regex")
});

static UNIT_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d+(?:\.\d+)?\s*[a-zµ]+\s*,?\s*)+$").expect("valid unit regex")
});

static UNIT_COMPONENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)(?:\.(\d+))?\s*([a-zµ]+)").expect("valid component regex")
});

const TIME_FORMATS: [&str; 4] = ["%H:%M:%S%.f", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];

const NAMED_MONTH_DATE_FORMATS: [&str; 7] = [
    "%d %B %Y",
    "%d-%B-%Y",
    "%d-%B-%y",
    "%d %B, %Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%a, %d %B %Y",
];

const NAMED_MONTH_DATETIME_FORMATS: [&str; 4] = [
    "%d %B %Y %H:%M:%S",
    "%d %B %Y %H:%M",
    "%B %d, %Y %H:%M:%S",
    "%a, %d %B %Y %H:%M:%S",
];

/// Parse a 64-bit integer after stripping surrounding quotes and thousands separators.
///
/// `"1,000"` and `'"42"'` both parse; `"1.5"` does not.
pub fn parse_integer(raw: &str) -> Result<i64, ParseError> {
    let stripped = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .replace(',', "");
    stripped
        .trim()
        .parse::<i64>()
        .map_err(|_| ParseError::new(raw, "integer"))
}

/// Parse a float (plain Rust float syntax, surrounding whitespace ignored).
pub fn parse_float(raw: &str) -> Result<f64, ParseError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ParseError::new(raw, "float"))
}

/// Match the fixed boolean vocabulary, case-insensitively.
pub fn parse_bool(raw: &str) -> Result<bool, ParseError> {
    let lowered = raw.trim().to_ascii_lowercase();
    if TRUE_TOKENS.contains(&lowered.as_str()) {
        Ok(true)
    } else if FALSE_TOKENS.contains(&lowered.as_str()) {
        Ok(false)
    } else {
        Err(ParseError::new(raw, "boolean"))
    }
}

/// Mixed-format date parser.
///
/// Accepts ISO dates and timestamps (RFC 3339 offsets are normalised to UTC), numeric
/// `a/b/c` dates with `/`, `-` or `.` separators, and month-name forms such as
/// `10 Nov 2012` or `November 10, 2012`. For numeric dates without a leading four-digit year,
/// `day_first` decides whether `10/11/12` means 10 November or October 11; if the preferred
/// reading is not a valid date the other one is tried. Two-digit years `00..=68` map to
/// `20xx`, `69..=99` to `19xx`. Bare numbers are never dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateParser {
    pub day_first: bool,
}

impl Default for DateParser {
    fn default() -> Self {
        Self { day_first: true }
    }
}

impl DateParser {
    pub fn new(day_first: bool) -> Self {
        Self { day_first }
    }

    pub fn parse(&self, raw: &str) -> Result<NaiveDateTime, ParseError> {
        let s = raw.trim();
        let err = || ParseError::new(raw, "datetime");
        if s.is_empty() || !s.bytes().any(|b| b.is_ascii_digit()) {
            return Err(err());
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.naive_utc());
        }
        if let Some(dt) = self.parse_numeric(s) {
            return Ok(dt);
        }
        parse_named_month(s).ok_or_else(err)
    }

    fn parse_numeric(&self, s: &str) -> Option<NaiveDateTime> {
        let (date_part, time_part) = split_date_time(s);
        let caps = NUMERIC_DATE.captures(date_part)?;
        if caps[2] != caps[4] {
            return None;
        }
        let (a, b, c) = (&caps[1], &caps[3], &caps[5]);

        let date = if a.len() == 4 {
            if c.len() > 2 {
                return None;
            }
            NaiveDate::from_ymd_opt(a.parse().ok()?, b.parse().ok()?, c.parse().ok()?)?
        } else {
            if a.len() > 2 {
                return None;
            }
            let year = expand_year(c)?;
            let (first, second): (u32, u32) = (a.parse().ok()?, b.parse().ok()?);
            let (day, month) = if self.day_first {
                (first, second)
            } else {
                (second, first)
            };
            NaiveDate::from_ymd_opt(year, month, day)
                .or_else(|| NaiveDate::from_ymd_opt(year, day, month))?
        };

        let time = match time_part {
            Some(t) => parse_time(t)?,
            None => NaiveTime::MIN,
        };
        Some(date.and_time(time))
    }
}

fn split_date_time(s: &str) -> (&str, Option<&str>) {
    if let Some((date, time)) = s.split_once('T') {
        if date.ends_with(|c: char| c.is_ascii_digit()) && time.starts_with(|c: char| c.is_ascii_digit()) {
            return (date, Some(time));
        }
    }
    match s.split_once(char::is_whitespace) {
        Some((date, time)) => (date, Some(time.trim())),
        None => (s, None),
    }
}

fn parse_time(t: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(t, fmt).ok())
}

fn expand_year(raw: &str) -> Option<i32> {
    let y: i32 = raw.parse().ok()?;
    match raw.len() {
        4 => Some(y),
        1 | 2 if y < 69 => Some(2000 + y),
        1 | 2 => Some(1900 + y),
        _ => None,
    }
}

fn parse_named_month(s: &str) -> Option<NaiveDateTime> {
    NAMED_MONTH_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NAMED_MONTH_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Parse duration-like text.
///
/// Accepted shapes:
///
/// - clock: `01:30:00`, `1:30:00.25`, optionally prefixed by `N day(s)` (`2 days 01:30:00`)
/// - unit sequences: `2 days`, `1h 30m`, `1.5 hours`, `500ms`, `3 weeks, 2 days`
///
/// A leading `-` negates the whole duration. Bare numbers are rejected.
pub fn parse_duration(raw: &str) -> Result<TimeDelta, ParseError> {
    let err = || ParseError::new(raw, "duration");
    let lowered = raw.trim().to_lowercase();
    let (negative, body) = match lowered.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, lowered.strip_prefix('+').unwrap_or(&lowered).trim_start()),
    };

    let nanos = if let Some(caps) = CLOCK_DURATION.captures(body) {
        clock_nanos(&caps).ok_or_else(err)?
    } else if UNIT_DURATION.is_match(body) {
        unit_nanos(body).ok_or_else(err)?
    } else {
        return Err(err());
    };

    let nanos = if negative { -nanos } else { nanos };
    i64::try_from(nanos)
        .map(TimeDelta::nanoseconds)
        .map_err(|_| err())
}

fn clock_nanos(caps: &regex::Captures<'_>) -> Option<i128> {
    let num = |i: usize| -> Option<i128> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    let (days, hours, minutes, seconds) = (num(1)?, num(2)?, num(3)?, num(4)?);
    if minutes >= 60 || seconds >= 60 {
        return None;
    }
    let frac = match caps.get(5) {
        Some(m) => format!("{:0<9}", m.as_str()).parse::<i128>().ok()?,
        None => 0,
    };
    let hours = days.checked_mul(24)?.checked_add(hours)?;
    let minutes = hours.checked_mul(60)?.checked_add(minutes)?;
    let secs = minutes.checked_mul(60)?.checked_add(seconds)?;
    secs.checked_mul(1_000_000_000)?.checked_add(frac)
}

fn unit_nanos(body: &str) -> Option<i128> {
    let mut total: i128 = 0;
    for caps in UNIT_COMPONENT.captures_iter(body) {
        let unit = unit_in_nanos(&caps[3])?;
        let whole: i128 = caps[1].parse().ok()?;
        let frac = match caps.get(2) {
            Some(m) => format!("0.{}", m.as_str()).parse::<f64>().ok()?,
            None => 0.0,
        };
        total = total
            .checked_add(whole.checked_mul(unit)?)?
            .checked_add((frac * unit as f64).round() as i128)?;
    }
    Some(total)
}

fn unit_in_nanos(unit: &str) -> Option<i128> {
    let n = match unit {
        "w" | "wk" | "wks" | "week" | "weeks" => 604_800_000_000_000,
        "d" | "day" | "days" => 86_400_000_000_000,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000_000_000,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000_000_000,
        "s" | "sec" | "secs" | "second" | "seconds" => 1_000_000_000,
        "ms" | "milli" | "millis" | "millisecond" | "milliseconds" => 1_000_000,
        "us" | "µs" | "micro" | "micros" | "microsecond" | "microseconds" => 1_000,
        "ns" | "nano" | "nanos" | "nanosecond" | "nanoseconds" => 1,
        _ => return None,
    };
    Some(n)
}
