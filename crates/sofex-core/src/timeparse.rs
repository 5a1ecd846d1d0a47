//! Timestamp recognition and parsing.
//!
//! One cascade serves both stages: the extractor uses
//! [`find_time_text`] to locate a timestamp-shaped substring and grade
//! its clarity (which feeds confidence), the normalizer uses
//! [`parse_time_text`] to resolve the same text to a UTC instant under
//! the port timezone.
//!
//! Cascade order: ISO-8601 with offset (already absolute), ISO-8601
//! without offset, slash dates (`15/01/2024 14:00`) disambiguated by
//! day-of-month validity, then free-text phrases (`15th January 2024 at
//! 0830`). Dates where either slash field could be the day parse
//! day-first, which is the dominant convention in port documents, at
//! reduced clarity.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

/// How unambiguous the matched timestamp text is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeClarity {
    IsoOffset,
    IsoLocal,
    SlashDayFirst,
    SlashMonthFirst,
    SlashAmbiguous,
    FreeText,
}

/// A timestamp resolved to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTime {
    pub instant: DateTime<Utc>,
    pub clarity: TimeClarity,
}

static ISO_OFFSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(?::\d{2})?(?:Z|[+-]\d{2}:?\d{2})")
        .expect("valid regex")
});

static ISO_LOCAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(?::\d{2})?").expect("valid regex")
});

static SLASH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})[/.](\d{1,2})[/.](\d{2,4})\s+(\d{1,2})[:.](\d{2})(?:\s*hrs?)?")
        .expect("valid regex")
});

static FREE_TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{4})\s*,?\s*(?:at\s+)?(\d{1,2})[:.]?(\d{2})\s*(?:hrs?)?",
    )
    .expect("valid regex")
});

/// Resolve an IANA zone name ("Europe/Hamburg", "UTC").
pub fn parse_timezone(name: &str) -> Option<Tz> {
    name.trim().parse().ok()
}

/// Locate the first timestamp-shaped substring in a line.
///
/// Returns the matched text verbatim together with its clarity grade, or
/// `None` if nothing on the line looks like a timestamp.
pub fn find_time_text(line: &str) -> Option<(String, TimeClarity)> {
    if let Some(m) = ISO_OFFSET_RE.find(line) {
        return Some((m.as_str().to_string(), TimeClarity::IsoOffset));
    }
    if let Some(m) = ISO_LOCAL_RE.find(line) {
        return Some((m.as_str().to_string(), TimeClarity::IsoLocal));
    }
    if let Some(c) = SLASH_RE.captures(line) {
        let a: u32 = c[1].parse().ok()?;
        let b: u32 = c[2].parse().ok()?;
        let (_, _, clarity) = resolve_slash_fields(a, b);
        return Some((c[0].to_string(), clarity));
    }
    if let Some(m) = FREE_TEXT_RE.find(line) {
        return Some((m.as_str().to_string(), TimeClarity::FreeText));
    }
    None
}

/// Parse timestamp text to a UTC instant.
///
/// Text carrying its own offset is absolute already; anything else is a
/// wall-clock reading interpreted in `tz`. Returns `None` when the text
/// matches no accepted format or names a nonexistent local time (DST
/// spring-forward gap).
pub fn parse_time_text(raw: &str, tz: Tz) -> Option<ParsedTime> {
    let raw = raw.trim();

    if let Some(instant) = parse_iso_offset(raw) {
        return Some(ParsedTime {
            instant,
            clarity: TimeClarity::IsoOffset,
        });
    }
    if let Some(naive) = parse_iso_local(raw) {
        return local_to_utc(naive, tz).map(|instant| ParsedTime {
            instant,
            clarity: TimeClarity::IsoLocal,
        });
    }
    if let Some((naive, clarity)) = parse_slash(raw) {
        return local_to_utc(naive, tz).map(|instant| ParsedTime { instant, clarity });
    }
    if let Some(naive) = parse_free_text(raw) {
        return local_to_utc(naive, tz).map(|instant| ParsedTime {
            instant,
            clarity: TimeClarity::FreeText,
        });
    }
    None
}

fn parse_iso_offset(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // %z does not accept a bare Z suffix.
    let normalized = raw.strip_suffix('Z').map(|s| format!("{s}+00:00"));
    let candidate = normalized.as_deref().unwrap_or(raw);
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%dT%H:%M%z",
        "%Y-%m-%d %H:%M:%S%z",
        "%Y-%m-%d %H:%M%z",
    ];
    FORMATS
        .iter()
        .find_map(|f| DateTime::parse_from_str(candidate, f).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_iso_local(raw: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
}

/// Decide which slash field is the day.
fn resolve_slash_fields(a: u32, b: u32) -> (u32, u32, TimeClarity) {
    if a > 12 && b <= 12 {
        (a, b, TimeClarity::SlashDayFirst)
    } else if b > 12 && a <= 12 {
        (b, a, TimeClarity::SlashMonthFirst)
    } else {
        // Both fields could be a day: read day-first.
        (a, b, TimeClarity::SlashAmbiguous)
    }
}

fn parse_slash(raw: &str) -> Option<(NaiveDateTime, TimeClarity)> {
    let c = SLASH_RE.captures(raw)?;
    let a: u32 = c[1].parse().ok()?;
    let b: u32 = c[2].parse().ok()?;
    let mut year: i32 = c[3].parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    let hour: u32 = c[4].parse().ok()?;
    let minute: u32 = c[5].parse().ok()?;

    let (day, month, clarity) = resolve_slash_fields(a, b);
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some((date.and_time(time), clarity))
}

fn parse_free_text(raw: &str) -> Option<NaiveDateTime> {
    let c = FREE_TEXT_RE.captures(raw)?;
    let day: u32 = c[1].parse().ok()?;
    let month = month_number(&c[2])?;
    let year: i32 = c[3].parse().ok()?;
    let hour: u32 = c[4].parse().ok()?;
    let minute: u32 = c[5].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some(date.and_time(time))
}

pub(crate) fn month_number(name: &str) -> Option<u32> {
    match name.to_ascii_lowercase().as_str() {
        "january" => Some(1),
        "february" => Some(2),
        "march" => Some(3),
        "april" => Some(4),
        "may" => Some(5),
        "june" => Some(6),
        "july" => Some(7),
        "august" => Some(8),
        "september" => Some(9),
        "october" => Some(10),
        "november" => Some(11),
        "december" => Some(12),
        _ => None,
    }
}

fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        // Fall-back hour: take the earlier reading.
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        // Spring-forward gap: the wall clock never showed this time.
        LocalResult::None => None,
    }
}
