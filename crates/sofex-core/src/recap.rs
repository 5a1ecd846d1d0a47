//! Fixture-recap extraction.
//!
//! A free-text recap ("MV OCEAN PIONEER, laycan 1-3 Feb 2024, load port
//! Hamburg…") is a constrained information-extraction problem of the same
//! shape as event extraction: a fixed table of field patterns, each hit
//! graded by how explicit the source text was. Fields the text never
//! states stay `None`; nothing is guessed.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::timeparse::month_number;

/// Structured chartering terms pulled out of a recap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecapData {
    pub vessel_name: Option<String>,
    pub laycan_start: Option<DateTime<Utc>>,
    pub laycan_end: Option<DateTime<Utc>>,
    pub load_port: Option<String>,
    pub discharge_port: Option<String>,
    pub freight_rate: Option<String>,
    pub demurrage_rate: Option<String>,
    pub cargo_description: Option<String>,
}

/// Extraction result: the data plus a confidence grade per found field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecapExtraction {
    pub data: RecapData,
    pub field_confidence: BTreeMap<String, f64>,
}

/// Explicitly labeled fields ("load port: Hamburg").
const LABELED_CONFIDENCE: f64 = 0.9;
/// Fields inferred from conventions ("MV <name>").
const INFERRED_CONFIDENCE: f64 = 0.8;

static VESSEL_LABELED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*vessel(?:\s+name)?\s*[:\-]\s*([^\n,;]+)").expect("valid regex")
});

static VESSEL_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:mv|m/v|mt|m/t)\.?[ \t]+([a-z0-9][a-z0-9' -]{2,40})").expect("valid regex")
});

static LAYCAN_SPAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)laycan\s*[:\-]?\s*(\d{1,2})\s*[-/]\s*(\d{1,2})\s+(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{4})",
    )
    .expect("valid regex")
});

static LAYCAN_ISO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)laycan\s*[:\-]?\s*(\d{4}-\d{2}-\d{2})\s*(?:/|to|-)\s*(\d{4}-\d{2}-\d{2})")
        .expect("valid regex")
});

static LOAD_PORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bload(?:ing)?\s*port\s*[:\-]\s*([^\n,;]+)").expect("valid regex")
});

static DISCHARGE_PORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bdisch(?:arge|arging)?\s*port\s*[:\-]\s*([^\n,;]+)").expect("valid regex")
});

static FREIGHT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bfreight(?:\s*rate)?\s*[:\-]?\s*((?:usd|us\$|\$)\s*[\d,]+(?:\.\d+)?(?:\s*(?:per\s+mt|pmt|/mt))?)",
    )
    .expect("valid regex")
});

static DEMURRAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bdemurrage(?:\s*rate)?\s*[:\-]?\s*((?:usd|us\$|\$)\s*[\d,]+(?:\.\d+)?(?:\s*(?:per\s+day|pdpr|/day))?)",
    )
    .expect("valid regex")
});

static CARGO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcargo\s*[:\-]\s*([^\n;]+)").expect("valid regex"));

/// Extract structured fixture data from free recap text.
pub fn parse_recap(text: &str) -> RecapExtraction {
    let mut data = RecapData::default();
    let mut field_confidence = BTreeMap::new();

    if let Some(c) = VESSEL_LABELED_RE.captures(text) {
        data.vessel_name = Some(clean(&c[1]));
        field_confidence.insert("vessel_name".to_string(), LABELED_CONFIDENCE);
    } else if let Some(c) = VESSEL_PREFIX_RE.captures(text) {
        data.vessel_name = Some(clean(&c[1]).to_uppercase());
        field_confidence.insert("vessel_name".to_string(), INFERRED_CONFIDENCE);
    }

    if let Some((start, end)) = parse_laycan(text) {
        data.laycan_start = Some(start);
        data.laycan_end = Some(end);
        field_confidence.insert("laycan".to_string(), LABELED_CONFIDENCE);
    }

    if let Some(c) = LOAD_PORT_RE.captures(text) {
        data.load_port = Some(clean(&c[1]));
        field_confidence.insert("load_port".to_string(), LABELED_CONFIDENCE);
    }
    if let Some(c) = DISCHARGE_PORT_RE.captures(text) {
        data.discharge_port = Some(clean(&c[1]));
        field_confidence.insert("discharge_port".to_string(), LABELED_CONFIDENCE);
    }
    if let Some(c) = FREIGHT_RE.captures(text) {
        data.freight_rate = Some(clean(&c[1]));
        field_confidence.insert("freight_rate".to_string(), LABELED_CONFIDENCE);
    }
    if let Some(c) = DEMURRAGE_RE.captures(text) {
        data.demurrage_rate = Some(clean(&c[1]));
        field_confidence.insert("demurrage_rate".to_string(), LABELED_CONFIDENCE);
    }
    if let Some(c) = CARGO_RE.captures(text) {
        data.cargo_description = Some(clean(&c[1]));
        field_confidence.insert("cargo_description".to_string(), LABELED_CONFIDENCE);
    }

    RecapExtraction {
        data,
        field_confidence,
    }
}

/// Laycan window: first day at 00:00, last day at 23:59:59.
fn parse_laycan(text: &str) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    if let Some(c) = LAYCAN_SPAN_RE.captures(text) {
        let day_start: u32 = c[1].parse().ok()?;
        let day_end: u32 = c[2].parse().ok()?;
        let month = month_number(&c[3])?;
        let year: i32 = c[4].parse().ok()?;
        let start = NaiveDate::from_ymd_opt(year, month, day_start)?;
        let end = NaiveDate::from_ymd_opt(year, month, day_end)?;
        return Some((day_open(start), day_close(end)));
    }
    if let Some(c) = LAYCAN_ISO_RE.captures(text) {
        let start = NaiveDate::parse_from_str(&c[1], "%Y-%m-%d").ok()?;
        let end = NaiveDate::parse_from_str(&c[2], "%Y-%m-%d").ok()?;
        return Some((day_open(start), day_close(end)));
    }
    None
}

fn day_open(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight exists"))
}

fn day_close(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(23, 59, 59).expect("end of day exists"))
}

fn clean(raw: &str) -> String {
    raw.trim().trim_end_matches('.').trim().to_string()
}
