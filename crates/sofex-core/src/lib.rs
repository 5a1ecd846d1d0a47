//! Statement of Facts processing core.
//!
//! One submitted document runs through four strictly sequential stages:
//! loading ([`sofex_document`]), event extraction ([`extract`]), timestamp
//! normalization ([`normalize`]) and anomaly detection ([`anomaly`]),
//! producing a single [`ProcessingResult`]. Runs are request-scoped and
//! share no mutable state; everything tunable travels in a
//! [`PipelineConfig`](config::PipelineConfig) value passed into the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod anomaly;
pub mod cache;
pub mod config;
pub mod extract;
pub mod normalize;
pub mod pipeline;
pub mod recap;
pub mod timeparse;
pub mod vocab;

#[cfg(test)]
pub(crate) mod testdoc;

// Re-export for convenience
pub use sofex_document::{DocumentError, ExtractionMethod, LoaderOptions, PageText};

pub use cache::DocumentCache;
pub use config::PipelineConfig;
pub use pipeline::{ProcessOptions, process_document};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
    #[error("processing timed out after {0}s")]
    Timeout(u64),
    #[error("processing cancelled")]
    Cancelled,
    #[error("internal task failure: {0}")]
    Internal(String),
}

/// Processing mode selected by the caller.
///
/// Cost-saving disables OCR and fuzzy phrase matching regardless of the
/// separate OCR flag; accuracy permits both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingMode {
    Accuracy,
    CostSaving,
}

/// A candidate maritime event located on a page, before timestamp
/// normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateEvent {
    /// Canonical vocabulary name, e.g. "Loading Commenced".
    pub event_name: String,
    /// The timestamp-shaped text found near the phrase, verbatim.
    pub raw_time_text: String,
    pub page: u32,
    /// Stable ordering key, unique within a document: assigned in scan
    /// order (page, then position within the page).
    pub row_index: u32,
    /// Blended extraction confidence in [0, 1].
    pub confidence: f64,
}

/// A candidate event with its timestamp resolved to UTC and best-effort
/// start/end pairing applied.
///
/// `start_time: None` means the raw timestamp could not be parsed; such
/// events keep their place in the sequence with confidence forced to 0
/// rather than being dropped. A negative `duration_minutes` is preserved
/// as-is and flagged by the detector, never silently corrected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub event_name: String,
    pub raw_time_text: String,
    pub page: u32,
    pub row_index: u32,
    pub confidence: f64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Whole minutes from start to end, signed.
    pub duration_minutes: Option<i64>,
    /// Row index of the correlated counterpart event, if pairing found one.
    pub paired_with: Option<u32>,
}

/// Anomaly categories reported by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnomalyKind {
    TimeGap,
    OrderViolation,
    LowConfidence,
    NegativeDuration,
    MissingPair,
}

/// A structured finding over the normalized event sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub message: String,
    /// The implicated event.
    pub row_index: u32,
}

/// Summary counters over the final event set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_events: usize,
    pub low_confidence_count: usize,
}

/// The atomic response for one submitted document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// Events in ascending `row_index` order.
    pub events: Vec<NormalizedEvent>,
    pub stats: Stats,
    pub anomalies: Vec<Anomaly>,
    /// Leading extracted text, for reviewer context.
    pub text_preview: Option<String>,
}

impl Stats {
    /// Compute counters for an event list under the given low-confidence
    /// threshold.
    pub fn for_events(events: &[NormalizedEvent], low_confidence_threshold: f64) -> Self {
        Self {
            total_events: events.len(),
            low_confidence_count: events
                .iter()
                .filter(|e| e.confidence < low_confidence_threshold)
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(row: u32, confidence: f64) -> NormalizedEvent {
        NormalizedEvent {
            event_name: "Vessel Arrived".to_string(),
            raw_time_text: "2024-01-15T08:30:00Z".to_string(),
            page: 1,
            row_index: row,
            confidence,
            start_time: None,
            end_time: None,
            duration_minutes: None,
            paired_with: None,
        }
    }

    #[test]
    fn stats_count_low_confidence_below_threshold() {
        let events = vec![event(1, 0.95), event(2, 0.84), event(3, 0.85), event(4, 0.0)];
        let stats = Stats::for_events(&events, 0.85);
        assert_eq!(stats.total_events, 4);
        // Strictly below the threshold: 0.84 and 0.0, not 0.85 itself.
        assert_eq!(stats.low_confidence_count, 2);
    }

    #[test]
    fn result_serializes_round_trip() {
        let result = ProcessingResult {
            events: vec![event(1, 0.9)],
            stats: Stats {
                total_events: 1,
                low_confidence_count: 0,
            },
            anomalies: vec![Anomaly {
                kind: AnomalyKind::TimeGap,
                message: "gap".to_string(),
                row_index: 1,
            }],
            text_preview: Some("Vessel Arrived".to_string()),
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: ProcessingResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.stats, result.stats);
        assert_eq!(back.anomalies, result.anomalies);
        assert_eq!(back.events.len(), 1);
    }
}
