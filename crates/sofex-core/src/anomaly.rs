//! Anomaly detection over the normalized event sequence.
//!
//! A pure pass: it always returns, possibly empty, and never mutates the
//! events. Rules run independently, so one row can collect several
//! findings. Output order is stable (row, then kind, then message),
//! which makes re-running the detector on the same events idempotent.

use crate::config::PipelineConfig;
use crate::vocab::{self, PairSide};
use crate::{Anomaly, AnomalyKind, NormalizedEvent};

/// Scan events for ordering violations, implausible gaps, reversed spans,
/// low-confidence rows and unmatched start/end pairs.
pub fn detect(events: &[NormalizedEvent], config: &PipelineConfig) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    negative_durations(events, &mut anomalies);
    order_violations(events, config, &mut anomalies);
    time_gaps(events, config, &mut anomalies);
    low_confidence(events, config, &mut anomalies);
    missing_pairs(events, config, &mut anomalies);

    anomalies.sort_by(|a, b| {
        a.row_index
            .cmp(&b.row_index)
            .then(a.kind.cmp(&b.kind))
            .then_with(|| a.message.cmp(&b.message))
    });
    anomalies
}

fn negative_durations(events: &[NormalizedEvent], out: &mut Vec<Anomaly>) {
    for e in events {
        if let Some(minutes) = e.duration_minutes {
            if minutes < 0 {
                out.push(Anomaly {
                    kind: AnomalyKind::NegativeDuration,
                    message: format!(
                        "{} ends {} before it starts",
                        e.event_name,
                        format_minutes(-minutes)
                    ),
                    row_index: e.row_index,
                });
            }
        }
    }
}

/// Events that carry a sequence rank, with a parsed start time.
fn ranked_events<'a>(
    events: &'a [NormalizedEvent],
    config: &PipelineConfig,
) -> Vec<(u8, &'a NormalizedEvent)> {
    events
        .iter()
        .filter_map(|e| {
            let rank = vocab::lookup(&config.vocabulary, &e.event_name)?.sequence_rank?;
            e.start_time?;
            Some((rank, e))
        })
        .collect()
}

fn order_violations(events: &[NormalizedEvent], config: &PipelineConfig, out: &mut Vec<Anomaly>) {
    let mut ranked = ranked_events(events, config);
    ranked.sort_by_key(|(_, e)| (e.start_time, e.row_index));

    for pair in ranked.windows(2) {
        let (prev_rank, prev) = pair[0];
        let (next_rank, next) = pair[1];
        if next_rank < prev_rank {
            out.push(Anomaly {
                kind: AnomalyKind::OrderViolation,
                message: format!(
                    "{} recorded after {}, out of the expected port-call order",
                    next.event_name, prev.event_name
                ),
                row_index: next.row_index,
            });
        }
    }
}

fn time_gaps(events: &[NormalizedEvent], config: &PipelineConfig, out: &mut Vec<Anomaly>) {
    let mut ranked = ranked_events(events, config);
    ranked.sort_by_key(|(rank, e)| (*rank, e.start_time, e.row_index));

    for pair in ranked.windows(2) {
        let (prev_rank, prev) = pair[0];
        let (next_rank, next) = pair[1];
        if next_rank == prev_rank {
            continue;
        }
        let (Some(prev_start), Some(next_start)) = (prev.start_time, next.start_time) else {
            continue;
        };
        let gap = (next_start - prev_start).num_minutes();
        if gap < 0 {
            // Out-of-order pairs are the order rule's finding.
            continue;
        }
        let limit = config
            .thresholds
            .max_gap_minutes(&prev.event_name, &next.event_name);
        if gap > limit {
            out.push(Anomaly {
                kind: AnomalyKind::TimeGap,
                message: format!(
                    "{} between {} and {} exceeds the expected {}",
                    format_minutes(gap),
                    prev.event_name,
                    next.event_name,
                    format_minutes(limit)
                ),
                row_index: next.row_index,
            });
        }
    }
}

fn low_confidence(events: &[NormalizedEvent], config: &PipelineConfig, out: &mut Vec<Anomaly>) {
    let threshold = config.thresholds.low_confidence;
    for e in events {
        if e.confidence < threshold {
            out.push(Anomaly {
                kind: AnomalyKind::LowConfidence,
                message: format!(
                    "extraction confidence {:.2} below threshold {:.2}",
                    e.confidence, threshold
                ),
                row_index: e.row_index,
            });
        }
    }
}

fn missing_pairs(events: &[NormalizedEvent], config: &PipelineConfig, out: &mut Vec<Anomaly>) {
    for e in events {
        let Some(pattern) = vocab::lookup(&config.vocabulary, &e.event_name) else {
            continue;
        };
        let Some(role) = &pattern.pair else {
            continue;
        };
        if e.paired_with.is_some() {
            continue;
        }
        let message = match role.side {
            PairSide::Start => format!("no completion event paired with {}", e.event_name),
            PairSide::End => format!("no commencement event paired with {}", e.event_name),
        };
        out.push(Anomaly {
            kind: AnomalyKind::MissingPair,
            message,
            row_index: e.row_index,
        });
    }
}

fn format_minutes(minutes: i64) -> String {
    if minutes >= 60 {
        let hours = minutes / 60;
        let rest = minutes % 60;
        if rest == 0 {
            format!("{hours}h")
        } else {
            format!("{hours}h {rest:02}m")
        }
    } else {
        format!("{minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
    }

    fn event(row: u32, name: &str, start: Option<DateTime<Utc>>) -> NormalizedEvent {
        NormalizedEvent {
            event_name: name.to_string(),
            raw_time_text: String::new(),
            page: 1,
            row_index: row,
            confidence: 0.95,
            start_time: start,
            end_time: None,
            duration_minutes: None,
            paired_with: None,
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[test]
    fn clean_sequence_has_no_anomalies() {
        let mut commenced = event(3, "Loading Commenced", Some(at(15, 14, 0)));
        commenced.end_time = Some(at(16, 18, 30));
        commenced.duration_minutes = Some(1710);
        commenced.paired_with = Some(4);
        let mut completed = event(4, "Loading Completed", Some(at(16, 18, 30)));
        completed.paired_with = Some(3);

        let events = vec![
            event(1, "Vessel Arrived", Some(at(15, 8, 30))),
            event(2, "NOR Tendered", Some(at(15, 9, 15))),
            commenced,
            completed,
            event(5, "Vessel Sailed", Some(at(16, 20, 45))),
        ];
        assert!(detect(&events, &config()).is_empty());
    }

    #[test]
    fn single_clean_event_has_no_anomalies() {
        let events = vec![event(1, "Vessel Arrived", Some(at(15, 8, 30)))];
        assert!(detect(&events, &config()).is_empty());
    }

    #[test]
    fn reversed_span_is_flagged_twice() {
        // Completed before Commenced: the span is negative and the
        // sequence order is violated.
        let mut commenced = event(1, "Loading Commenced", Some(at(16, 20, 0)));
        commenced.end_time = Some(at(16, 18, 30));
        commenced.duration_minutes = Some(-90);
        commenced.paired_with = Some(2);
        let mut completed = event(2, "Loading Completed", Some(at(16, 18, 30)));
        completed.paired_with = Some(1);

        let anomalies = detect(&[commenced, completed], &config());
        let kinds: Vec<AnomalyKind> = anomalies.iter().map(|a| a.kind).collect();
        assert!(kinds.contains(&AnomalyKind::NegativeDuration));
        assert!(kinds.contains(&AnomalyKind::OrderViolation));
        // The negative duration points at the span's start row.
        let negative = anomalies
            .iter()
            .find(|a| a.kind == AnomalyKind::NegativeDuration)
            .unwrap();
        assert_eq!(negative.row_index, 1);
    }

    #[test]
    fn long_arrival_to_nor_gap_is_flagged() {
        let events = vec![
            event(1, "Vessel Arrived", Some(at(15, 0, 0))),
            // 10 hours later; the default limit for this pair is 6 hours.
            event(2, "NOR Tendered", Some(at(15, 10, 0))),
        ];
        let anomalies = detect(&events, &config());
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::TimeGap);
        assert_eq!(anomalies[0].row_index, 2);
        assert!(anomalies[0].message.contains("10h"));
    }

    #[test]
    fn loading_window_tolerates_days() {
        let events = vec![
            event(1, "Loading Commenced", Some(at(15, 8, 0))),
            event(2, "Loading Completed", Some(at(19, 8, 0))),
        ];
        // 4 days is inside the loading-specific limit; the unpaired rows
        // are the only findings.
        let anomalies = detect(&events, &config());
        assert!(anomalies.iter().all(|a| a.kind == AnomalyKind::MissingPair));
    }

    #[test]
    fn low_confidence_rows_are_flagged() {
        let mut e = event(1, "Vessel Arrived", Some(at(15, 8, 0)));
        e.confidence = 0.5;
        let anomalies = detect(&[e], &config());
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::LowConfidence);
        assert!(anomalies[0].message.contains("0.50"));
    }

    #[test]
    fn unpaired_start_and_end_are_flagged() {
        let events = vec![
            event(1, "Loading Commenced", Some(at(15, 8, 0))),
            event(2, "Discharging Completed", Some(at(15, 18, 0))),
        ];
        let anomalies = detect(&events, &config());
        assert_eq!(anomalies.len(), 2);
        assert!(anomalies[0].message.contains("no completion event"));
        assert!(anomalies[1].message.contains("no commencement event"));
    }

    #[test]
    fn unparsed_events_are_skipped_by_sequence_rules() {
        let mut unparsed = event(1, "Vessel Arrived", None);
        unparsed.confidence = 0.0;
        let events = vec![unparsed, event(2, "NOR Tendered", Some(at(15, 9, 0)))];
        let anomalies = detect(&events, &config());
        // Only the zero-confidence flag; no gap or order findings against
        // a row with no instant.
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::LowConfidence);
        assert_eq!(anomalies[0].row_index, 1);
    }

    #[test]
    fn detect_is_idempotent() {
        let mut e = event(1, "Loading Commenced", Some(at(16, 20, 0)));
        e.duration_minutes = Some(-90);
        e.confidence = 0.3;
        let events = vec![e, event(2, "Vessel Arrived", Some(at(15, 8, 0)))];
        let first = detect(&events, &config());
        let second = detect(&events, &config());
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn multiple_rules_can_hit_one_row() {
        let mut e = event(1, "Loading Commenced", Some(at(16, 20, 0)));
        e.end_time = Some(at(16, 18, 30));
        e.duration_minutes = Some(-90);
        e.confidence = 0.2;
        let anomalies = detect(&[e], &config());
        let kinds: Vec<AnomalyKind> = anomalies.iter().map(|a| a.kind).collect();
        assert!(kinds.contains(&AnomalyKind::NegativeDuration));
        assert!(kinds.contains(&AnomalyKind::LowConfidence));
        assert!(kinds.contains(&AnomalyKind::MissingPair));
        assert!(anomalies.iter().all(|a| a.row_index == 1));
    }

    #[test]
    fn format_minutes_reads_naturally() {
        assert_eq!(format_minutes(45), "45m");
        assert_eq!(format_minutes(60), "1h");
        assert_eq!(format_minutes(90), "1h 30m");
        assert_eq!(format_minutes(600), "10h");
    }
}
