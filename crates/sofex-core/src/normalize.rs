//! Timestamp normalization and start/end correlation.
//!
//! Every candidate's raw timestamp is resolved to UTC under the port
//! timezone. A candidate whose text defeats the whole format cascade is
//! kept in place with zero confidence and no start time; a flagged row
//! is worth more to a reviewer than a dropped one. Events bracketing the
//! same operation ("Loading Commenced" / "Loading Completed") are then
//! correlated into spans: first unmatched start to the next end, in row
//! order, one link per event. The association is best-effort; whatever
//! stays unpaired is the detector's business, not ours.

use std::collections::{HashMap, VecDeque};

use crate::config::PipelineConfig;
use crate::timeparse;
use crate::vocab::{self, PairSide};
use crate::{CandidateEvent, NormalizedEvent, PipelineError};

/// Normalize candidates against a port timezone.
///
/// Fails only on an unrecognized zone identifier; individual timestamp
/// parse failures degrade the affected event instead.
pub fn normalize(
    candidates: &[CandidateEvent],
    port_timezone: &str,
    config: &PipelineConfig,
) -> Result<Vec<NormalizedEvent>, PipelineError> {
    let tz = timeparse::parse_timezone(port_timezone)
        .ok_or_else(|| PipelineError::InvalidTimezone(port_timezone.to_string()))?;

    let mut events: Vec<NormalizedEvent> = candidates
        .iter()
        .map(|c| {
            let (start_time, confidence) = match timeparse::parse_time_text(&c.raw_time_text, tz)
            {
                Some(parsed) => (Some(parsed.instant), c.confidence),
                None => {
                    log::debug!(
                        "row {}: unparsable timestamp {:?}",
                        c.row_index,
                        c.raw_time_text
                    );
                    (None, 0.0)
                }
            };
            NormalizedEvent {
                event_name: c.event_name.clone(),
                raw_time_text: c.raw_time_text.clone(),
                page: c.page,
                row_index: c.row_index,
                confidence,
                start_time,
                end_time: None,
                duration_minutes: None,
                paired_with: None,
            }
        })
        .collect();

    events.sort_by_key(|e| e.row_index);
    pair_events(&mut events, config);
    Ok(events)
}

/// Correlate start/end events per operation key.
///
/// Durations are signed: an end that lands before its start stays as the
/// document recorded it and surfaces through anomaly detection.
fn pair_events(events: &mut [NormalizedEvent], config: &PipelineConfig) {
    let mut open: HashMap<String, VecDeque<usize>> = HashMap::new();

    for i in 0..events.len() {
        let Some(pattern) = vocab::lookup(&config.vocabulary, &events[i].event_name) else {
            continue;
        };
        let Some(role) = pattern.pair.clone() else {
            continue;
        };

        match role.side {
            PairSide::Start => {
                if events[i].start_time.is_some() {
                    open.entry(role.operation).or_default().push_back(i);
                }
            }
            PairSide::End => {
                let Some(end_time) = events[i].start_time else {
                    continue;
                };
                let Some(start_idx) = open.get_mut(&role.operation).and_then(VecDeque::pop_front)
                else {
                    continue;
                };
                if let Some(start_time) = events[start_idx].start_time {
                    let end_row = events[i].row_index;
                    events[start_idx].end_time = Some(end_time);
                    events[start_idx].duration_minutes =
                        Some((end_time - start_time).num_minutes());
                    events[i].paired_with = Some(events[start_idx].row_index);
                    events[start_idx].paired_with = Some(end_row);
                }
            }
        }
    }
}
