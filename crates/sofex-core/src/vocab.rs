//! The maritime event vocabulary.
//!
//! A closed phrase table: each entry has a canonical display name, the
//! alias spellings seen in real Statements of Facts, an optional rank in
//! the canonical port-call sequence (arrival → NOR → loading → sailing),
//! and an optional start/end pairing role. The default table covers the
//! common dry-cargo port call; shipping lines with house conventions
//! supply their own table through the pipeline configuration.

use serde::{Deserialize, Serialize};

/// Which side of a paired operation an event marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairSide {
    Start,
    End,
}

/// Start/end correlation info for events that bracket an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairRole {
    /// Operation key shared by both sides, e.g. "loading".
    pub operation: String,
    pub side: PairSide,
}

/// One entry in the event phrase table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPattern {
    /// Canonical name reported on extracted events.
    pub name: String,
    /// Lowercase alias spellings matched against document lines.
    pub aliases: Vec<String>,
    /// Position in the canonical port-call sequence, if this event has one.
    #[serde(default)]
    pub sequence_rank: Option<u8>,
    #[serde(default)]
    pub pair: Option<PairRole>,
}

impl EventPattern {
    fn new(name: &str, aliases: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            sequence_rank: None,
            pair: None,
        }
    }

    fn ranked(mut self, rank: u8) -> Self {
        self.sequence_rank = Some(rank);
        self
    }

    fn paired(mut self, operation: &str, side: PairSide) -> Self {
        self.pair = Some(PairRole {
            operation: operation.to_string(),
            side,
        });
        self
    }
}

/// Look up a pattern by its canonical name.
pub fn lookup<'a>(vocabulary: &'a [EventPattern], name: &str) -> Option<&'a EventPattern> {
    vocabulary.iter().find(|p| p.name == name)
}

/// The default dry-cargo port-call vocabulary.
pub fn default_vocabulary() -> Vec<EventPattern> {
    vec![
        EventPattern::new(
            "Vessel Arrived",
            &[
                "vessel arrived",
                "arrived at port",
                "arrived at anchorage",
                "end of sea passage",
                "vessel anchored",
                "anchored",
                "vessel berthed",
                "berthed",
                "all fast",
            ],
        )
        .ranked(0),
        EventPattern::new(
            "NOR Tendered",
            &[
                "nor tendered",
                "notice of readiness tendered",
                "n.o.r. tendered",
                "n.o.r tendered",
                "tendered notice of readiness",
            ],
        )
        .ranked(1),
        EventPattern::new(
            "Free Pratique Granted",
            &["free pratique granted", "pratique granted"],
        ),
        EventPattern::new(
            "Pilot On Board",
            &["pilot on board", "pilot boarded", "pilot embarked"],
        ),
        EventPattern::new(
            "Loading Commenced",
            &[
                "loading commenced",
                "commenced loading",
                "loading started",
                "commenced cargo operations",
                "cargo operations commenced",
            ],
        )
        .ranked(2)
        .paired("loading", PairSide::Start),
        EventPattern::new(
            "Loading Completed",
            &[
                "loading completed",
                "completed loading",
                "loading finished",
                "completed cargo operations",
                "cargo operations completed",
            ],
        )
        .ranked(3)
        .paired("loading", PairSide::End),
        EventPattern::new(
            "Discharging Commenced",
            &[
                "discharging commenced",
                "commenced discharging",
                "discharge commenced",
                "commenced discharge",
            ],
        )
        .paired("discharging", PairSide::Start),
        EventPattern::new(
            "Discharging Completed",
            &[
                "discharging completed",
                "completed discharging",
                "discharge completed",
                "completed discharge",
            ],
        )
        .paired("discharging", PairSide::End),
        EventPattern::new(
            "Vessel Sailed",
            &[
                "vessel sailed",
                "sailed from berth",
                "sailed",
                "vessel departed",
                "departed berth",
                "cast off",
                "dropped outward pilot",
            ],
        )
        .ranked(4),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_follow_the_port_call_sequence() {
        let vocab = default_vocabulary();
        let rank = |name: &str| lookup(&vocab, name).unwrap().sequence_rank.unwrap();
        assert!(rank("Vessel Arrived") < rank("NOR Tendered"));
        assert!(rank("NOR Tendered") < rank("Loading Commenced"));
        assert!(rank("Loading Commenced") < rank("Loading Completed"));
        assert!(rank("Loading Completed") < rank("Vessel Sailed"));
    }

    #[test]
    fn paired_operations_have_both_sides() {
        let vocab = default_vocabulary();
        for op in ["loading", "discharging"] {
            let sides: Vec<PairSide> = vocab
                .iter()
                .filter_map(|p| p.pair.as_ref())
                .filter(|r| r.operation == op)
                .map(|r| r.side)
                .collect();
            assert!(sides.contains(&PairSide::Start), "{op} missing start");
            assert!(sides.contains(&PairSide::End), "{op} missing end");
        }
    }

    #[test]
    fn aliases_are_lowercase() {
        for pattern in default_vocabulary() {
            for alias in &pattern.aliases {
                assert_eq!(alias, &alias.to_lowercase());
            }
        }
    }
}
