//! Per-run pipeline configuration.
//!
//! Every tunable lives here and is passed explicitly into each run, so
//! concurrent runs with different conventions (another shipping line's
//! vocabulary, different gap tolerances) cannot interfere. The whole tree
//! deserializes from TOML with defaults for anything omitted.

use serde::{Deserialize, Serialize};

use crate::vocab::{EventPattern, default_vocabulary};
use sofex_document::LoaderOptions;

/// Multiplicative confidence factors.
///
/// An event's confidence is page reliability × phrase-match strength ×
/// timestamp clarity. The defaults put a native exact match with an ISO
/// timestamp above 0.9 and an OCR fuzzy match with an ambiguous date
/// below 0.6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    /// Strength of a canonical-name match.
    pub phrase_exact: f64,
    /// Strength of an alias match.
    pub phrase_alias: f64,
    /// Scale applied to the fuzzy similarity score when no alias matches
    /// exactly.
    pub phrase_fuzzy_scale: f64,
    /// Clarity of an ISO timestamp carrying a UTC offset.
    pub clarity_iso_offset: f64,
    /// Clarity of an ISO timestamp without an offset.
    pub clarity_iso_local: f64,
    /// Clarity of a slash date whose day position is unambiguous.
    pub clarity_slash: f64,
    /// Clarity of a slash date where either field could be the day.
    pub clarity_slash_ambiguous: f64,
    /// Clarity of a free-text date phrase.
    pub clarity_free_text: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            phrase_exact: 1.0,
            phrase_alias: 0.95,
            phrase_fuzzy_scale: 0.9,
            clarity_iso_offset: 1.0,
            clarity_iso_local: 0.95,
            clarity_slash: 0.85,
            clarity_slash_ambiguous: 0.65,
            clarity_free_text: 0.7,
        }
    }
}

/// Maximum tolerated gap between one specific pair of sequence events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapRule {
    pub from: String,
    pub to: String,
    pub max_minutes: i64,
}

/// Detector thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorThresholds {
    /// Events below this confidence are flagged (and counted in stats).
    pub low_confidence: f64,
    /// Fallback gap limit for sequence-adjacent pairs without a rule.
    pub default_max_gap_minutes: i64,
    /// Per-pair gap limits; arrival-to-NOR is expected to be short while
    /// a loading window runs for days.
    pub gap_rules: Vec<GapRule>,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            low_confidence: 0.85,
            default_max_gap_minutes: 48 * 60,
            gap_rules: vec![
                GapRule {
                    from: "Vessel Arrived".to_string(),
                    to: "NOR Tendered".to_string(),
                    max_minutes: 6 * 60,
                },
                GapRule {
                    from: "NOR Tendered".to_string(),
                    to: "Loading Commenced".to_string(),
                    max_minutes: 3 * 24 * 60,
                },
                GapRule {
                    from: "Loading Commenced".to_string(),
                    to: "Loading Completed".to_string(),
                    max_minutes: 10 * 24 * 60,
                },
                GapRule {
                    from: "Loading Completed".to_string(),
                    to: "Vessel Sailed".to_string(),
                    max_minutes: 24 * 60,
                },
            ],
        }
    }
}

impl DetectorThresholds {
    /// Gap limit for a specific event pair.
    pub fn max_gap_minutes(&self, from: &str, to: &str) -> i64 {
        self.gap_rules
            .iter()
            .find(|r| r.from == from && r.to == to)
            .map(|r| r.max_minutes)
            .unwrap_or(self.default_max_gap_minutes)
    }
}

/// Phrase/timestamp scanning options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionOptions {
    /// How many lines below the phrase to search for a timestamp when the
    /// phrase's own line has none.
    pub window_lines: usize,
    /// Minimum normalized similarity for a fuzzy phrase match.
    pub fuzzy_min_similarity: f64,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            window_lines: 2,
            fuzzy_min_similarity: 0.82,
        }
    }
}

/// Hard limits for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunLimits {
    /// Whole-run timeout covering all stages, OCR included.
    pub timeout_secs: u64,
    /// Cap on the raw-text preview echoed back with the result.
    pub preview_chars: usize,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            preview_chars: 1000,
        }
    }
}

/// Everything one pipeline run needs to know.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub loader: LoaderOptions,
    pub vocabulary: Vec<EventPattern>,
    pub weights: ConfidenceWeights,
    pub thresholds: DetectorThresholds,
    pub extraction: ExtractionOptions,
    pub limits: RunLimits,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            loader: LoaderOptions::default(),
            vocabulary: default_vocabulary(),
            weights: ConfidenceWeights::default(),
            thresholds: DetectorThresholds::default(),
            extraction: ExtractionOptions::default(),
            limits: RunLimits::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document; omitted sections keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config.thresholds.low_confidence, 0.85);
        assert_eq!(config.loader.min_chars_per_page, 100);
        assert!(!config.vocabulary.is_empty());
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config = PipelineConfig::from_toml(
            "[thresholds]\nlow_confidence = 0.7\n\n[limits]\ntimeout_secs = 30\n",
        )
        .unwrap();
        assert_eq!(config.thresholds.low_confidence, 0.7);
        assert_eq!(config.limits.timeout_secs, 30);
        // Untouched sections keep defaults.
        assert_eq!(config.extraction.window_lines, 2);
        assert!(!config.thresholds.gap_rules.is_empty());
    }

    #[test]
    fn custom_vocabulary_replaces_the_table() {
        let config = PipelineConfig::from_toml(
            "[[vocabulary]]\nname = \"Bunkering Commenced\"\naliases = [\"bunkering commenced\"]\n",
        )
        .unwrap();
        assert_eq!(config.vocabulary.len(), 1);
        assert_eq!(config.vocabulary[0].name, "Bunkering Commenced");
        assert!(config.vocabulary[0].pair.is_none());
    }

    #[test]
    fn gap_rule_lookup_falls_back_to_default() {
        let thresholds = DetectorThresholds::default();
        assert_eq!(
            thresholds.max_gap_minutes("Vessel Arrived", "NOR Tendered"),
            360
        );
        assert_eq!(
            thresholds.max_gap_minutes("NOR Tendered", "Vessel Sailed"),
            thresholds.default_max_gap_minutes
        );
    }
}
