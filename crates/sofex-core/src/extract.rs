//! Candidate event extraction from page text.
//!
//! Scans each line for vocabulary phrases (canonical name, alias, or a
//! fuzzy word-window match in accuracy mode) and pairs every hit with the
//! nearest timestamp-shaped text: the same line first, then up to
//! `window_lines` lines below. Confidence multiplies page reliability,
//! phrase-match strength and timestamp clarity. Pages that produce no
//! text simply yield no candidates.

use rapidfuzz::distance::levenshtein;

use crate::config::{ConfidenceWeights, PipelineConfig};
use crate::timeparse::{self, TimeClarity};
use crate::{CandidateEvent, PageText, ProcessingMode};

struct PhraseMatch {
    pattern: usize,
    strength: f64,
    offset: usize,
}

/// Extract candidate events from loaded pages.
///
/// Row indices are assigned in scan order (page, then line, then match
/// position within the line) and are therefore stable across repeated
/// runs over the same document.
pub fn extract(
    pages: &[PageText],
    config: &PipelineConfig,
    mode: ProcessingMode,
) -> Vec<CandidateEvent> {
    let allow_fuzzy = mode == ProcessingMode::Accuracy;
    let mut events = Vec::new();
    let mut row_index: u32 = 0;

    for page in pages {
        if page.text.trim().is_empty() {
            continue;
        }
        let lines: Vec<&str> = page.text.lines().collect();

        for (li, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let mut matches = match_phrases(line, config, allow_fuzzy);
            if matches.is_empty() {
                continue;
            }
            matches.sort_by_key(|m| m.offset);

            // Timestamp search: same line, then the window below.
            let found = timeparse::find_time_text(line).or_else(|| {
                lines[li + 1..]
                    .iter()
                    .take(config.extraction.window_lines)
                    .find_map(|next| timeparse::find_time_text(next))
            });
            let Some((raw_time_text, clarity)) = found else {
                continue;
            };

            for m in matches {
                let confidence = (page.confidence
                    * m.strength
                    * clarity_factor(clarity, &config.weights))
                .clamp(0.0, 1.0);
                events.push(CandidateEvent {
                    event_name: config.vocabulary[m.pattern].name.clone(),
                    raw_time_text: raw_time_text.clone(),
                    page: page.page,
                    row_index,
                    confidence,
                });
                row_index += 1;
            }
        }
    }

    log::debug!("extracted {} candidate event(s)", events.len());
    events
}

fn clarity_factor(clarity: TimeClarity, weights: &ConfidenceWeights) -> f64 {
    match clarity {
        TimeClarity::IsoOffset => weights.clarity_iso_offset,
        TimeClarity::IsoLocal => weights.clarity_iso_local,
        TimeClarity::SlashDayFirst | TimeClarity::SlashMonthFirst => weights.clarity_slash,
        TimeClarity::SlashAmbiguous => weights.clarity_slash_ambiguous,
        TimeClarity::FreeText => weights.clarity_free_text,
    }
}

/// Match every vocabulary pattern against one line, best hit per pattern.
fn match_phrases(line: &str, config: &PipelineConfig, allow_fuzzy: bool) -> Vec<PhraseMatch> {
    let line_lower = line.to_lowercase();
    let mut out = Vec::new();

    for (pattern_idx, pattern) in config.vocabulary.iter().enumerate() {
        let name_lower = pattern.name.to_lowercase();
        if let Some(offset) = line_lower.find(&name_lower) {
            out.push(PhraseMatch {
                pattern: pattern_idx,
                strength: config.weights.phrase_exact,
                offset,
            });
            continue;
        }

        if let Some(offset) = pattern
            .aliases
            .iter()
            .find_map(|alias| line_lower.find(alias.as_str()))
        {
            out.push(PhraseMatch {
                pattern: pattern_idx,
                strength: config.weights.phrase_alias,
                offset,
            });
            continue;
        }

        if allow_fuzzy {
            if let Some((offset, similarity)) =
                fuzzy_match(&line_lower, pattern, config.extraction.fuzzy_min_similarity)
            {
                out.push(PhraseMatch {
                    pattern: pattern_idx,
                    strength: similarity * config.weights.phrase_fuzzy_scale,
                    offset,
                });
            }
        }
    }

    out
}

/// Best fuzzy hit for a pattern: slide a word window the width of each
/// multi-word phrase across the line and score it with normalized
/// Levenshtein similarity. Single-word aliases are excluded: they are
/// short enough that one edit turns an unrelated word into a match.
fn fuzzy_match(
    line_lower: &str,
    pattern: &crate::vocab::EventPattern,
    min_similarity: f64,
) -> Option<(usize, f64)> {
    let words = words_with_offsets(line_lower);
    if words.is_empty() {
        return None;
    }

    let mut best: Option<(usize, f64)> = None;
    let phrases = std::iter::once(pattern.name.to_lowercase())
        .chain(pattern.aliases.iter().cloned())
        .filter(|p| p.split_whitespace().count() >= 2);

    for phrase in phrases {
        let width = phrase.split_whitespace().count();
        if words.len() < width {
            continue;
        }
        for window in words.windows(width) {
            let candidate = window
                .iter()
                .map(|(_, w)| *w)
                .collect::<Vec<_>>()
                .join(" ");
            let similarity =
                levenshtein::normalized_similarity(candidate.chars(), phrase.chars());
            if similarity >= min_similarity
                && best.map(|(_, s)| similarity > s).unwrap_or(true)
            {
                best = Some((window[0].0, similarity));
            }
        }
    }

    best
}

fn words_with_offsets(line: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut pos = 0;
    for word in line.split_whitespace() {
        if let Some(found) = line[pos..].find(word) {
            let offset = pos + found;
            out.push((offset, word));
            pos = offset + word.len();
        }
    }
    out
}
