//! Fuzzy matching of entity synonyms inside utterances.
//!
//! The default [`LevenshteinScorer`] compares every run of consecutive words
//! of the utterance with a synonym. Its accuracy is
//! `(len(synonym) - distance) / len(synonym)` computed on normalized text,
//! while the reported offsets point into the original utterance.

use std::sync::Arc;

use crate::analysis::normalizer::{DiacriticNormalizer, Normalizer};
use crate::ner::entity::EntityMatch;
use crate::util::levenshtein::levenshtein_distance;

/// A span of the utterance that resembles a synonym.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanMatch {
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
    pub levenshtein: usize,
    pub accuracy: f64,
}

/// Finds occurrences of a text inside an utterance.
pub trait SimilarityScorer: Send + Sync {
    /// Every span whose accuracy against `text` reaches `threshold`.
    fn find(&self, utterance: &str, text: &str, threshold: f64) -> Vec<SpanMatch>;

    /// Get the name of this scorer.
    fn name(&self) -> &'static str;
}

/// Byte ranges of the words of `text`. A word is a run of alphanumeric
/// characters other than `_`.
pub fn word_positions(text: &str) -> Vec<(usize, usize)> {
    let mut positions = Vec::new();
    let mut start = None;
    for (index, c) in text.char_indices() {
        let in_word = c.is_alphanumeric() && c != '_';
        match (in_word, start) {
            (true, None) => start = Some(index),
            (false, Some(begin)) => {
                positions.push((begin, index));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(begin) = start {
        positions.push((begin, text.len()));
    }
    positions
}

/// Levenshtein scorer over word spans.
pub struct LevenshteinScorer {
    normalizer: Arc<dyn Normalizer>,
}

impl LevenshteinScorer {
    pub fn new() -> Self {
        Self::with_normalizer(Arc::new(DiacriticNormalizer::new()))
    }

    pub fn with_normalizer(normalizer: Arc<dyn Normalizer>) -> Self {
        LevenshteinScorer { normalizer }
    }

    fn score(&self, span: &str, text: &str, text_len: usize, exact: bool) -> (usize, f64) {
        let span = self.normalizer.normalize(span);
        let distance = if span == text {
            0
        } else if exact {
            text_len.max(1)
        } else {
            levenshtein_distance(&span, text)
        };
        let accuracy = (text_len as f64 - distance as f64) / text_len.max(1) as f64;
        (distance, accuracy)
    }
}

impl Default for LevenshteinScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LevenshteinScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevenshteinScorer")
            .field("normalizer", &self.normalizer.name())
            .finish()
    }
}

impl SimilarityScorer for LevenshteinScorer {
    fn find(&self, utterance: &str, text: &str, threshold: f64) -> Vec<SpanMatch> {
        let text = self.normalizer.normalize(text);
        let text_len = text.chars().count();
        if text_len == 0 {
            return Vec::new();
        }
        // Only identical spans can reach an accuracy of 1.
        let exact = threshold >= 1.0;

        let mut matches = Vec::new();
        let mut push = |start: usize, end: usize| {
            let (levenshtein, accuracy) = self.score(&utterance[start..end], &text, text_len, exact);
            if accuracy >= threshold {
                matches.push(SpanMatch {
                    start,
                    end,
                    levenshtein,
                    accuracy,
                });
            }
        };

        if utterance.chars().count() <= text_len {
            push(0, utterance.len());
            return matches;
        }

        let words = word_positions(utterance);
        for (i, &(start, _)) in words.iter().enumerate() {
            for &(_, end) in &words[i..] {
                push(start, end);
            }
        }
        matches
    }

    fn name(&self) -> &'static str {
        "levenshtein"
    }
}

/// Drop matches that overlap a better one.
///
/// Higher accuracy wins. On equal accuracy the longer span wins, and the
/// earlier one when both have the same length.
pub fn reduce_edges(matches: Vec<EntityMatch>) -> Vec<EntityMatch> {
    let mut discarded = vec![false; matches.len()];
    for i in 0..matches.len() {
        if discarded[i] {
            continue;
        }
        for j in i + 1..matches.len() {
            if discarded[j] {
                continue;
            }
            let (edge, other) = (&matches[i], &matches[j]);
            if other.start >= edge.end || other.end <= edge.start {
                continue;
            }
            if other.accuracy < edge.accuracy {
                discarded[j] = true;
            } else if other.accuracy > edge.accuracy {
                discarded[i] = true;
                break;
            } else if other.len() <= edge.len() {
                discarded[j] = true;
            } else {
                discarded[i] = true;
                break;
            }
        }
    }

    matches
        .into_iter()
        .zip(discarded)
        .filter(|(_, discarded)| !discarded)
        .map(|(m, _)| m)
        .collect()
}
