//! Vocabulary-restricted spell checking.
//!
//! Tokens that are not in the trained vocabulary are replaced by the closest
//! known feature within a maximum edit distance. Ties prefer a candidate
//! whose length is closer to the token, then the more frequent feature.

use std::collections::BTreeMap;

use ahash::AHashMap;

use crate::util::levenshtein::levenshtein_distance_threshold;

/// Tokens shorter than this are never corrected.
const MIN_TOKEN_LENGTH: usize = 4;

/// Spell checker over a feature vocabulary.
#[derive(Clone, Debug, Default)]
pub struct SpellCheck {
    frequencies: AHashMap<String, u32>,
    by_length: BTreeMap<usize, Vec<String>>,
}

impl SpellCheck {
    /// Build a checker from `(feature, frequency)` pairs.
    pub fn new<'a, I>(vocabulary: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a u32)>,
    {
        let mut checker = SpellCheck::default();
        for (feature, &frequency) in vocabulary {
            checker.frequencies.insert(feature.clone(), frequency);
            checker
                .by_length
                .entry(feature.chars().count())
                .or_default()
                .push(feature.clone());
        }
        checker
    }

    /// Correct one token.
    pub fn check_token(&self, token: &str, distance: usize) -> String {
        if self.frequencies.contains_key(token) {
            return token.to_string();
        }
        let length = token.chars().count();
        if length < MIN_TOKEN_LENGTH {
            return token.to_string();
        }

        let mut best: Option<(&str, usize)> = None;
        let lengths = length.saturating_sub(distance)..=length + distance;
        for candidates in self.by_length.range(lengths).map(|(_, v)| v) {
            for feature in candidates {
                let Some(current) = levenshtein_distance_threshold(token, feature, distance) else {
                    continue;
                };
                let better = match best {
                    None => true,
                    Some((best_feature, best_distance)) => {
                        current < best_distance
                            || (current == best_distance
                                && self.prefer(feature, best_feature, length))
                    }
                };
                if better {
                    best = Some((feature.as_str(), current));
                }
            }
        }

        best.map(|(feature, _)| feature.to_string())
            .unwrap_or_else(|| token.to_string())
    }

    /// Tie-break between two candidates at the same distance.
    fn prefer(&self, candidate: &str, current: &str, length: usize) -> bool {
        let candidate_gap = candidate.chars().count().abs_diff(length);
        let current_gap = current.chars().count().abs_diff(length);
        if candidate_gap != current_gap {
            return candidate_gap < current_gap;
        }
        self.frequency(candidate) > self.frequency(current)
    }

    fn frequency(&self, feature: &str) -> u32 {
        self.frequencies.get(feature).copied().unwrap_or(0)
    }

    /// Correct every token.
    pub fn check<S: AsRef<str>>(&self, tokens: &[S], distance: usize) -> Vec<String> {
        tokens
            .iter()
            .map(|token| self.check_token(token.as_ref(), distance))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(words: &[(&str, u32)]) -> SpellCheck {
        let vocabulary: BTreeMap<String, u32> =
            words.iter().map(|(w, f)| (w.to_string(), *f)).collect();
        SpellCheck::new(&vocabulary)
    }

    #[test]
    fn test_corrects_within_distance() {
        let spell = checker(&[("deliveri", 3), ("order", 5), ("basket", 2)]);
        assert_eq!(spell.check_token("delivri", 1), "deliveri");
        assert_eq!(spell.check_token("ordre", 1), "ordre");
        assert_eq!(spell.check_token("ordre", 2), "order");
    }

    #[test]
    fn test_short_and_known_tokens_untouched() {
        let spell = checker(&[("cart", 1)]);
        assert_eq!(spell.check_token("cat", 1), "cat");
        assert_eq!(spell.check_token("cart", 1), "cart");
    }

    #[test]
    fn test_tie_prefers_frequency() {
        let spell = checker(&[("bake", 1), ("cake", 7)]);
        assert_eq!(spell.check_token("dake", 1), "cake");
        assert_eq!(spell.check(&["dake", "xx"], 1), vec!["cake", "xx"]);
    }
}
