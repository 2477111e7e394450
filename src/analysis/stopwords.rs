//! Stopword collaborator.
//!
//! The stopword step consults a [`StopwordFilter`] for every token. The
//! default [`StopWords`] set holds a short English list; custom lists are
//! built with [`StopWords::from_words`].
//!
//! # Examples
//!
//! ```
//! use parlance::analysis::stopwords::{StopWords, StopwordFilter};
//!
//! let stopwords = StopWords::new();
//! assert!(stopwords.is_stopword("the"));
//! assert!(!stopwords.is_stopword("order"));
//! ```

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

/// Default English stop words list.
const DEFAULT_ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

/// Default English stop words as a HashSet.
pub static DEFAULT_ENGLISH_STOP_WORDS_SET: LazyLock<HashSet<String>> = LazyLock::new(|| {
    DEFAULT_ENGLISH_STOP_WORDS
        .iter()
        .map(|&s| s.to_string())
        .collect()
});

/// Trait for stopword filters.
pub trait StopwordFilter: Send + Sync {
    /// Check if a word is a stop word.
    fn is_stopword(&self, word: &str) -> bool;

    /// Get the name of this filter.
    fn name(&self) -> &'static str;
}

/// A set of stop words.
#[derive(Clone, Debug)]
pub struct StopWords {
    stop_words: Arc<HashSet<String>>,
}

impl StopWords {
    /// Create a stopword set with the default English stop words.
    pub fn new() -> Self {
        Self::with_stop_words(DEFAULT_ENGLISH_STOP_WORDS_SET.clone())
    }

    /// Create a stopword set from an owned set.
    pub fn with_stop_words(stop_words: HashSet<String>) -> Self {
        StopWords {
            stop_words: Arc::new(stop_words),
        }
    }

    /// Create a stopword set from a list of words.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stop_words = words.into_iter().map(|s| s.into()).collect();
        Self::with_stop_words(stop_words)
    }

    /// Get the number of stop words.
    pub fn len(&self) -> usize {
        self.stop_words.len()
    }

    /// Check if the stop word set is empty.
    pub fn is_empty(&self) -> bool {
        self.stop_words.is_empty()
    }
}

impl Default for StopWords {
    fn default() -> Self {
        Self::new()
    }
}

impl StopwordFilter for StopWords {
    fn is_stopword(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }

    fn name(&self) -> &'static str {
        "stopwords"
    }
}
