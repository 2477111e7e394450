//! Named entity recognition.
//!
//! Entities are either enumerations of options with per-locale synonyms,
//! matched fuzzily through a [`SimilarityScorer`], or regular expressions
//! whose every match is collected.
//!
//! # Examples
//!
//! ```
//! use parlance::ner::NerManager;
//!
//! let mut ner = NerManager::default();
//! ner.add_regex_entity("number", &["en"], "/\\d+/g").unwrap();
//!
//! let found = ner.find_entities("I have 3 cats and 12 dogs", "en", None);
//! assert_eq!(found.len(), 2);
//! assert_eq!((found[1].start, found[1].end), (18, 20));
//! ```

pub mod entity;
pub mod manager;
pub mod similarity;

pub use entity::{EntityKind, EntityMatch, EntityOption, EntityRegex, NamedEntity};
pub use manager::{NerManager, NerModel, NerSettings};
pub use similarity::{LevenshteinScorer, SimilarityScorer, SpanMatch};
