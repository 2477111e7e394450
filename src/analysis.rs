//! Text analysis for the feature pipeline.
//!
//! Raw utterances become features by passing through four collaborators:
//! a [`normalizer::Normalizer`], a [`tokenizer::Tokenizer`], a
//! [`stopwords::StopwordFilter`] and a [`stemmer::Stemmer`]. Each one is
//! wrapped in a [`pipeline::Step`] and run in order by a
//! [`pipeline::Pipeline`].

pub mod normalizer;
pub mod pipeline;
pub mod stemmer;
pub mod stopwords;
pub mod token;
pub mod tokenizer;
