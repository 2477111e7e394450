//! # Parlance
//!
//! A trainable natural-language-understanding engine for Rust.
//!
//! ## Features
//!
//! - Single-layer perceptron intent classifier with momentum and adaptive
//!   learning rate
//! - Training on the caller's thread or on a dedicated worker thread
//! - Per-domain classifiers with domain routing and an exact-match stem-dict
//! - Configurable text analysis pipeline (normalize, tokenize, stopwords, stem)
//! - Named entities from synonym enumerations (fuzzy) and regular expressions
//! - JSON model export and import

pub mod analysis;
pub mod classification;
pub mod cli;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ner;
pub mod neural;
pub mod nlu;
pub mod util;

pub mod prelude {
    pub use crate::classification::Classification;
    pub use crate::domain::{DomainManager, DomainManagerSettings};
    pub use crate::engine::{Corpus, EngineConfig, NluEngine, ProcessResult};
    pub use crate::error::{NluError, Result};
    pub use crate::ner::{EntityMatch, NerManager};
    pub use crate::nlu::{CorpusItem, Nlu, NluSettings};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
