//! Typed text pipeline.
//!
//! Text flows through an ordered list of [`Step`]s, each of which mutates a
//! shared [`StepRecord`]. The default order is normalize → tokenize →
//! remove-stopwords → stem. Steps are addressed by their `name()`, so callers
//! can insert a step before another one or replace a default step without
//! touching the rest of the sequence.
//!
//! # Examples
//!
//! ```
//! use parlance::analysis::pipeline::Collaborators;
//!
//! let pipeline = Collaborators::english().pipeline();
//! let record = pipeline.run("en", "Where are my Orders?", true).unwrap();
//!
//! let stems: Vec<_> = record.tokens.iter().map(|t| t.text.as_str()).collect();
//! assert_eq!(stems, vec!["where", "ar", "my", "order"]);
//! ```

use std::sync::Arc;

use crate::analysis::normalizer::{DiacriticNormalizer, Normalizer};
use crate::analysis::stemmer::{PorterStemmer, Stemmer};
use crate::analysis::stopwords::{StopWords, StopwordFilter};
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{Tokenizer, UnicodeWordTokenizer};
use crate::error::{NluError, Result};

/// The record every step reads from and writes to.
#[derive(Clone, Debug, Default)]
pub struct StepRecord {
    /// Locale of the text.
    pub locale: String,
    /// Current text. The normalize step rewrites it in place.
    pub text: String,
    /// Tokens produced by the tokenize step.
    pub tokens: Vec<Token>,
    /// When false the stopword step drops stopwords.
    pub keep_stopwords: bool,
}

impl StepRecord {
    /// Create a record for the given text.
    pub fn new<L: Into<String>, T: Into<String>>(locale: L, text: T, keep_stopwords: bool) -> Self {
        StepRecord {
            locale: locale.into(),
            text: text.into(),
            tokens: Vec::new(),
            keep_stopwords,
        }
    }

    /// The token texts in order.
    pub fn token_texts(&self) -> Vec<String> {
        self.tokens.iter().map(|t| t.text.clone()).collect()
    }
}

/// A single transformation over a [`StepRecord`].
pub trait Step: Send + Sync {
    /// Apply this step to the record.
    fn apply(&self, record: &mut StepRecord) -> Result<()>;

    /// Get the name of this step.
    fn name(&self) -> &'static str;
}

/// Rewrites `record.text` with a [`Normalizer`].
pub struct NormalizeStep {
    normalizer: Arc<dyn Normalizer>,
}

impl NormalizeStep {
    pub fn new(normalizer: Arc<dyn Normalizer>) -> Self {
        NormalizeStep { normalizer }
    }
}

impl Step for NormalizeStep {
    fn apply(&self, record: &mut StepRecord) -> Result<()> {
        record.text = self.normalizer.normalize(&record.text);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "normalize"
    }
}

/// Splits `record.text` into `record.tokens`.
pub struct TokenizeStep {
    tokenizer: Arc<dyn Tokenizer>,
}

impl TokenizeStep {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        TokenizeStep { tokenizer }
    }
}

impl Step for TokenizeStep {
    fn apply(&self, record: &mut StepRecord) -> Result<()> {
        record.tokens = self.tokenizer.tokenize(&record.text)?.collect();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tokenize"
    }
}

/// Marks stopwords and drops them unless the record keeps stopwords.
pub struct RemoveStopwordsStep {
    stopwords: Arc<dyn StopwordFilter>,
}

impl RemoveStopwordsStep {
    pub fn new(stopwords: Arc<dyn StopwordFilter>) -> Self {
        RemoveStopwordsStep { stopwords }
    }
}

impl Step for RemoveStopwordsStep {
    fn apply(&self, record: &mut StepRecord) -> Result<()> {
        let tokens = std::mem::take(&mut record.tokens);
        record.tokens = tokens
            .into_iter()
            .map(|token| {
                if self.stopwords.is_stopword(&token.text) {
                    token.stop()
                } else {
                    token
                }
            })
            .filter(|token| record.keep_stopwords || !token.is_stopped())
            .collect();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "remove_stopwords"
    }
}

/// Rewrites every token text with a [`Stemmer`].
pub struct StemStep {
    stemmer: Arc<dyn Stemmer>,
}

impl StemStep {
    pub fn new(stemmer: Arc<dyn Stemmer>) -> Self {
        StemStep { stemmer }
    }
}

impl Step for StemStep {
    fn apply(&self, record: &mut StepRecord) -> Result<()> {
        for token in record.tokens.iter_mut() {
            token.text = self.stemmer.stem(&token.text);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stem"
    }
}

/// An ordered list of steps.
#[derive(Clone, Default)]
pub struct Pipeline {
    steps: Vec<Arc<dyn Step>>,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Pipeline { steps: Vec::new() }
    }

    /// Append a step.
    pub fn add_step(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    /// Insert a step before the step called `before`.
    pub fn insert_before(&mut self, before: &str, step: Arc<dyn Step>) -> Result<()> {
        let index = self.position(before)?;
        self.steps.insert(index, step);
        Ok(())
    }

    /// Replace the step that has the same name as `step`.
    pub fn replace_step(&mut self, step: Arc<dyn Step>) -> Result<()> {
        let index = self.position(step.name())?;
        self.steps[index] = step;
        Ok(())
    }

    /// Remove the step called `name`.
    pub fn remove_step(&mut self, name: &str) -> Result<()> {
        let index = self.position(name)?;
        self.steps.remove(index);
        Ok(())
    }

    /// Names of the steps in execution order.
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step over a fresh record.
    pub fn run(&self, locale: &str, text: &str, keep_stopwords: bool) -> Result<StepRecord> {
        let mut record = StepRecord::new(locale, text, keep_stopwords);
        for step in &self.steps {
            step.apply(&mut record)?;
        }
        Ok(record)
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.steps
            .iter()
            .position(|s| s.name() == name)
            .ok_or_else(|| NluError::analysis(format!("Unknown pipeline step: {name}")))
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.step_names())
            .finish()
    }
}

/// The text collaborators shared by the classifiers and the entity recognizer.
#[derive(Clone)]
pub struct Collaborators {
    pub normalizer: Arc<dyn Normalizer>,
    pub tokenizer: Arc<dyn Tokenizer>,
    pub stopwords: Arc<dyn StopwordFilter>,
    pub stemmer: Arc<dyn Stemmer>,
}

impl Collaborators {
    /// Default English collaborators.
    pub fn english() -> Self {
        Collaborators {
            normalizer: Arc::new(DiacriticNormalizer::new()),
            tokenizer: Arc::new(UnicodeWordTokenizer::new()),
            stopwords: Arc::new(StopWords::new()),
            stemmer: Arc::new(PorterStemmer::new()),
        }
    }

    /// Start building a set of collaborators.
    pub fn builder() -> CollaboratorsBuilder {
        CollaboratorsBuilder::default()
    }

    /// The default step order over these collaborators.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new()
            .add_step(Arc::new(NormalizeStep::new(self.normalizer.clone())))
            .add_step(Arc::new(TokenizeStep::new(self.tokenizer.clone())))
            .add_step(Arc::new(RemoveStopwordsStep::new(self.stopwords.clone())))
            .add_step(Arc::new(StemStep::new(self.stemmer.clone())))
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::english()
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("normalizer", &self.normalizer.name())
            .field("tokenizer", &self.tokenizer.name())
            .field("stopwords", &self.stopwords.name())
            .field("stemmer", &self.stemmer.name())
            .finish()
    }
}

/// Builder for [`Collaborators`]. Every collaborator is required.
#[derive(Default)]
pub struct CollaboratorsBuilder {
    normalizer: Option<Arc<dyn Normalizer>>,
    tokenizer: Option<Arc<dyn Tokenizer>>,
    stopwords: Option<Arc<dyn StopwordFilter>>,
    stemmer: Option<Arc<dyn Stemmer>>,
}

impl CollaboratorsBuilder {
    pub fn normalizer(mut self, normalizer: Arc<dyn Normalizer>) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    pub fn stopwords(mut self, stopwords: Arc<dyn StopwordFilter>) -> Self {
        self.stopwords = Some(stopwords);
        self
    }

    pub fn stemmer(mut self, stemmer: Arc<dyn Stemmer>) -> Self {
        self.stemmer = Some(stemmer);
        self
    }

    /// Build the collaborators, failing if any of them is missing.
    pub fn build(self) -> Result<Collaborators> {
        let missing = |what: &str| NluError::invalid_config(format!("missing {what} collaborator"));
        Ok(Collaborators {
            normalizer: self.normalizer.ok_or_else(|| missing("normalizer"))?,
            tokenizer: self.tokenizer.ok_or_else(|| missing("tokenizer"))?,
            stopwords: self.stopwords.ok_or_else(|| missing("stopword"))?,
            stemmer: self.stemmer.ok_or_else(|| missing("stemmer"))?,
        })
    }
}
