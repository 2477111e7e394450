//! The NLU engine: intent classification and entity recognition together.
//!
//! [`NluEngine`] owns a [`DomainManager`] and a [`NerManager`] built over
//! one set of [`Collaborators`]. It loads corpora, trains, answers
//! utterances and persists the whole model as JSON.
//!
//! # Examples
//!
//! ```
//! use parlance::engine::{EngineConfig, NluEngine};
//! use parlance::neural::BackendKind;
//!
//! let config = EngineConfig {
//!     backend: BackendKind::InProcess,
//!     ..Default::default()
//! };
//! let mut engine = NluEngine::new(config);
//! engine.add_document(Some("food"), "check my cart", "order.check");
//! engine.add_document(Some("food"), "where is my order", "order.check_status");
//! engine.train().unwrap();
//!
//! let result = engine.process("check my cart", None, None).unwrap();
//! assert_eq!(result.domain, "food");
//! assert_eq!(result.intent, "order.check");
//! assert_eq!(result.score, 1.0);
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::analysis::pipeline::Collaborators;
use crate::classification::Classification;
use crate::domain::{
    DEFAULT_DOMAIN, DomainClassification, DomainManager, DomainManagerModel,
    DomainManagerSettings, MASTER_DOMAIN,
};
use crate::error::Result;
use crate::ner::{EntityMatch, LevenshteinScorer, NerManager, NerModel, NerSettings};
use crate::neural::{BackendKind, NONE_INTENT, TrainingStatus};
use crate::nlu::IntentExplanation;

/// Configuration of an [`NluEngine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub domain: DomainManagerSettings,
    pub ner: NerSettings,
    /// Where classifiers are trained.
    pub backend: BackendKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            domain: DomainManagerSettings::default(),
            ner: NerSettings::default(),
            backend: BackendKind::default(),
        }
    }
}

impl EngineConfig {
    /// Load a JSON configuration. Missing fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }
}

/// One intent of a corpus file with its sample utterances.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorpusIntent {
    pub intent: String,
    /// Domain owning the intent. Unset intents go to the master domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default)]
    pub utterances: Vec<String>,
}

/// Entity declared in a corpus file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorpusEntity {
    /// Option name to synonyms.
    Enum { options: BTreeMap<String, Vec<String>> },
    Regex { regex: String },
    /// A bare `/source/flags` string.
    Pattern(String),
}

/// A training corpus in JSON form.
///
/// ```json
/// {
///   "name": "Orders",
///   "locale": "en-US",
///   "data": [{ "intent": "order.check", "utterances": ["check my cart"] }],
///   "entities": { "number": { "regex": "/\\d+/" } }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub data: Vec<CorpusIntent>,
    #[serde(default)]
    pub entities: BTreeMap<String, CorpusEntity>,
}

impl Corpus {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let corpus: Corpus = serde_json::from_str(&content)?;
        Ok(corpus)
    }
}

/// Answer of [`NluEngine::process`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessResult {
    pub locale: String,
    pub utterance: String,
    /// The entity-substituted utterance, when it gave the answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional_utterance: Option<String>,
    pub domain: String,
    pub classifications: Vec<Classification>,
    pub intent: String,
    pub score: f64,
    pub entities: Vec<EntityMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<IntentExplanation>,
}

/// Serialized form of an [`NluEngine`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineModel {
    #[serde(default)]
    pub config: EngineConfig,
    #[serde(default)]
    pub domains: DomainManagerModel,
    #[serde(default)]
    pub ner: NerModel,
}

/// Classifications reduced to a single intent.
struct Answer {
    domain: String,
    classifications: Vec<Classification>,
    intent: String,
    score: f64,
}

impl Answer {
    /// No classification, a top score of 0 or a tie between the two best
    /// intents answer None with score 1.
    fn from_classification(result: DomainClassification) -> Self {
        let DomainClassification {
            domain,
            classifications,
        } = result;
        // Sentences filed without a domain are reported in the default one.
        let domain = if domain == MASTER_DOMAIN {
            DEFAULT_DOMAIN.to_string()
        } else {
            domain
        };

        let (intent, score) = match classifications.as_slice() {
            [] => (NONE_INTENT.to_string(), 1.0),
            [top, ..] if top.score <= 0.0 => (NONE_INTENT.to_string(), 1.0),
            [top, second, ..] if top.score == second.score => (NONE_INTENT.to_string(), 1.0),
            [top, ..] => (top.intent.clone(), top.score),
        };

        Answer {
            domain,
            classifications,
            intent,
            score,
        }
    }
}

/// Sort matches left to right and drop those overlapping an earlier,
/// longer-or-equal one.
fn substitution_spans(entities: &[EntityMatch]) -> Vec<EntityMatch> {
    let mut sorted = entities.to_vec();
    sorted.sort_by(|a, b| a.start.cmp(&b.start).then(b.len().cmp(&a.len())));

    let mut spans: Vec<EntityMatch> = Vec::with_capacity(sorted.len());
    for found in sorted {
        if spans.last().is_some_and(|last| found.start < last.end) {
            continue;
        }
        spans.push(found);
    }
    spans
}

/// Intent classification plus entity recognition.
#[derive(Debug)]
pub struct NluEngine {
    config: EngineConfig,
    domains: DomainManager,
    ner: NerManager,
}

impl NluEngine {
    /// Create an engine over the default English collaborators.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_collaborators(config, Collaborators::english())
    }

    pub fn with_collaborators(config: EngineConfig, collaborators: Collaborators) -> Self {
        let scorer = LevenshteinScorer::with_normalizer(collaborators.normalizer.clone());
        let ner = NerManager::new(config.ner.clone()).with_scorer(Arc::new(scorer));
        let domains = DomainManager::new(config.domain.clone(), collaborators)
            .with_backend(config.backend.backend());
        NluEngine {
            config,
            domains,
            ner,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn locale(&self) -> &str {
        &self.config.domain.locale
    }

    pub fn domains(&self) -> &DomainManager {
        &self.domains
    }

    pub fn domains_mut(&mut self) -> &mut DomainManager {
        &mut self.domains
    }

    pub fn ner(&self) -> &NerManager {
        &self.ner
    }

    pub fn ner_mut(&mut self) -> &mut NerManager {
        &mut self.ner
    }

    /// Add a training sentence. Without a domain it goes to the master
    /// domain.
    pub fn add_document(&mut self, domain: Option<&str>, utterance: &str, intent: &str) {
        self.domains.add(domain, utterance, intent);
    }

    pub fn remove_document(&mut self, domain: Option<&str>, utterance: &str, intent: &str) -> bool {
        self.domains.remove(domain, utterance, intent)
    }

    /// Add the sentences and entities of a corpus.
    ///
    /// Only the language part of the corpus locale is kept: `en-US` is
    /// `en`.
    pub fn add_corpus(&mut self, corpus: &Corpus) -> Result<()> {
        let locale: String = corpus.locale.chars().take(2).collect();
        if !locale.is_empty() && locale != self.locale() {
            warn!(
                "Corpus {} has locale {} but the engine uses {}",
                corpus.name,
                locale,
                self.locale()
            );
        }
        let locale = if locale.is_empty() {
            self.locale().to_string()
        } else {
            locale
        };

        for entry in &corpus.data {
            for utterance in &entry.utterances {
                self.domains
                    .add(entry.domain.as_deref(), utterance, &entry.intent);
            }
        }

        for (name, entity) in &corpus.entities {
            match entity {
                CorpusEntity::Enum { options } => {
                    for (option, texts) in options {
                        let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
                        self.ner
                            .add_entity_text(name, option, &[locale.as_str()], &texts)?;
                    }
                }
                CorpusEntity::Regex { regex } | CorpusEntity::Pattern(regex) => {
                    self.ner.add_regex_entity(name, &[locale.as_str()], regex)?;
                }
            }
        }

        info!(
            "Loaded corpus {} with {} intents and {} entities",
            corpus.name,
            corpus.data.len(),
            corpus.entities.len()
        );
        Ok(())
    }

    /// Train every domain on the sentences added so far.
    ///
    /// Without sentences nothing is trained and the status map is empty.
    pub fn train(&mut self) -> Result<BTreeMap<String, TrainingStatus>> {
        if self.domains.sentences().is_empty() {
            warn!("No sentences to train on");
        }
        self.domains.train()
    }

    /// Add a corpus and train.
    pub fn train_corpus(&mut self, corpus: &Corpus) -> Result<BTreeMap<String, TrainingStatus>> {
        self.add_corpus(corpus)?;
        self.train()
    }

    /// Entities of `utterance`, in the engine locale unless one is given.
    pub fn find_entities(&self, utterance: &str, locale: Option<&str>) -> Vec<EntityMatch> {
        let locale = locale.unwrap_or(self.locale());
        self.ner.find_entities(utterance, locale, None)
    }

    /// Classify `utterance` and extract its entities.
    ///
    /// When entities are found the utterance with `%entity%` placeholders
    /// is classified as well. Its answer wins when it scores higher or the
    /// plain utterance answered None.
    pub fn process(
        &self,
        utterance: &str,
        locale: Option<&str>,
        domain: Option<&str>,
    ) -> Result<ProcessResult> {
        let locale = locale.unwrap_or(self.locale()).to_string();
        let entities = self.ner.find_entities(utterance, &locale, None);

        let mut answer =
            Answer::from_classification(self.domains.classify(utterance, domain)?);
        let mut answered_by = utterance.to_string();
        let mut optional_utterance = None;

        if !entities.is_empty() {
            let substituted =
                NerManager::replace_entities(utterance, &substitution_spans(&entities));
            if substituted != utterance {
                let optional =
                    Answer::from_classification(self.domains.classify(&substituted, domain)?);
                if optional.score > answer.score || answer.intent == NONE_INTENT {
                    answer = optional;
                    answered_by = substituted.clone();
                    optional_utterance = Some(substituted);
                }
            }
        }

        let explanation = self.explain(&answered_by, &answer)?;

        Ok(ProcessResult {
            locale,
            utterance: utterance.to_string(),
            optional_utterance,
            domain: answer.domain,
            classifications: answer.classifications,
            intent: answer.intent,
            score: answer.score,
            entities,
            explanation,
        })
    }

    fn explain(&self, utterance: &str, answer: &Answer) -> Result<Option<IntentExplanation>> {
        if !self.config.domain.nlu.explain || answer.intent == NONE_INTENT {
            return Ok(None);
        }
        let domain = if self.config.domain.train_by_domain && answer.domain != DEFAULT_DOMAIN {
            answer.domain.as_str()
        } else {
            MASTER_DOMAIN
        };
        match self.domains.domain(domain) {
            Some(nlu) => nlu.explain(utterance, &answer.intent),
            None => Ok(None),
        }
    }

    pub fn export(&self) -> EngineModel {
        EngineModel {
            config: self.config.clone(),
            domains: self.domains.export(),
            ner: self.ner.save(),
        }
    }

    /// Replace the whole state with an exported model.
    pub fn import(&mut self, model: &EngineModel) -> Result<()> {
        if model.config.backend != self.config.backend {
            let collaborators = self.domains.collaborators().clone();
            self.domains = DomainManager::new(model.config.domain.clone(), collaborators)
                .with_backend(model.config.backend.backend());
        }
        self.domains.import(&model.domains)?;
        self.ner.load(&model.ner);
        self.config = model.config.clone();
        Ok(())
    }

    /// Write the engine model as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.export())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load an engine saved with [`save`](Self::save) over the default
    /// English collaborators.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let model: EngineModel = serde_json::from_str(&content)?;
        let mut engine = NluEngine::new(model.config.clone());
        engine.import(&model)?;
        Ok(engine)
    }
}
