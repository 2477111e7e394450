//! Domain manager: sentence log, stem-dict and per-domain classifiers.
//!
//! Training runs in four stages. The stemmer stage is a no-op for the
//! rule-based stemmers shipped with the crate.
//!
//! ```text
//! train_stemmer → generate_corpus → fill_stem_dict → train each domain
//! ```
//!
//! Classification first looks the canonical stem key of the utterance up in
//! the stem-dict. A hit answers with score 1 without touching any network.
//! Otherwise the utterance goes to the requested domain, to the master
//! router when training by domain, or to the master classifier.
//!
//! # Examples
//!
//! ```
//! use parlance::analysis::pipeline::Collaborators;
//! use parlance::domain::{DomainManager, DomainManagerSettings};
//!
//! let mut manager = DomainManager::new(DomainManagerSettings::default(), Collaborators::english());
//! manager.add(Some("food"), "check my cart", "order.check");
//! manager.add(Some("food"), "where is my order", "order.check_status");
//! manager.train().unwrap();
//!
//! let result = manager.classify("check my cart", None).unwrap();
//! assert_eq!(result.domain, "food");
//! assert_eq!(result.classifications[0].intent, "order.check");
//! assert_eq!(result.classifications[0].score, 1.0);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::analysis::pipeline::{Collaborators, Pipeline};
use crate::classification::Classification;
use crate::domain::corpus::{SentenceLog, TrainingExample};
use crate::domain::{DEFAULT_DOMAIN, MASTER_DOMAIN};
use crate::error::Result;
use crate::neural::{NONE_INTENT, TrainerBackend, TrainingStatus, WorkerThread};
use crate::nlu::allow_list::AllowList;
use crate::nlu::{Nlu, NluModel, NluSettings};

/// Settings of a domain manager.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainManagerSettings {
    pub locale: String,
    /// Route through a master classifier trained on domain names.
    pub train_by_domain: bool,
    /// Answer exact stem matches from the stem-dict.
    pub use_stem_dict: bool,
    /// Settings of every domain classifier. The locale is overridden.
    pub nlu: NluSettings,
}

impl Default for DomainManagerSettings {
    fn default() -> Self {
        DomainManagerSettings {
            locale: "en".to_string(),
            train_by_domain: false,
            use_stem_dict: true,
            nlu: NluSettings::default(),
        }
    }
}

/// Owner of a canonical stem key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemDictEntry {
    pub domain: String,
    pub intent: String,
}

/// Classifications together with the domain that produced them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainClassification {
    pub domain: String,
    pub classifications: Vec<Classification>,
}

impl DomainClassification {
    /// Answer for an utterance no domain can take.
    pub fn unknown() -> Self {
        DomainClassification {
            domain: DEFAULT_DOMAIN.to_string(),
            classifications: vec![Classification::new(NONE_INTENT, 1.0)],
        }
    }
}

/// Serialized form of a [`DomainManager`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainManagerModel {
    #[serde(default)]
    pub settings: DomainManagerSettings,
    #[serde(default)]
    pub stem_dict: BTreeMap<String, StemDictEntry>,
    #[serde(default)]
    pub intent_dict: BTreeMap<String, String>,
    #[serde(default)]
    pub sentences: SentenceLog,
    #[serde(default)]
    pub domains: BTreeMap<String, NluModel>,
}

/// Classifier per domain plus an exact-match cache.
pub struct DomainManager {
    settings: DomainManagerSettings,
    collaborators: Collaborators,
    pipeline: Pipeline,
    backend: Arc<dyn TrainerBackend>,
    domains: BTreeMap<String, Nlu>,
    stem_dict: BTreeMap<String, StemDictEntry>,
    intent_dict: BTreeMap<String, String>,
    sentences: SentenceLog,
}

impl std::fmt::Debug for DomainManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainManager")
            .field("settings", &self.settings)
            .field("backend", &self.backend.name())
            .field("domains", &self.domains.keys().collect::<Vec<_>>())
            .field("stem_dict", &self.stem_dict.len())
            .field("sentences", &self.sentences.len())
            .finish()
    }
}

impl DomainManager {
    /// Create a manager holding only the master domain.
    pub fn new(settings: DomainManagerSettings, collaborators: Collaborators) -> Self {
        let mut manager = DomainManager {
            pipeline: collaborators.pipeline(),
            collaborators,
            backend: Arc::new(WorkerThread),
            domains: BTreeMap::new(),
            stem_dict: BTreeMap::new(),
            intent_dict: BTreeMap::new(),
            sentences: SentenceLog::new(),
            settings,
        };
        manager.add_domain(MASTER_DOMAIN);
        manager
    }

    /// Train every domain through `backend`.
    pub fn with_backend(mut self, backend: Arc<dyn TrainerBackend>) -> Self {
        self.domains = std::mem::take(&mut self.domains)
            .into_iter()
            .map(|(name, nlu)| (name, nlu.with_backend(backend.clone())))
            .collect();
        self.backend = backend;
        self
    }

    pub fn settings(&self) -> &DomainManagerSettings {
        &self.settings
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    fn nlu_settings(&self) -> NluSettings {
        NluSettings {
            locale: self.settings.locale.clone(),
            ..self.settings.nlu.clone()
        }
    }

    /// Add a domain if it does not exist yet and return its classifier.
    pub fn add_domain(&mut self, name: &str) -> &mut Nlu {
        let settings = self.nlu_settings();
        let collaborators = &self.collaborators;
        let backend = self.backend.clone();
        self.domains
            .entry(name.to_string())
            .or_insert_with(|| Nlu::new(settings, collaborators).with_backend(backend))
    }

    pub fn remove_domain(&mut self, name: &str) -> bool {
        self.domains.remove(name).is_some()
    }

    pub fn domain(&self, name: &str) -> Option<&Nlu> {
        self.domains.get(name)
    }

    pub fn domain_names(&self) -> Vec<&str> {
        self.domains.keys().map(|k| k.as_str()).collect()
    }

    pub fn sentences(&self) -> &SentenceLog {
        &self.sentences
    }

    pub fn stem_dict(&self) -> &BTreeMap<String, StemDictEntry> {
        &self.stem_dict
    }

    /// Intent to owning domain, as of the last training.
    pub fn intent_dict(&self) -> &BTreeMap<String, String> {
        &self.intent_dict
    }

    /// Add a sentence. Without a domain it is filed under the master domain.
    pub fn add(&mut self, domain: Option<&str>, utterance: &str, intent: &str) {
        let domain = domain.unwrap_or(MASTER_DOMAIN);
        self.sentences
            .add(TrainingExample::new(domain, utterance, intent));
    }

    /// Remove the first matching sentence. Returns false when none matched.
    pub fn remove(&mut self, domain: Option<&str>, utterance: &str, intent: &str) -> bool {
        let domain = domain.unwrap_or(MASTER_DOMAIN);
        self.sentences
            .remove(&TrainingExample::new(domain, utterance, intent))
    }

    /// Sorted distinct stems of `utterance`, joined by commas.
    pub fn generate_stem_key(&self, utterance: &str) -> Result<String> {
        let record = self.pipeline.run(
            &self.settings.locale,
            utterance,
            self.settings.nlu.keep_stopwords,
        )?;
        let stems: BTreeSet<String> = record
            .tokens
            .into_iter()
            .map(|token| token.text)
            .filter(|text| !text.is_empty())
            .collect();
        Ok(stems.into_iter().collect::<Vec<_>>().join(","))
    }

    /// Stemmers shipped with the crate are rule based and need no training.
    fn train_stemmer(&mut self) {}

    /// Rebuild the stem-dict and the intent dictionary from the sentence
    /// log. On a key collision the last sentence wins.
    fn fill_stem_dict(&mut self) -> Result<()> {
        let mut stem_dict = BTreeMap::new();
        let mut intent_dict = BTreeMap::new();

        for sentence in self.sentences.iter() {
            let key = self.generate_stem_key(&sentence.utterance)?;
            if key.is_empty() {
                warn!(
                    "Utterance \"{}\" has no stems; it shares the empty stem key",
                    sentence.utterance
                );
            }
            stem_dict.insert(
                key,
                StemDictEntry {
                    domain: sentence.domain.clone(),
                    intent: sentence.intent.clone(),
                },
            );
            intent_dict.insert(sentence.intent.clone(), sentence.domain.clone());
        }

        self.stem_dict = stem_dict;
        self.intent_dict = intent_dict;
        Ok(())
    }

    /// Train every domain on a corpus rebuilt from the sentence log.
    pub fn train(&mut self) -> Result<BTreeMap<String, TrainingStatus>> {
        self.train_stemmer();
        let corpus = self.sentences.generate_corpus(self.settings.train_by_domain);
        self.fill_stem_dict()?;

        let mut statuses = BTreeMap::new();
        for (name, items) in corpus {
            info!("Training domain {} on {} utterances", name, items.len());
            let status = self.add_domain(&name).train(&items)?;
            info!("Domain {} trained in {} iterations", name, status.iterations);
            statuses.insert(name, status);
        }
        self.domains
            .retain(|name, _| name == MASTER_DOMAIN || statuses.contains_key(name));
        Ok(statuses)
    }

    /// Classify an utterance, optionally inside one domain.
    ///
    /// An unknown domain answers None in the `default` domain.
    pub fn classify(&self, utterance: &str, domain: Option<&str>) -> Result<DomainClassification> {
        self.classify_allowed(utterance, domain, None)
    }

    /// Like [`classify`](Self::classify), restricted to intents matching
    /// `allow_list`.
    pub fn classify_allowed(
        &self,
        utterance: &str,
        domain: Option<&str>,
        allow_list: Option<&[String]>,
    ) -> Result<DomainClassification> {
        if self.settings.use_stem_dict {
            let allow = allow_list.map(AllowList::new).transpose()?;
            if let Some(result) = self.classify_by_stem_dict(utterance, domain, allow.as_ref())? {
                return Ok(result);
            }
        }

        if let Some(domain) = domain {
            return self.classify_in_domain(utterance, domain, allow_list);
        }

        if self.settings.train_by_domain {
            let domain = if self.domains.len() > 2 {
                let routed = self.classify_in(MASTER_DOMAIN, utterance, None)?;
                routed.and_then(|classifications| {
                    classifications.first().map(|top| top.intent.clone())
                })
            } else {
                self.domains
                    .keys()
                    .find(|name| name.as_str() != MASTER_DOMAIN)
                    .cloned()
            };
            return match domain {
                Some(domain) if domain != MASTER_DOMAIN => {
                    self.classify_in_domain(utterance, &domain, allow_list)
                }
                _ => Ok(DomainClassification::unknown()),
            };
        }

        self.classify_in_domain(utterance, MASTER_DOMAIN, allow_list)
    }

    fn classify_by_stem_dict(
        &self,
        utterance: &str,
        domain: Option<&str>,
        allow_list: Option<&AllowList>,
    ) -> Result<Option<DomainClassification>> {
        let key = self.generate_stem_key(utterance)?;
        let Some(entry) = self.stem_dict.get(&key) else {
            return Ok(None);
        };
        if domain.is_some_and(|domain| domain != entry.domain)
            || allow_list.is_some_and(|allow| !allow.allows(&entry.intent))
        {
            return Ok(None);
        }

        let mut classifications = vec![Classification::new(entry.intent.clone(), 1.0)];
        classifications.extend(
            self.intent_dict
                .iter()
                .filter(|(intent, _)| **intent != entry.intent)
                .filter(|(_, owner)| !self.settings.train_by_domain || **owner == entry.domain)
                .map(|(intent, _)| Classification::new(intent.clone(), 0.0)),
        );

        Ok(Some(DomainClassification {
            domain: entry.domain.clone(),
            classifications,
        }))
    }

    fn classify_in(
        &self,
        domain: &str,
        utterance: &str,
        allow_list: Option<&[String]>,
    ) -> Result<Option<Vec<Classification>>> {
        match self.domains.get(domain) {
            Some(nlu) => Ok(Some(nlu.process(utterance, allow_list)?.classifications)),
            None => Ok(None),
        }
    }

    fn classify_in_domain(
        &self,
        utterance: &str,
        domain: &str,
        allow_list: Option<&[String]>,
    ) -> Result<DomainClassification> {
        let Some(classifications) = self.classify_in(domain, utterance, allow_list)? else {
            warn!("Unknown domain {domain}");
            return Ok(DomainClassification::unknown());
        };

        let domain = if domain == MASTER_DOMAIN {
            classifications
                .first()
                .and_then(|top| self.intent_dict.get(&top.intent))
                .map(|owner| owner.as_str())
                .unwrap_or(DEFAULT_DOMAIN)
        } else {
            domain
        };

        Ok(DomainClassification {
            domain: domain.to_string(),
            classifications,
        })
    }

    pub fn export(&self) -> DomainManagerModel {
        DomainManagerModel {
            settings: self.settings.clone(),
            stem_dict: self.stem_dict.clone(),
            intent_dict: self.intent_dict.clone(),
            sentences: self.sentences.clone(),
            domains: self
                .domains
                .iter()
                .map(|(name, nlu)| (name.clone(), nlu.export()))
                .collect(),
        }
    }

    /// Replace the whole state with an exported model.
    pub fn import(&mut self, model: &DomainManagerModel) -> Result<()> {
        let mut domains = BTreeMap::new();
        for (name, nlu_model) in &model.domains {
            let mut nlu = Nlu::new(nlu_model.settings.clone(), &self.collaborators)
                .with_backend(self.backend.clone());
            nlu.import(nlu_model)?;
            domains.insert(name.clone(), nlu);
        }

        self.settings = model.settings.clone();
        self.stem_dict = model.stem_dict.clone();
        self.intent_dict = model.intent_dict.clone();
        self.sentences = model.sentences.clone();
        self.domains = domains;
        self.add_domain(MASTER_DOMAIN);
        Ok(())
    }
}
