//! Feature pipeline around the perceptron classifier.
//!
//! An [`Nlu`] turns raw text into a weighted bag of stems, trains a
//! [`NeuralNetwork`] on a corpus of `{utterance, intent}` pairs and
//! post-processes the network output:
//!
//! 1. prepare: normalize, tokenize, remove stopwords, stem, count
//! 2. spell check (optional) against the trained vocabulary
//! 3. unknown tokens are dropped and folded into the none feature
//! 4. the network scores every intent
//! 5. intents sharing no feature with the utterance are zeroed
//! 6. zeros are dropped, scores sorted and normalized
//!
//! # Examples
//!
//! ```
//! use parlance::analysis::pipeline::Collaborators;
//! use parlance::neural::InProcess;
//! use parlance::nlu::{CorpusItem, Nlu, NluSettings};
//! use std::sync::Arc;
//!
//! let mut nlu = Nlu::new(NluSettings::default(), &Collaborators::english())
//!     .with_backend(Arc::new(InProcess));
//! nlu.train(&[
//!     CorpusItem::new("hello there", "greet"),
//!     CorpusItem::new("see you later", "farewell"),
//! ])
//! .unwrap();
//!
//! let result = nlu.process("hello", None).unwrap();
//! assert_eq!(result.classifications[0].intent, "greet");
//! ```

pub mod allow_list;
pub mod cache;
pub mod spell_check;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::analysis::pipeline::{Collaborators, Pipeline};
use crate::classification::{Classification, normalize_classifications, sort_classifications};
use crate::error::Result;
use crate::neural::{
    FeatureVector, NONE_FEATURE, NONE_INTENT, NetworkModel, NetworkSettings, NeuralNetwork,
    TrainerBackend, TrainingSample, TrainingStatus, WorkerThread,
};
use crate::nlu::allow_list::AllowList;
use crate::nlu::cache::{CacheStats, PrepareCache};
use crate::nlu::spell_check::SpellCheck;

/// Settings of a feature pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NluSettings {
    pub locale: String,
    /// Keep stopwords as features.
    pub keep_stopwords: bool,
    /// Train a None intent anchored on the synthetic none feature.
    pub use_none_feature: bool,
    /// Weight of the none feature on the None training sample.
    pub nonefeature_value: f32,
    /// First increment of the none feature. Defaults to intents / features.
    pub nonedelta_value: Option<f32>,
    /// Growth of the increment for every further unknown token.
    pub nonedelta_multiplier: f32,
    /// Maximum edit distance for spell checking. Zero disables it.
    pub spell_check_distance: usize,
    /// Drop zero-score intents from the result.
    pub filter_zeros: bool,
    /// Lifetime of prepared texts in the cache. Zero disables the cache.
    pub cache_ttl_secs: u64,
    /// Attach the explanation of the top intent to every result.
    pub explain: bool,
    pub network: NetworkSettings,
}

impl Default for NluSettings {
    fn default() -> Self {
        NluSettings {
            locale: "en".to_string(),
            keep_stopwords: true,
            use_none_feature: true,
            nonefeature_value: 1.0,
            nonedelta_value: None,
            nonedelta_multiplier: 1.2,
            spell_check_distance: 0,
            filter_zeros: true,
            cache_ttl_secs: 60,
            explain: false,
            network: NetworkSettings::default(),
        }
    }
}

/// One labeled training utterance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusItem {
    pub utterance: String,
    pub intent: String,
}

impl CorpusItem {
    pub fn new<U: Into<String>, I: Into<String>>(utterance: U, intent: I) -> Self {
        CorpusItem {
            utterance: utterance.into(),
            intent: intent.into(),
        }
    }
}

/// Feature weights of one intent for one utterance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentExplanation {
    pub intent: String,
    pub weights: FeatureVector,
    pub bias: f64,
}

/// Output of [`Nlu::process`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NluResult {
    /// Intents sorted by descending score.
    pub classifications: Vec<Classification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<IntentExplanation>,
}

/// Serialized form of a trained [`Nlu`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NluModel {
    #[serde(default)]
    pub settings: NluSettings,
    /// Number of training utterances containing each feature.
    #[serde(default)]
    pub features: BTreeMap<String, u32>,
    /// Features seen with each intent.
    #[serde(default)]
    pub intents: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    pub network: NetworkModel,
}

/// A trainable intent classifier for one locale.
pub struct Nlu {
    settings: NluSettings,
    pipeline: Pipeline,
    cache: PrepareCache,
    backend: Arc<dyn TrainerBackend>,
    network: NeuralNetwork,
    features: BTreeMap<String, u32>,
    intents: BTreeMap<String, BTreeSet<String>>,
    spell_check: SpellCheck,
}

impl std::fmt::Debug for Nlu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Nlu")
            .field("settings", &self.settings)
            .field("pipeline", &self.pipeline)
            .field("backend", &self.backend.name())
            .field("features", &self.features.len())
            .field("intents", &self.intents.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Nlu {
    /// Create an untrained pipeline that trains on a worker thread.
    pub fn new(settings: NluSettings, collaborators: &Collaborators) -> Self {
        Nlu {
            cache: PrepareCache::new(settings.cache_ttl_secs),
            network: NeuralNetwork::new(settings.network.clone()),
            pipeline: collaborators.pipeline(),
            backend: Arc::new(WorkerThread),
            features: BTreeMap::new(),
            intents: BTreeMap::new(),
            spell_check: SpellCheck::default(),
            settings,
        }
    }

    /// Use another training backend.
    pub fn with_backend(mut self, backend: Arc<dyn TrainerBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn settings(&self) -> &NluSettings {
        &self.settings
    }

    pub fn locale(&self) -> &str {
        &self.settings.locale
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Mutable access to the step pipeline. Cached texts are dropped since
    /// they were prepared by the old steps.
    pub fn pipeline_mut(&mut self) -> &mut Pipeline {
        self.cache.clear();
        &mut self.pipeline
    }

    pub fn network(&self) -> &NeuralNetwork {
        &self.network
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// True once the classifier has been trained or imported.
    pub fn is_trained(&self) -> bool {
        self.network.is_runnable()
    }

    /// Trained intent names, without None.
    pub fn intents(&self) -> impl Iterator<Item = &str> {
        self.intents
            .keys()
            .map(|k| k.as_str())
            .filter(|k| *k != NONE_INTENT)
    }

    /// Turn text into a bag of stems. Repeated stems accumulate weight.
    pub fn prepare(&self, text: &str) -> Result<FeatureVector> {
        if let Some(features) = self.cache.get(&self.settings.locale, text) {
            return Ok(features);
        }

        let record = self
            .pipeline
            .run(&self.settings.locale, text, self.settings.keep_stopwords)?;
        let features: FeatureVector = record
            .tokens
            .into_iter()
            .filter(|token| !token.text.is_empty())
            .map(|token| (token.text, 1.0))
            .collect();

        self.cache.insert(&self.settings.locale, text, features.clone());
        Ok(features)
    }

    /// Train a fresh classifier on the corpus.
    ///
    /// An empty corpus returns the default status and leaves the current
    /// model in place.
    pub fn train(&mut self, corpus: &[CorpusItem]) -> Result<TrainingStatus> {
        if corpus.is_empty() {
            return Ok(TrainingStatus::default());
        }

        let mut features: BTreeMap<String, u32> = BTreeMap::new();
        let mut intents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut samples = Vec::with_capacity(corpus.len() + 1);

        for item in corpus {
            let input = self.prepare(&item.utterance)?;
            let seen = intents.entry(item.intent.clone()).or_default();
            for key in input.keys() {
                *features.entry(key.to_string()).or_insert(0) += 1;
                seen.insert(key.to_string());
            }
            samples.push(TrainingSample::new(input, item.intent.clone()));
        }

        if self.settings.use_none_feature {
            let mut input = FeatureVector::new();
            input.set(NONE_FEATURE, self.settings.nonefeature_value);
            samples.push(TrainingSample::new(input, NONE_INTENT));
            intents
                .entry(NONE_INTENT.to_string())
                .or_default()
                .insert(NONE_FEATURE.to_string());
        }

        info!(
            "Training {} utterances, {} features, {} intents with {}",
            corpus.len(),
            features.len(),
            intents.len(),
            self.backend.name()
        );

        let mut network = NeuralNetwork::new(self.settings.network.clone());
        let status = network.train_with(self.backend.as_ref(), samples)?;

        info!(
            "Trained in {} iterations, error {}",
            status.iterations, status.error
        );

        self.network = network;
        self.spell_check = SpellCheck::new(&features);
        self.features = features;
        self.intents = intents;
        Ok(status)
    }

    fn num_intents(&self) -> usize {
        self.intents().count()
    }

    /// Weight of the none feature for `unknown` out-of-vocabulary tokens.
    ///
    /// The first unknown token adds `nonedelta_value` (or intents / features
    /// when unset) and every further token adds the previous increment
    /// times `nonedelta_multiplier`.
    pub fn none_feature_value(&self, unknown: usize) -> f32 {
        let mut delta = self.settings.nonedelta_value.unwrap_or_else(|| {
            self.num_intents() as f32 / self.features.len().max(1) as f32
        });
        let mut value = 0.0;
        for _ in 0..unknown {
            value += delta;
            delta *= self.settings.nonedelta_multiplier;
        }
        value
    }

    /// Keep only trained features and add the none feature for the rest.
    pub fn text_to_features(&self, prepared: &FeatureVector) -> FeatureVector {
        let mut features = FeatureVector::new();
        let mut unknown = 0;
        for (key, weight) in prepared.iter() {
            if self.features.contains_key(key) {
                features.add(key, weight);
            } else if key != NONE_FEATURE {
                unknown += 1;
            }
        }

        if self.settings.use_none_feature && unknown > 0 {
            features.set(NONE_FEATURE, self.none_feature_value(unknown));
        }
        features
    }

    fn spell_checked(&self, prepared: FeatureVector) -> FeatureVector {
        if self.settings.spell_check_distance == 0 {
            return prepared;
        }
        prepared
            .iter()
            .map(|(key, weight)| {
                let corrected = self
                    .spell_check
                    .check_token(key, self.settings.spell_check_distance);
                (corrected, weight)
            })
            .collect()
    }

    /// Prepare, spell check and vectorize an utterance.
    pub fn features_of(&self, utterance: &str) -> Result<FeatureVector> {
        let prepared = self.spell_checked(self.prepare(utterance)?);
        Ok(self.text_to_features(&prepared))
    }

    /// Intents that share at least one trained feature with `features`.
    fn activated(&self, features: &FeatureVector) -> BTreeSet<&str> {
        self.intents
            .iter()
            .filter(|(_, seen)| features.keys().any(|key| seen.contains(key)))
            .map(|(intent, _)| intent.as_str())
            .collect()
    }

    /// Zero every intent that is not activated or not allowed. None is
    /// never filtered.
    fn filter_non_activated(
        &self,
        features: &FeatureVector,
        classifications: &mut [Classification],
        allow_list: Option<&AllowList>,
    ) {
        let activated = self.activated(features);
        for classification in classifications.iter_mut() {
            if classification.intent == NONE_INTENT {
                continue;
            }
            let allowed = activated.contains(classification.intent.as_str())
                && allow_list.is_none_or(|allow| allow.allows(&classification.intent));
            if !allowed {
                classification.score = 0.0;
            }
        }
    }

    /// Classify an utterance.
    ///
    /// `allow_list` restricts the returned intents to those matching one of
    /// its wildcard patterns. An untrained pipeline answers None with
    /// score 1.
    pub fn process(&self, utterance: &str, allow_list: Option<&[String]>) -> Result<NluResult> {
        let allow_list = allow_list.map(AllowList::new).transpose()?;
        let features = self.features_of(utterance)?;

        let Some(mut classifications) = self.network.run(&features) else {
            return Ok(NluResult {
                classifications: vec![Classification::new(NONE_INTENT, 1.0)],
                explanation: None,
            });
        };

        self.filter_non_activated(&features, &mut classifications, allow_list.as_ref());
        if self.settings.filter_zeros {
            classifications.retain(|c| c.score > 0.0);
        }
        sort_classifications(&mut classifications);
        normalize_classifications(&mut classifications);

        let explanation = match classifications.first() {
            Some(top) if self.settings.explain => self.explain_features(&features, &top.intent),
            _ => None,
        };

        Ok(NluResult {
            classifications,
            explanation,
        })
    }

    fn explain_features(&self, features: &FeatureVector, intent: &str) -> Option<IntentExplanation> {
        self.network
            .explain(features, intent)
            .map(|explanation| IntentExplanation {
                intent: intent.to_string(),
                weights: explanation.weights,
                bias: explanation.bias,
            })
    }

    /// The weights `intent` gives to the features of `utterance`.
    pub fn explain(&self, utterance: &str, intent: &str) -> Result<Option<IntentExplanation>> {
        let features = self.features_of(utterance)?;
        Ok(self.explain_features(&features, intent))
    }

    pub fn export(&self) -> NluModel {
        NluModel {
            settings: self.settings.clone(),
            features: self.features.clone(),
            intents: self.intents.clone(),
            network: self.network.export(),
        }
    }

    /// Replace settings, vocabulary and classifier with an exported model.
    pub fn import(&mut self, model: &NluModel) -> Result<()> {
        let mut network = NeuralNetwork::new(model.settings.network.clone());
        if !model.network.perceptrons.is_empty() {
            network.import(&model.network)?;
        }

        self.cache = PrepareCache::new(model.settings.cache_ttl_secs);
        self.settings = model.settings.clone();
        self.network = network;
        self.spell_check = SpellCheck::new(&model.features);
        self.features = model.features.clone();
        self.intents = model.intents.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neural::InProcess;

    fn corpus() -> Vec<CorpusItem> {
        vec![
            CorpusItem::new("check my cart", "order.check"),
            CorpusItem::new("what is in my basket", "order.check"),
            CorpusItem::new("show me my shopping cart", "order.check"),
            CorpusItem::new("where is my order", "order.check_status"),
            CorpusItem::new("has my order shipped", "order.check_status"),
            CorpusItem::new("when will my delivery arrive", "order.check_status"),
        ]
    }

    fn trained(settings: NluSettings) -> Nlu {
        let mut nlu =
            Nlu::new(settings, &Collaborators::english()).with_backend(Arc::new(InProcess));
        nlu.train(&corpus()).unwrap();
        nlu
    }

    #[test]
    fn test_prepare_counts_repeated_stems() {
        let nlu = Nlu::new(NluSettings::default(), &Collaborators::english());
        let features = nlu.prepare("Orders, orders and more ORDERS").unwrap();
        assert_eq!(features.get("order"), Some(3.0));
        assert_eq!(features.get("more"), Some(1.0));
    }

    #[test]
    fn test_prepare_uses_cache() {
        let nlu = Nlu::new(NluSettings::default(), &Collaborators::english());
        nlu.prepare("check my cart").unwrap();
        nlu.prepare("check my cart").unwrap();
        assert_eq!(nlu.cache_stats().hits, 1);
    }

    #[test]
    fn test_untrained_answers_none() {
        let nlu = Nlu::new(NluSettings::default(), &Collaborators::english());
        let result = nlu.process("anything", None).unwrap();
        assert_eq!(result.classifications, vec![Classification::new("None", 1.0)]);
    }

    #[test]
    fn test_empty_corpus() {
        let mut nlu = Nlu::new(NluSettings::default(), &Collaborators::english())
            .with_backend(Arc::new(InProcess));
        assert_eq!(nlu.train(&[]).unwrap(), TrainingStatus::default());
        assert!(!nlu.is_trained());
    }

    #[test]
    fn test_process_classifies_and_normalizes() {
        let nlu = trained(NluSettings::default());
        let result = nlu.process("is my order shipped", None).unwrap();

        assert_eq!(result.classifications[0].intent, "order.check_status");
        let total: f64 = result.classifications.iter().map(|c| c.score).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(result.explanation.is_none());
    }

    #[test]
    fn test_non_activated_intents_are_dropped() {
        let nlu = trained(NluSettings::default());
        let result = nlu.process("shipped delivery", None).unwrap();
        assert!(
            result
                .classifications
                .iter()
                .all(|c| c.intent != "order.check")
        );
    }

    #[test]
    fn test_unknown_words_go_to_none() {
        let nlu = trained(NluSettings::default());
        let result = nlu.process("zebras juggle violins", None).unwrap();
        assert_eq!(result.classifications[0].intent, "None");
    }

    #[test]
    fn test_none_feature_grows_geometrically() {
        let settings = NluSettings {
            nonedelta_value: Some(0.5),
            nonedelta_multiplier: 2.0,
            ..Default::default()
        };
        let nlu = Nlu::new(settings, &Collaborators::english());
        assert_eq!(nlu.none_feature_value(0), 0.0);
        assert_eq!(nlu.none_feature_value(1), 0.5);
        assert_eq!(nlu.none_feature_value(3), 3.5);
    }

    #[test]
    fn test_text_to_features_drops_unknown() {
        let nlu = trained(NluSettings::default());
        let features = nlu.text_to_features(&FeatureVector::from_keys(["cart", "zebra"]));
        assert_eq!(features.get("cart"), Some(1.0));
        assert!(!features.contains("zebra"));
        assert!(features.get(NONE_FEATURE).unwrap() > 0.0);

        let nlu = trained(NluSettings {
            use_none_feature: false,
            ..Default::default()
        });
        let features = nlu.text_to_features(&FeatureVector::from_keys(["cart", "zebra"]));
        assert!(!features.contains(NONE_FEATURE));
    }

    #[test]
    fn test_allow_list_restricts_intents() {
        let nlu = trained(NluSettings::default());
        let allow = vec!["order.check_*".to_string()];
        let result = nlu.process("check my order", Some(&allow)).unwrap();
        assert!(
            result
                .classifications
                .iter()
                .all(|c| c.intent != "order.check")
        );
    }

    #[test]
    fn test_spell_check_recovers_typos() {
        let nlu = trained(NluSettings {
            spell_check_distance: 1,
            ..Default::default()
        });
        let features = nlu.features_of("where is my ordr").unwrap();
        assert!(features.contains("order"));
    }

    #[test]
    fn test_explanation_attached() {
        let nlu = trained(NluSettings {
            explain: true,
            ..Default::default()
        });
        let result = nlu.process("check my cart", None).unwrap();
        let explanation = result.explanation.unwrap();
        assert_eq!(explanation.intent, result.classifications[0].intent);
        assert!(explanation.weights.contains("cart"));
    }

    #[test]
    fn test_export_import() {
        let nlu = trained(NluSettings::default());
        let model = nlu.export();
        assert!(model.intents["None"].contains("nonefeature"));
        let network_intents: BTreeSet<&String> = model.network.intents.iter().collect();
        assert_eq!(model.intents.keys().collect::<BTreeSet<_>>(), network_intents);
        assert_eq!(nlu.intents().collect::<Vec<_>>(), vec!["order.check", "order.check_status"]);

        let mut imported = Nlu::new(NluSettings::default(), &Collaborators::english());
        imported.import(&model).unwrap();
        assert_eq!(imported.export(), model);
        assert_eq!(
            imported.process("where is my order", None).unwrap(),
            nlu.process("where is my order", None).unwrap()
        );
    }
}
