//! Single-layer perceptron classifier.
//!
//! One linear unit per intent, fully connected to every feature. The
//! activation is a leaky rectifier clipped at zero:
//!
//! ```text
//! sum    = bias + Σ weight[f] * value[f]
//! output = if sum < 0 { 0 } else { alpha * sum }
//! ```
//!
//! Training is plain gradient descent with momentum and a learning rate
//! that decays with the iteration count. It stops when the iteration cap is
//! reached, when the mean error drops below `error_thresh`, or when the
//! error stops moving by more than `delta_error_thresh`.
//!
//! # Examples
//!
//! ```
//! use parlance::neural::{FeatureVector, NetworkSettings, NeuralNetwork, TrainingSample};
//!
//! let corpus = vec![
//!     TrainingSample::new(FeatureVector::from_keys(["hello", "there"]), "greet"),
//!     TrainingSample::new(FeatureVector::from_keys(["bye", "now"]), "farewell"),
//! ];
//!
//! let mut network = NeuralNetwork::new(NetworkSettings::default());
//! let status = network.train(&corpus);
//! assert!(status.iterations > 0);
//!
//! let scores = network.run(&FeatureVector::from_keys(["hello"])).unwrap();
//! assert_eq!(scores[0].intent, "greet");
//! ```

use std::time::Instant;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::classification::Classification;
use crate::error::{NluError, Result};
use crate::neural::features::{FeatureVector, NONE_FEATURE, TrainingSample};
use crate::neural::lookup::Lookup;

/// Target given to every real intent on the synthetic None sample.
const NONE_SOFT_TARGET: f32 = 0.000_000_1;

/// Above this many intents the stop thresholds are scaled down.
const THRESHOLD_SCALE_INTENTS: usize = 50;

/// Hyper-parameters of the perceptron network.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Maximum number of passes over the corpus.
    pub iterations: usize,
    /// Stop when the mean error drops to this value.
    pub error_thresh: f64,
    /// Stop when the error changes by less than this between passes.
    pub delta_error_thresh: f64,
    pub learning_rate: f64,
    pub momentum: f64,
    /// Slope of the activation for positive sums.
    pub alpha: f64,
    /// Keep the thresholds as configured even for large intent sets.
    pub fixed_error: bool,
    /// Log every epoch at debug level.
    pub log: bool,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        NetworkSettings {
            iterations: 20000,
            error_thresh: 0.00005,
            delta_error_thresh: 0.000001,
            learning_rate: 0.6,
            momentum: 0.5,
            alpha: 0.07,
            fixed_error: false,
            log: false,
        }
    }
}

impl NetworkSettings {
    /// The fields that differ from the defaults, as a JSON object.
    pub fn non_default(&self) -> Map<String, Value> {
        let (Ok(Value::Object(current)), Ok(Value::Object(defaults))) = (
            serde_json::to_value(self),
            serde_json::to_value(NetworkSettings::default()),
        ) else {
            return Map::new();
        };

        current
            .into_iter()
            .filter(|(key, value)| defaults.get(key) != Some(value))
            .collect()
    }

    /// Defaults overlaid with the given fields.
    pub fn from_overrides(overrides: &Map<String, Value>) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(overrides.clone()))?)
    }

    /// Error and delta thresholds for a network with `num_intents` outputs.
    fn thresholds(&self, num_intents: usize) -> (f64, f64) {
        if !self.fixed_error && num_intents > THRESHOLD_SCALE_INTENTS {
            let scale = THRESHOLD_SCALE_INTENTS as f64 / num_intents as f64;
            (self.error_thresh * scale, self.delta_error_thresh * scale)
        } else {
            (self.error_thresh, self.delta_error_thresh)
        }
    }
}

/// Outcome of a training run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingStatus {
    /// Mean squared error of the last pass.
    pub error: f64,
    /// Absolute change of the error in the last pass.
    pub delta_error: f64,
    /// Number of passes performed.
    pub iterations: usize,
}

/// Contribution of each input feature to one intent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Weight per input feature. Features outside the vocabulary weigh 0.
    pub weights: FeatureVector,
    pub bias: f64,
}

/// Serialized form of a trained network.
///
/// Each perceptron row is the weight of every feature, in feature index
/// order, followed by the bias. Import is positional, so the order of
/// `features`, `intents` and every row must be preserved.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkModel {
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub intents: Vec<String>,
    #[serde(default)]
    pub perceptrons: Vec<Vec<f64>>,
    /// Only the settings that differ from the defaults.
    #[serde(default)]
    pub settings: Map<String, Value>,
}

#[derive(Clone, Debug)]
struct Perceptron {
    weights: Vec<f32>,
    changes: Vec<f32>,
    bias: f64,
}

impl Perceptron {
    fn new(num_inputs: usize) -> Self {
        Perceptron {
            weights: vec![0.0; num_inputs],
            changes: vec![0.0; num_inputs],
            bias: 0.0,
        }
    }

    fn activate(&self, input: &[(usize, f32)], alpha: f64) -> f64 {
        let sum = input.iter().fold(self.bias, |sum, &(index, value)| {
            sum + value as f64 * self.weights[index] as f64
        });
        if sum < 0.0 { 0.0 } else { alpha * sum }
    }

    /// Apply one update and return the squared error.
    fn learn(
        &mut self,
        incoming: &[f32],
        target: f32,
        output: f64,
        rate: f64,
        settings: &NetworkSettings,
    ) -> f64 {
        let error = target as f64 - output;
        if error == 0.0 {
            return 0.0;
        }

        let slope = if output > 0.0 { 1.0 } else { settings.alpha };
        let delta = slope * error * rate;
        for (k, &value) in incoming.iter().enumerate() {
            let change = delta * value as f64 + settings.momentum * self.changes[k] as f64;
            self.changes[k] = change as f32;
            self.weights[k] = (self.weights[k] as f64 + change) as f32;
        }
        self.bias += delta;

        error * error
    }
}

struct PreparedSample {
    dense: Vec<f32>,
    sparse: Vec<(usize, f32)>,
    target: Vec<f32>,
}

/// Perceptron network mapping feature bags to intent scores.
#[derive(Clone)]
pub struct NeuralNetwork {
    settings: NetworkSettings,
    input_lookup: Lookup,
    output_lookup: Lookup,
    perceptrons: Vec<Perceptron>,
    status: TrainingStatus,
}

impl std::fmt::Debug for NeuralNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeuralNetwork")
            .field("settings", &self.settings)
            .field("features", &self.input_lookup.len())
            .field("intents", &self.output_lookup.items())
            .field("status", &self.status)
            .finish()
    }
}

impl Default for NeuralNetwork {
    fn default() -> Self {
        Self::new(NetworkSettings::default())
    }
}

impl NeuralNetwork {
    /// Create an untrained network.
    pub fn new(settings: NetworkSettings) -> Self {
        NeuralNetwork {
            settings,
            input_lookup: Lookup::new(),
            output_lookup: Lookup::new(),
            perceptrons: Vec::new(),
            status: TrainingStatus::default(),
        }
    }

    pub fn settings(&self) -> &NetworkSettings {
        &self.settings
    }

    /// Status of the last training run.
    pub fn status(&self) -> &TrainingStatus {
        &self.status
    }

    pub(crate) fn set_status(&mut self, status: TrainingStatus) {
        self.status = status;
    }

    /// True once the input and output sizes are known.
    pub fn is_runnable(&self) -> bool {
        !self.perceptrons.is_empty()
    }

    /// Feature names in index order.
    pub fn features(&self) -> &[String] {
        self.input_lookup.items()
    }

    /// Intent names in index order.
    pub fn intents(&self) -> &[String] {
        self.output_lookup.items()
    }

    fn initialize(&mut self) {
        let num_inputs = self.input_lookup.len();
        self.perceptrons = (0..self.output_lookup.len())
            .map(|_| Perceptron::new(num_inputs))
            .collect();
    }

    /// When the last sample carries the none feature, every other intent
    /// gets a tiny target on it so the None row stays a soft anchor.
    fn add_none_targets(corpus: &mut [TrainingSample]) {
        let Some((last, rest)) = corpus.split_last_mut() else {
            return;
        };
        if !last.input.contains(NONE_FEATURE) {
            return;
        }
        for sample in rest.iter() {
            for intent in sample.output.keys() {
                if !last.output.contains(intent) {
                    last.output.set(intent, NONE_SOFT_TARGET);
                }
            }
        }
    }

    fn prepare(&self, corpus: &[TrainingSample]) -> Vec<PreparedSample> {
        corpus
            .iter()
            .map(|sample| PreparedSample {
                dense: self.input_lookup.to_dense(&sample.input),
                sparse: self.input_lookup.prepare(&sample.input),
                target: self.output_lookup.to_dense(&sample.output),
            })
            .collect()
    }

    /// Train on the corpus in the calling thread.
    ///
    /// The lookup tables and weight rows are created by the first call and
    /// reused by later calls; features or intents unseen at that point are
    /// ignored. An empty corpus returns the default status.
    pub fn train(&mut self, corpus: &[TrainingSample]) -> TrainingStatus {
        if corpus.is_empty() {
            return TrainingStatus::default();
        }

        let mut corpus = corpus.to_vec();
        Self::add_none_targets(&mut corpus);

        if !self.is_runnable() {
            self.input_lookup = Lookup::inputs_of(&corpus);
            self.output_lookup = Lookup::outputs_of(&corpus);
            self.initialize();
        }

        let data = self.prepare(&corpus);
        let num_outputs = self.perceptrons.len();
        let (min_error, min_delta) = self.settings.thresholds(num_outputs);
        let settings = self.settings.clone();

        let mut status = TrainingStatus {
            error: f64::INFINITY,
            delta_error: f64::INFINITY,
            iterations: 0,
        };

        while status.iterations < settings.iterations
            && status.error > min_error
            && status.delta_error > min_delta
        {
            let started = Instant::now();
            status.iterations += 1;
            let rate = settings.learning_rate / (1.0 + 0.001 * status.iterations as f64);
            let last_error = status.error;

            status.error = 0.0;
            for sample in &data {
                let outputs: Vec<f64> = self
                    .perceptrons
                    .iter()
                    .map(|p| p.activate(&sample.sparse, settings.alpha))
                    .collect();

                let mut error = 0.0;
                for (node, perceptron) in self.perceptrons.iter_mut().enumerate() {
                    error += perceptron.learn(
                        &sample.dense,
                        sample.target[node],
                        outputs[node],
                        rate,
                        &settings,
                    );
                }
                status.error += error / num_outputs as f64;
            }
            status.error /= data.len() as f64;
            status.delta_error = (status.error - last_error).abs();

            if settings.log {
                debug!(
                    "Epoch {} loss {} time {}ms",
                    status.iterations,
                    status.error,
                    started.elapsed().as_millis()
                );
            }
        }

        self.status = status.clone();
        status
    }

    /// Score every known intent, in intent index order.
    ///
    /// Returns `None` when the network has not been trained or imported.
    pub fn run(&self, input: &FeatureVector) -> Option<Vec<Classification>> {
        if !self.is_runnable() {
            return None;
        }

        let sparse = self.input_lookup.prepare(input);
        Some(
            self.perceptrons
                .iter()
                .zip(self.output_lookup.items())
                .map(|(perceptron, intent)| {
                    let score = perceptron.activate(&sparse, self.settings.alpha);
                    Classification::new(intent.clone(), score)
                })
                .collect(),
        )
    }

    /// The weights `intent` gives to each feature of `input`.
    ///
    /// Returns `None` for an intent the network does not know.
    pub fn explain(&self, input: &FeatureVector, intent: &str) -> Option<Explanation> {
        let perceptron = self.perceptrons.get(self.output_lookup.index_of(intent)?)?;
        let weights = input
            .keys()
            .map(|key| {
                let weight = self
                    .input_lookup
                    .index_of(key)
                    .map(|index| perceptron.weights[index])
                    .unwrap_or(0.0);
                (key, weight)
            })
            .collect();

        Some(Explanation {
            weights,
            bias: perceptron.bias,
        })
    }

    /// Export the network.
    pub fn export(&self) -> NetworkModel {
        let perceptrons = self
            .perceptrons
            .iter()
            .map(|perceptron| {
                let mut row: Vec<f64> = perceptron.weights.iter().map(|&w| w as f64).collect();
                row.push(perceptron.bias);
                row
            })
            .collect();

        NetworkModel {
            features: self.input_lookup.items().to_vec(),
            intents: self.output_lookup.items().to_vec(),
            perceptrons,
            settings: self.settings.non_default(),
        }
    }

    /// Replace this network with an exported one.
    pub fn import(&mut self, model: &NetworkModel) -> Result<()> {
        if model.perceptrons.len() != model.intents.len() {
            return Err(NluError::model(format!(
                "Expected {} perceptrons, found {}",
                model.intents.len(),
                model.perceptrons.len()
            )));
        }
        if let Some(row) = model
            .perceptrons
            .iter()
            .find(|row| row.len() != model.features.len() + 1)
        {
            return Err(NluError::model(format!(
                "Perceptron row has {} values, expected {}",
                row.len(),
                model.features.len() + 1
            )));
        }

        self.settings = NetworkSettings::from_overrides(&model.settings)?;
        self.input_lookup = Lookup::from_items(model.features.iter().cloned());
        self.output_lookup = Lookup::from_items(model.intents.iter().cloned());
        self.perceptrons = model
            .perceptrons
            .iter()
            .map(|row| {
                let (bias, weights) = match row.split_last() {
                    Some((bias, weights)) => (*bias, weights),
                    None => (0.0, &row[..]),
                };
                let weights: Vec<f32> = weights.iter().map(|&w| w as f32).collect();
                Perceptron {
                    changes: vec![0.0; weights.len()],
                    weights,
                    bias,
                }
            })
            .collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_corpus() -> Vec<TrainingSample> {
        vec![
            TrainingSample::new(FeatureVector::from_keys(["hello", "there"]), "greet"),
            TrainingSample::new(FeatureVector::from_keys(["hi"]), "greet"),
            TrainingSample::new(FeatureVector::from_keys(["good", "morning"]), "greet"),
            TrainingSample::new(FeatureVector::from_keys(["bye", "now"]), "farewell"),
            TrainingSample::new(FeatureVector::from_keys(["see", "you", "later"]), "farewell"),
            TrainingSample::new(FeatureVector::from_keys(["good", "night"]), "farewell"),
        ]
    }

    fn with_none(mut corpus: Vec<TrainingSample>) -> Vec<TrainingSample> {
        corpus.push(TrainingSample::new(
            FeatureVector::from_keys([NONE_FEATURE]),
            "None",
        ));
        corpus
    }

    #[test]
    fn test_untrained_network() {
        let network = NeuralNetwork::default();
        assert!(!network.is_runnable());
        assert!(network.run(&FeatureVector::from_keys(["hello"])).is_none());
        assert!(network.explain(&FeatureVector::new(), "greet").is_none());
    }

    #[test]
    fn test_empty_corpus() {
        let mut network = NeuralNetwork::default();
        assert_eq!(network.train(&[]), TrainingStatus::default());
        assert!(!network.is_runnable());
    }

    #[test]
    fn test_training_classifies() {
        let mut network = NeuralNetwork::default();
        network.train(&toy_corpus());

        let scores = network.run(&FeatureVector::from_keys(["hello"])).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].intent, "greet");
        assert!(scores[0].score > scores[1].score);

        let scores = network.run(&FeatureVector::from_keys(["bye"])).unwrap();
        assert!(scores[1].score > scores[0].score);
    }

    #[test]
    fn test_outputs_never_negative() {
        let mut network = NeuralNetwork::default();
        network.train(&toy_corpus());

        let scores = network
            .run(&FeatureVector::from_keys(["good", "night", "unknown"]))
            .unwrap();
        assert!(scores.iter().all(|c| c.score >= 0.0));
    }

    #[test]
    fn test_none_sample_gets_soft_targets() {
        let mut corpus = with_none(toy_corpus());
        NeuralNetwork::add_none_targets(&mut corpus);

        let last = corpus.last().unwrap();
        assert_eq!(last.output.get("None"), Some(1.0));
        assert_eq!(last.output.get("greet"), Some(NONE_SOFT_TARGET));
        assert_eq!(last.output.get("farewell"), Some(NONE_SOFT_TARGET));
    }

    #[test]
    fn test_thresholds_scale_above_fifty_intents() {
        let settings = NetworkSettings::default();
        assert_eq!(settings.thresholds(10), (0.00005, 0.000001));

        let (error, delta) = settings.thresholds(100);
        assert!((error - 0.000025).abs() < 1e-12);
        assert!((delta - 0.0000005).abs() < 1e-12);

        let fixed = NetworkSettings {
            fixed_error: true,
            ..Default::default()
        };
        assert_eq!(fixed.thresholds(100), (0.00005, 0.000001));
    }

    #[test]
    fn test_explain() {
        let mut network = NeuralNetwork::default();
        network.train(&toy_corpus());

        let input = FeatureVector::from_keys(["hello", "zebra"]);
        let explanation = network.explain(&input, "greet").unwrap();
        assert!(explanation.weights.get("hello").unwrap() > 0.0);
        assert_eq!(explanation.weights.get("zebra"), Some(0.0));
        assert!(network.explain(&input, "unknown").is_none());
    }

    #[test]
    fn test_export_layout() {
        let settings = NetworkSettings {
            iterations: 50,
            ..Default::default()
        };
        let mut network = NeuralNetwork::new(settings);
        network.train(&toy_corpus());

        let model = network.export();
        assert_eq!(model.features[0], "hello");
        assert_eq!(model.intents, vec!["greet".to_string(), "farewell".to_string()]);
        assert_eq!(model.perceptrons.len(), 2);
        assert_eq!(model.perceptrons[0].len(), model.features.len() + 1);
        assert_eq!(model.settings.len(), 1);
        assert_eq!(model.settings.get("iterations"), Some(&Value::from(50)));
    }

    #[test]
    fn test_import_round_trip() {
        let mut network = NeuralNetwork::default();
        network.train(&with_none(toy_corpus()));
        let model = network.export();

        let mut imported = NeuralNetwork::default();
        imported.import(&model).unwrap();
        assert_eq!(imported.export(), model);

        let input = FeatureVector::from_keys(["good", "morning"]);
        assert_eq!(network.run(&input), imported.run(&input));
    }

    #[test]
    fn test_import_rejects_bad_rows() {
        let model = NetworkModel {
            features: vec!["a".to_string(), "b".to_string()],
            intents: vec!["x".to_string()],
            perceptrons: vec![vec![0.1, 0.2]],
            settings: Map::new(),
        };
        assert!(NeuralNetwork::default().import(&model).is_err());
    }
}
