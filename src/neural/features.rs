//! Sparse feature bags.

use serde::{Deserialize, Serialize};

/// Name of the synthetic feature that signals unknown tokens.
pub const NONE_FEATURE: &str = "nonefeature";

/// Name of the reject intent.
pub const NONE_INTENT: &str = "None";

/// An insertion-ordered mapping from feature name to weight.
///
/// Feature order matters: the classifier assigns lookup indices in the order
/// features are first seen, and the exported model lists features by index.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    entries: Vec<(String, f32)>,
}

impl FeatureVector {
    pub fn new() -> Self {
        FeatureVector {
            entries: Vec::new(),
        }
    }

    /// Build a vector where every key has weight 1.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vector = FeatureVector::new();
        for key in keys {
            vector.set(key, 1.0);
        }
        vector
    }

    /// Add `weight` to the current weight of `key`, inserting it if absent.
    pub fn add<S: Into<String>>(&mut self, key: S, weight: f32) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, value)) => *value += weight,
            None => self.entries.push((key, weight)),
        }
    }

    /// Set the weight of `key`, keeping its position if it already exists.
    pub fn set<S: Into<String>>(&mut self, key: S, weight: f32) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, value)) => *value = weight,
            None => self.entries.push((key, weight)),
        }
    }

    pub fn get(&self, key: &str) -> Option<f32> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| *value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn remove(&mut self, key: &str) -> Option<f32> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f32)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (S, f32)>>(iter: I) -> Self {
        let mut vector = FeatureVector::new();
        for (key, weight) in iter {
            vector.add(key, weight);
        }
        vector
    }
}

/// One supervised example: input features and target per intent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub input: FeatureVector,
    pub output: FeatureVector,
}

impl TrainingSample {
    /// A sample whose only target is `intent` with value 1.
    pub fn new<S: Into<String>>(input: FeatureVector, intent: S) -> Self {
        let mut output = FeatureVector::new();
        output.set(intent, 1.0);
        TrainingSample { input, output }
    }
}
