//! Name↔index lookup tables.
//!
//! Indices are assigned once, in insertion order, and never change for the
//! life of the table. The classifier keeps one table for features and one
//! for intents.

use ahash::AHashMap;

use crate::neural::features::{FeatureVector, TrainingSample};

/// An append-only table mapping names to dense indices.
#[derive(Clone, Debug, Default)]
pub struct Lookup {
    dict: AHashMap<String, usize>,
    items: Vec<String>,
}

impl Lookup {
    pub fn new() -> Self {
        Lookup::default()
    }

    /// Build a table from names in index order.
    pub fn from_items<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lookup = Lookup::new();
        for item in items {
            lookup.add(item);
        }
        lookup
    }

    /// Build the input table from every sample's features.
    pub fn inputs_of(samples: &[TrainingSample]) -> Self {
        Self::from_items(samples.iter().flat_map(|s| s.input.keys()))
    }

    /// Build the output table from every sample's targets.
    pub fn outputs_of(samples: &[TrainingSample]) -> Self {
        Self::from_items(samples.iter().flat_map(|s| s.output.keys()))
    }

    /// Add a name, returning its index. Existing names keep their index.
    pub fn add<S: Into<String>>(&mut self, item: S) -> usize {
        let item = item.into();
        if let Some(&index) = self.dict.get(&item) {
            return index;
        }
        let index = self.items.len();
        self.dict.insert(item.clone(), index);
        self.items.push(item);
        index
    }

    pub fn index_of(&self, item: &str) -> Option<usize> {
        self.dict.get(item).copied()
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.items.get(index).map(String::as_str)
    }

    /// Names in index order.
    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Known features of `vector` as `(index, weight)` pairs, skipping zeros.
    pub fn prepare(&self, vector: &FeatureVector) -> Vec<(usize, f32)> {
        vector
            .iter()
            .filter(|(_, weight)| *weight != 0.0)
            .filter_map(|(key, weight)| self.index_of(key).map(|index| (index, weight)))
            .collect()
    }

    /// Dense representation of `vector`. Unknown names are ignored.
    pub fn to_dense(&self, vector: &FeatureVector) -> Vec<f32> {
        let mut dense = vec![0.0; self.items.len()];
        for (key, weight) in vector.iter() {
            if let Some(index) = self.index_of(key) {
                dense[index] = weight;
            }
        }
        dense
    }
}
