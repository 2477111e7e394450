//! Perceptron intent classifier.
//!
//! [`NeuralNetwork`] holds one weight row per intent over a shared feature
//! vocabulary. Training can run in place or through a [`TrainerBackend`],
//! which by default moves the loop onto a worker thread.

pub mod backend;
pub mod features;
pub mod lookup;
pub mod network;

pub use backend::{BackendKind, InProcess, TrainedModel, TrainerBackend, WorkerThread};
pub use features::{FeatureVector, NONE_FEATURE, NONE_INTENT, TrainingSample};
pub use lookup::Lookup;
pub use network::{Explanation, NetworkModel, NetworkSettings, NeuralNetwork, TrainingStatus};
