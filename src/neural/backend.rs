//! Training backends.
//!
//! Gradient descent is CPU-bound, so training can be moved off the calling
//! thread. A [`TrainerBackend`] receives the settings and a copy of the
//! corpus, trains a fresh network and hands back its exported model plus the
//! final status. The caller imports the model; no weight buffer is ever
//! shared between threads.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{NluError, Result};
use crate::neural::features::TrainingSample;
use crate::neural::network::{NetworkModel, NetworkSettings, NeuralNetwork, TrainingStatus};

/// Result of a training run performed by a backend.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainedModel {
    pub json: NetworkModel,
    pub status: TrainingStatus,
}

/// Strategy for running the training loop.
pub trait TrainerBackend: Send + Sync {
    /// Train a fresh network on `corpus`.
    fn train(
        &self,
        settings: &NetworkSettings,
        corpus: Vec<TrainingSample>,
    ) -> Result<TrainedModel>;

    /// Get the name of this backend.
    fn name(&self) -> &'static str;
}

fn train_fresh(settings: &NetworkSettings, corpus: &[TrainingSample]) -> TrainedModel {
    let mut network = NeuralNetwork::new(settings.clone());
    let status = network.train(corpus);
    TrainedModel {
        json: network.export(),
        status,
    }
}

/// Trains on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct InProcess;

impl TrainerBackend for InProcess {
    fn train(
        &self,
        settings: &NetworkSettings,
        corpus: Vec<TrainingSample>,
    ) -> Result<TrainedModel> {
        Ok(train_fresh(settings, &corpus))
    }

    fn name(&self) -> &'static str {
        "in_process"
    }
}

/// Trains on one dedicated thread per call.
///
/// The caller blocks until the worker delivers its result. A worker that
/// panics, or exits without sending, is reported as a training error.
#[derive(Clone, Copy, Debug, Default)]
pub struct WorkerThread;

impl TrainerBackend for WorkerThread {
    fn train(
        &self,
        settings: &NetworkSettings,
        corpus: Vec<TrainingSample>,
    ) -> Result<TrainedModel> {
        let (sender, receiver) = bounded(1);
        let settings = settings.clone();
        let samples = corpus.len();

        let handle = thread::Builder::new()
            .name("parlance-trainer".to_string())
            .spawn(move || {
                let trained = train_fresh(&settings, &corpus);
                // The receiver outlives the worker, so a failed send only
                // happens if the caller is gone.
                let _ = sender.send(trained);
            })?;

        info!("Training {samples} samples on a worker thread");
        let received = receiver.recv();

        match handle.join() {
            Err(_) => Err(NluError::training("Training worker panicked")),
            Ok(()) => {
                received.map_err(|_| NluError::training("Training worker exited without a result"))
            }
        }
    }

    fn name(&self) -> &'static str {
        "worker_thread"
    }
}

/// Which backend a configuration selects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    InProcess,
    #[default]
    WorkerThread,
}

impl BackendKind {
    pub fn backend(&self) -> Arc<dyn TrainerBackend> {
        match self {
            BackendKind::InProcess => Arc::new(InProcess),
            BackendKind::WorkerThread => Arc::new(WorkerThread),
        }
    }
}

impl NeuralNetwork {
    /// Train through `backend` and import the resulting model.
    ///
    /// An empty corpus leaves the network untouched and returns the default
    /// status.
    pub fn train_with(
        &mut self,
        backend: &dyn TrainerBackend,
        corpus: Vec<TrainingSample>,
    ) -> Result<TrainingStatus> {
        if corpus.is_empty() {
            return Ok(TrainingStatus::default());
        }
        let trained = backend.train(self.settings(), corpus)?;
        self.import(&trained.json)?;
        self.set_status(trained.status.clone());
        Ok(trained.status)
    }
}
