use std::sync::Arc;

use parlance::analysis::pipeline::Collaborators;
use parlance::classification::{Classification, normalize_classifications};
use parlance::error::Result;
use parlance::neural::{
    FeatureVector, InProcess, NetworkSettings, NeuralNetwork, TrainingSample, WorkerThread,
};
use parlance::nlu::{CorpusItem, Nlu, NluModel, NluSettings};

fn toy_corpus() -> Vec<TrainingSample> {
    vec![
        TrainingSample::new(FeatureVector::from_keys(["hello", "there"]), "greet"),
        TrainingSample::new(FeatureVector::from_keys(["hi"]), "greet"),
        TrainingSample::new(FeatureVector::from_keys(["bye", "now"]), "farewell"),
        TrainingSample::new(FeatureVector::from_keys(["see", "you", "later"]), "farewell"),
    ]
}

fn order_corpus() -> Vec<CorpusItem> {
    vec![
        CorpusItem::new("check my cart", "order.check"),
        CorpusItem::new("what is in my basket", "order.check"),
        CorpusItem::new("show me my shopping cart", "order.check"),
        CorpusItem::new("where is my order", "order.check_status"),
        CorpusItem::new("has my order shipped", "order.check_status"),
        CorpusItem::new("when will my delivery arrive", "order.check_status"),
    ]
}

fn trained_nlu() -> Result<Nlu> {
    let mut nlu = Nlu::new(NluSettings::default(), &Collaborators::english())
        .with_backend(Arc::new(InProcess));
    nlu.train(&order_corpus())?;
    Ok(nlu)
}

#[test]
fn test_training_is_deterministic() -> Result<()> {
    let first = trained_nlu()?.export();
    let second = trained_nlu()?.export();
    assert_eq!(
        serde_json::to_string(&first)?,
        serde_json::to_string(&second)?
    );
    Ok(())
}

#[test]
fn test_worker_thread_matches_in_process() -> Result<()> {
    let in_process = trained_nlu()?.export();

    let mut worker = Nlu::new(NluSettings::default(), &Collaborators::english())
        .with_backend(Arc::new(WorkerThread));
    worker.train(&order_corpus())?;

    assert_eq!(
        serde_json::to_string(&in_process)?,
        serde_json::to_string(&worker.export())?
    );
    Ok(())
}

#[test]
fn test_export_import_round_trip() -> Result<()> {
    let nlu = trained_nlu()?;
    let json = serde_json::to_string(&nlu.export())?;

    let model: NluModel = serde_json::from_str(&json)?;
    let mut restored = Nlu::new(NluSettings::default(), &Collaborators::english());
    restored.import(&model)?;

    for utterance in [
        "check my cart",
        "is my order shipped",
        "what is in my shopping basket",
        "completely unrelated words",
        "",
    ] {
        assert_eq!(
            restored.process(utterance, None)?,
            nlu.process(utterance, None)?,
            "{utterance}"
        );
    }
    Ok(())
}

#[test]
fn test_convergence_stops_on_a_condition() {
    let settings = NetworkSettings::default();
    let mut network = NeuralNetwork::new(settings.clone());
    let status = network.train(&toy_corpus());

    assert!(status.iterations > 0);
    assert!(
        status.error <= settings.error_thresh
            || status.delta_error <= settings.delta_error_thresh
            || status.iterations == settings.iterations
    );
}

#[test]
fn test_error_non_increasing_across_checkpoints() {
    let mut last_error = f64::INFINITY;
    for cap in [10, 100, 1000] {
        let mut network = NeuralNetwork::new(NetworkSettings {
            iterations: cap,
            ..Default::default()
        });
        let status = network.train(&toy_corpus());
        assert!(status.iterations <= cap);
        assert!(
            status.error <= last_error,
            "error {} after {} iterations exceeds {}",
            status.error,
            status.iterations,
            last_error
        );
        last_error = status.error;
    }
}

#[test]
fn test_none_feature_monotonic() -> Result<()> {
    let nlu = trained_nlu()?;
    let mut last = 0.0;
    for unknown in 0..10 {
        let value = nlu.none_feature_value(unknown);
        assert!(value >= last);
        last = value;
    }

    let mut utterance = String::from("check my cart");
    let mut last = 0.0;
    for word in ["zebra", "quartz", "fjord", "glyph"] {
        utterance.push(' ');
        utterance.push_str(word);
        let features = nlu.text_to_features(&nlu.prepare(&utterance)?);
        let value = features.get("nonefeature").unwrap_or(0.0);
        assert!(value > last, "{utterance}");
        last = value;
    }
    Ok(())
}

#[test]
fn test_scores_sum_to_one() -> Result<()> {
    let nlu = trained_nlu()?;
    for utterance in ["check my cart", "where is my delivery", "my order basket"] {
        let result = nlu.process(utterance, None)?;
        let total: f64 = result.classifications.iter().map(|c| c.score).sum();
        assert!((total - 1.0).abs() < 1e-9, "{utterance}: {total}");
    }

    let mut classifications = vec![
        Classification::new("a", 0.3),
        Classification::new("b", 0.01),
        Classification::new("c", 2.5),
    ];
    normalize_classifications(&mut classifications);
    let total: f64 = classifications.iter().map(|c| c.score).sum();
    assert!((total - 1.0).abs() < 1e-12);
    Ok(())
}
