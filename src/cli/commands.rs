//! Command implementations for the Parlance CLI.

use std::time::Instant;

use log::info;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::engine::{Corpus, EngineConfig, NluEngine};
use crate::error::Result;

/// Execute a CLI command.
pub fn execute_command(args: ParlanceArgs) -> Result<()> {
    match &args.command {
        Command::Train(train_args) => train_model(train_args, &args),
        Command::Process(process_args) => process_utterance(process_args, &args),
        Command::Entities(entities_args) => find_entities(entities_args, &args),
    }
}

/// Train a model from corpus files and save it.
fn train_model(args: &TrainArgs, cli_args: &ParlanceArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            EngineConfig::from_file(path)?
        }
        None => EngineConfig::default(),
    };

    let mut engine = NluEngine::new(config);
    for path in &args.corpus {
        info!("Loading corpus from {}", path.display());
        let corpus = Corpus::from_file(path)?;
        engine.add_corpus(&corpus)?;
    }

    let start = Instant::now();
    let domains = engine.train()?;
    let duration_ms = start.elapsed().as_millis() as u64;

    engine.save(&args.model)?;

    output_result(
        "Model trained successfully",
        &TrainingSummary {
            model: args.model.to_string_lossy().to_string(),
            sentences: engine.domains().sentences().len(),
            entities: engine.ner().len(),
            domains,
            duration_ms,
        },
        cli_args,
    )
}

/// Classify one utterance.
fn process_utterance(args: &ProcessArgs, cli_args: &ParlanceArgs) -> Result<()> {
    let engine = NluEngine::load(&args.model)?;
    let result = engine.process(
        &args.utterance,
        args.locale.as_deref(),
        args.domain.as_deref(),
    )?;
    output_result("Utterance processed", &result, cli_args)
}

/// List the entities of one utterance.
fn find_entities(args: &EntitiesArgs, cli_args: &ParlanceArgs) -> Result<()> {
    let engine = NluEngine::load(&args.model)?;
    let entities = engine.find_entities(&args.utterance, args.locale.as_deref());
    output_result(
        "Entities extracted",
        &EntitiesResult {
            utterance: args.utterance.clone(),
            entities,
        },
        cli_args,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    const CORPUS: &str = r#"{
        "name": "Food",
        "locale": "en-US",
        "data": [
            { "intent": "order.check", "domain": "food", "utterances": ["check my cart"] },
            { "intent": "order.status", "domain": "food", "utterances": ["where is my order"] }
        ],
        "entities": { "number": { "regex": "/\\d+/" } }
    }"#;

    #[test]
    fn test_train_then_process() {
        let dir = TempDir::new().unwrap();
        let corpus = dir.path().join("corpus.json");
        let config = dir.path().join("config.json");
        let model = dir.path().join("model.json");
        std::fs::write(&corpus, CORPUS).unwrap();
        std::fs::write(&config, r#"{ "backend": "in_process" }"#).unwrap();

        let train = ParlanceArgs::try_parse_from([
            "parlance",
            "--quiet",
            "--format",
            "json",
            "train",
            "--corpus",
            corpus.to_str().unwrap(),
            "--model",
            model.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
        ])
        .unwrap();
        execute_command(train).unwrap();
        assert!(model.exists());

        let engine = NluEngine::load(&model).unwrap();
        let result = engine.process("check my cart", None, None).unwrap();
        assert_eq!(result.intent, "order.check");

        let process = ParlanceArgs::try_parse_from([
            "parlance",
            "process",
            "--model",
            model.to_str().unwrap(),
            "where is my order",
        ])
        .unwrap();
        execute_command(process).unwrap();

        let entities = ParlanceArgs::try_parse_from([
            "parlance",
            "entities",
            "--model",
            model.to_str().unwrap(),
            "order 66",
        ])
        .unwrap();
        execute_command(entities).unwrap();
    }

    #[test]
    fn test_missing_model_fails() {
        let dir = TempDir::new().unwrap();
        let args = ParlanceArgs::try_parse_from([
            "parlance",
            "process",
            "--model",
            dir.path().join("missing.json").to_str().unwrap(),
            "hello",
        ])
        .unwrap();
        assert!(execute_command(args).is_err());
    }
}
