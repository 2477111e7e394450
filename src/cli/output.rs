//! Output formatting for CLI commands.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cli::args::{OutputFormat, ParlanceArgs};
use crate::engine::ProcessResult;
use crate::error::Result;
use crate::ner::EntityMatch;
use crate::neural::TrainingStatus;

/// Result structure for training.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub model: String,
    pub sentences: usize,
    pub entities: usize,
    pub domains: BTreeMap<String, TrainingStatus>,
    pub duration_ms: u64,
}

/// Result structure for entity extraction.
#[derive(Debug, Serialize, Deserialize)]
pub struct EntitiesResult {
    pub utterance: String,
    pub entities: Vec<EntityMatch>,
}

/// Something the CLI can print for humans.
pub trait HumanOutput {
    fn print_human(&self);
}

impl HumanOutput for TrainingSummary {
    fn print_human(&self) {
        println!("Training Summary:");
        println!("═════════════════");
        println!("Model: {}", self.model);
        println!("Sentences: {}", self.sentences);
        println!("Entities: {}", self.entities);
        println!("Training time: {}ms", self.duration_ms);
        println!();
        println!("Domains:");
        println!("────────");
        for (name, status) in &self.domains {
            println!(
                "{name}: {} iterations, error {:.6}",
                status.iterations, status.error
            );
        }
    }
}

impl HumanOutput for ProcessResult {
    fn print_human(&self) {
        println!("Utterance: {}", self.utterance);
        if let Some(optional) = &self.optional_utterance {
            println!("Classified as: {optional}");
        }
        println!("Domain: {}", self.domain);
        println!("Intent: {} ({:.4})", self.intent, self.score);

        if !self.classifications.is_empty() {
            println!();
            println!("Classifications:");
            println!("────────────────");
            for classification in &self.classifications {
                println!("  {:<30} {:.4}", classification.intent, classification.score);
            }
        }
        if !self.entities.is_empty() {
            println!();
            print_entities(&self.entities);
        }
    }
}

impl HumanOutput for EntitiesResult {
    fn print_human(&self) {
        if self.entities.is_empty() {
            println!("No entities found in: {}", self.utterance);
        } else {
            print_entities(&self.entities);
        }
    }
}

fn print_entities(entities: &[EntityMatch]) {
    println!("Entities:");
    println!("─────────");
    for found in entities {
        match &found.option {
            Some(option) => println!(
                "  {} [{}..{}] \"{}\" → {} ({:.2})",
                found.entity, found.start, found.end, found.utterance_text, option, found.accuracy
            ),
            None => println!(
                "  {} [{}..{}] \"{}\" ({:.2})",
                found.entity, found.start, found.end, found.utterance_text, found.accuracy
            ),
        }
    }
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize + HumanOutput>(
    message: &str,
    result: &T,
    args: &ParlanceArgs,
) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => {
            if args.verbosity() > 1 {
                println!("{message}");
                println!();
            }
            result.print_human();
            Ok(())
        }
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &ParlanceArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}
