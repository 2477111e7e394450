//! Command line argument parsing for the Parlance CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Parlance - train intent classifiers and recognize entities
#[derive(Parser, Debug, Clone)]
#[command(name = "parlance")]
#[command(about = "Natural language understanding: intents, domains and entities")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct ParlanceArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl ParlanceArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Train a model from corpus files
    Train(TrainArgs),

    /// Classify an utterance with a trained model
    Process(ProcessArgs),

    /// List the entities found in an utterance
    Entities(EntitiesArgs),
}

/// Arguments for training
#[derive(Parser, Debug, Clone)]
pub struct TrainArgs {
    /// Corpus files (JSON)
    #[arg(short, long = "corpus", value_name = "CORPUS_FILE", required = true)]
    pub corpus: Vec<PathBuf>,

    /// Where to write the trained model
    #[arg(short, long, value_name = "MODEL_FILE")]
    pub model: PathBuf,

    /// Engine configuration file (JSON)
    #[arg(long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,
}

/// Arguments for classifying an utterance
#[derive(Parser, Debug, Clone)]
pub struct ProcessArgs {
    /// Trained model file
    #[arg(short, long, value_name = "MODEL_FILE")]
    pub model: PathBuf,

    /// Utterance to classify
    #[arg(value_name = "UTTERANCE")]
    pub utterance: String,

    /// Locale of the utterance (default: the model locale)
    #[arg(short, long)]
    pub locale: Option<String>,

    /// Restrict classification to one domain
    #[arg(short, long)]
    pub domain: Option<String>,
}

/// Arguments for entity extraction
#[derive(Parser, Debug, Clone)]
pub struct EntitiesArgs {
    /// Trained model file
    #[arg(short, long, value_name = "MODEL_FILE")]
    pub model: PathBuf,

    /// Utterance to search
    #[arg(value_name = "UTTERANCE")]
    pub utterance: String,

    /// Locale of the utterance (default: the model locale)
    #[arg(short, long)]
    pub locale: Option<String>,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
