//! Sentence log and per-domain corpus generation.

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::domain::MASTER_DOMAIN;
use crate::nlu::CorpusItem;

/// One labeled utterance filed under a domain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub domain: String,
    pub utterance: String,
    pub intent: String,
}

impl TrainingExample {
    pub fn new<D, U, I>(domain: D, utterance: U, intent: I) -> Self
    where
        D: Into<String>,
        U: Into<String>,
        I: Into<String>,
    {
        TrainingExample {
            domain: domain.into(),
            utterance: utterance.into(),
            intent: intent.into(),
        }
    }
}

/// Append-only list of training examples, in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SentenceLog {
    sentences: Vec<TrainingExample>,
}

impl SentenceLog {
    pub fn new() -> Self {
        SentenceLog::default()
    }

    pub fn add(&mut self, example: TrainingExample) {
        self.sentences.push(example);
    }

    /// Remove the first example equal to `example`. Returns false when
    /// there is none.
    pub fn remove(&mut self, example: &TrainingExample) -> bool {
        match self.sentences.iter().position(|s| s == example) {
            Some(index) => {
                self.sentences.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrainingExample> {
        self.sentences.iter()
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// Build one corpus per domain.
    ///
    /// Without `train_by_domain` every sentence goes to the master domain.
    /// With it, the master domain learns to route utterances to their domain
    /// name and each domain learns its own intents. Sentences filed under
    /// the master domain have no classifier of their own in that mode and
    /// are skipped.
    pub fn generate_corpus(&self, train_by_domain: bool) -> BTreeMap<String, Vec<CorpusItem>> {
        let mut corpus: BTreeMap<String, Vec<CorpusItem>> = BTreeMap::new();

        for sentence in &self.sentences {
            if !train_by_domain {
                corpus
                    .entry(MASTER_DOMAIN.to_string())
                    .or_default()
                    .push(CorpusItem::new(&sentence.utterance, &sentence.intent));
                continue;
            }

            if sentence.domain == MASTER_DOMAIN {
                warn!(
                    "Skipping \"{}\": no domain given while training by domain",
                    sentence.utterance
                );
                continue;
            }
            corpus
                .entry(MASTER_DOMAIN.to_string())
                .or_default()
                .push(CorpusItem::new(&sentence.utterance, &sentence.domain));
            corpus
                .entry(sentence.domain.clone())
                .or_default()
                .push(CorpusItem::new(&sentence.utterance, &sentence.intent));
        }

        corpus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log() -> SentenceLog {
        let mut log = SentenceLog::new();
        log.add(TrainingExample::new("food", "check my cart", "order.check"));
        log.add(TrainingExample::new("food", "where is my order", "order.check_status"));
        log.add(TrainingExample::new("personality", "how old are you", "agent.age"));
        log
    }

    #[test]
    fn test_remove_first_match_only() {
        let mut log = log();
        let example = TrainingExample::new("food", "check my cart", "order.check");
        log.add(example.clone());

        assert!(log.remove(&example));
        assert_eq!(log.len(), 3);
        assert_eq!(log.iter().last(), Some(&example));
        assert!(!log.remove(&TrainingExample::new("food", "check my cart", "other")));
    }

    #[test]
    fn test_single_corpus() {
        let corpus = log().generate_corpus(false);
        assert_eq!(corpus.len(), 1);
        let master = &corpus[MASTER_DOMAIN];
        assert_eq!(master.len(), 3);
        assert_eq!(master[0].intent, "order.check");
    }

    #[test]
    fn test_corpus_by_domain() {
        let mut log = log();
        log.add(TrainingExample::new(MASTER_DOMAIN, "hello", "greet"));
        let corpus = log.generate_corpus(true);

        assert_eq!(corpus[MASTER_DOMAIN].len(), 3);
        assert_eq!(corpus[MASTER_DOMAIN][0].intent, "food");
        assert_eq!(corpus[MASTER_DOMAIN][2].intent, "personality");
        assert_eq!(corpus["food"].len(), 2);
        assert_eq!(corpus["food"][1].intent, "order.check_status");
        assert_eq!(corpus["personality"].len(), 1);
    }
}
