//! Intent classifications and their post-processing.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A scored intent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: String,
    pub score: f64,
}

impl Classification {
    pub fn new<S: Into<String>>(intent: S, score: f64) -> Self {
        Classification {
            intent: intent.into(),
            score,
        }
    }
}

/// Sort by descending score. Equal scores keep their relative order.
pub fn sort_classifications(classifications: &mut [Classification]) {
    classifications.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

/// Square every score and divide by the sum of squares.
///
/// When every score is zero the list is only squared, so it stays all zero.
pub fn normalize_classifications(classifications: &mut [Classification]) {
    let mut total = 0.0;
    for classification in classifications.iter_mut() {
        classification.score = classification.score.powi(2);
        total += classification.score;
    }
    if total > 0.0 {
        for classification in classifications.iter_mut() {
            classification.score /= total;
        }
    }
}
