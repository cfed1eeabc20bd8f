//! Pronunciation assessment results and learner-facing feedback.

use serde::{Deserialize, Serialize};

/// Per-word accuracy from the scoring service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordScore {
    pub word: String,
    pub accuracy: f64,
}

/// Scores on a 0..=100 scale, plus the per-word breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PronunciationReport {
    pub accuracy: f64,
    pub pronunciation: f64,
    pub fluency: f64,
    pub completeness: f64,
    pub words: Vec<WordScore>,
}

/// Words scoring below this are worth calling out to the learner.
const WORD_ACCURACY_FLOOR: f64 = 70.0;

impl PronunciationReport {
    /// Whether the overall pronunciation is weak enough that the
    /// conversation partner should offer a correction.
    pub fn should_correct(&self) -> bool {
        self.pronunciation < 70.0
    }

    /// A short suggestion naming the first weak word, if any.
    pub fn feedback(&self) -> Option<String> {
        self.words
            .iter()
            .find(|w| w.accuracy < WORD_ACCURACY_FLOOR)
            .map(|w| format!("Try saying \"{}\" more clearly.", w.word))
    }
}
