use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::breaks::EmotionReading;

/// Expression labels produced by the face expression model.
pub const EXPRESSION_LABELS: [&str; 7] = [
    "neutral",
    "happy",
    "sad",
    "angry",
    "fearful",
    "disgusted",
    "surprised",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionScore {
    pub label: String,
    pub confidence: f64,
}

/// Emotion-confidence vector for one detected face. Scores need not sum to 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceExpressions {
    pub scores: Vec<EmotionScore>,
}

impl FaceExpressions {
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            scores: pairs
                .into_iter()
                .map(|(label, confidence)| EmotionScore {
                    label: label.into(),
                    confidence,
                })
                .collect(),
        }
    }

    /// Highest-confidence label. NaN scores are skipped; on a tie the first wins.
    pub fn dominant(&self) -> Option<EmotionReading> {
        let mut best: Option<&EmotionScore> = None;
        for score in self.scores.iter().filter(|s| !s.confidence.is_nan()) {
            match best {
                Some(current) if current.confidence >= score.confidence => {}
                _ => best = Some(score),
            }
        }
        best.map(|score| EmotionReading::new(score.label.clone(), score.confidence))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DetectorMode {
    /// Backed by a real face/expression model.
    Live,
    /// Degraded mode with synthetic readings, polled less often.
    Simulated,
}

/// Source of per-face emotion vectors, polled once per detection tick.
pub trait EmotionDetector: Send {
    fn mode(&self) -> DetectorMode;

    fn detect(&mut self) -> Result<Vec<FaceExpressions>>;
}
