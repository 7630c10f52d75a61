use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::types::{DetectorMode, EmotionDetector, FaceExpressions, EXPRESSION_LABELS};

const MAX_FACES: usize = 2;

/// Stand-in used when no expression model is available.
///
/// Each tick yields zero to two faces. Every label gets a low background score
/// and one randomly chosen label gets a strong score, so the dominant emotion
/// varies from tick to tick.
pub struct SimulatedDetector {
    rng: StdRng,
}

impl SimulatedDetector {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn synthesize_face(&mut self) -> FaceExpressions {
        let strong = self.rng.gen_range(0..EXPRESSION_LABELS.len());
        let scores: Vec<(&str, f64)> = EXPRESSION_LABELS
            .iter()
            .enumerate()
            .map(|(idx, label)| {
                let confidence = if idx == strong {
                    self.rng.gen_range(0.4..=1.0)
                } else {
                    self.rng.gen_range(0.0..0.3)
                };
                (*label, confidence)
            })
            .collect();
        FaceExpressions::from_pairs(scores)
    }
}

impl Default for SimulatedDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl EmotionDetector for SimulatedDetector {
    fn mode(&self) -> DetectorMode {
        DetectorMode::Simulated
    }

    fn detect(&mut self) -> Result<Vec<FaceExpressions>> {
        let faces = self.rng.gen_range(0..=MAX_FACES);
        Ok((0..faces).map(|_| self.synthesize_face()).collect())
    }
}
