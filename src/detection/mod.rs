pub mod controller;
pub mod simulated;
pub mod types;

pub use controller::DetectionController;
pub use simulated::SimulatedDetector;
pub use types::{DetectorMode, EmotionDetector, EmotionScore, FaceExpressions, EXPRESSION_LABELS};
