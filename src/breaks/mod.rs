pub mod notifier;
pub mod policy;

pub use notifier::{
    BreakDecision, BreakNotifier, BreakSuggestion, ChannelNotifier, LogNotifier, PendingSuggestion,
};
pub use policy::{
    assess_detection, is_negative_emotion, should_take_break, suggested_action,
    BreakRecommendation, DetectionAssessment, EmotionReading, SuggestionKind,
};
