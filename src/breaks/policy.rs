//! Break policy: decides from elapsed work time and an optional emotion reading
//! whether a break should be suggested. Everything here is pure.

use serde::{Deserialize, Serialize};

use crate::settings::BreakSettings;

/// Labels treated as negative, compared case-insensitively.
pub const NEGATIVE_EMOTIONS: [&str; 5] = ["angry", "frustrated", "sad", "fearful", "disgusted"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionReading {
    pub emotion: String,
    pub confidence: f64,
}

impl EmotionReading {
    pub fn new(emotion: impl Into<String>, confidence: f64) -> Self {
        Self {
            emotion: emotion.into(),
            confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestionKind {
    TimeBased,
    Emotional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakRecommendation {
    pub needed: bool,
    pub reason: String,
    pub duration_minutes: u32,
    pub kind: Option<SuggestionKind>,
}

impl BreakRecommendation {
    pub fn not_needed() -> Self {
        Self {
            needed: false,
            reason: String::new(),
            duration_minutes: 0,
            kind: None,
        }
    }
}

pub fn is_negative_emotion(emotion: &str) -> bool {
    let emotion = emotion.to_lowercase();
    NEGATIVE_EMOTIONS.contains(&emotion.as_str())
}

/// Evaluates break-worthiness. The time-based rule is checked first and wins
/// over the emotional rule when both would fire.
pub fn should_take_break(
    work_minutes: u64,
    settings: &BreakSettings,
    emotion: Option<&str>,
    confidence: Option<f64>,
) -> BreakRecommendation {
    if !settings.enable_auto_breaks {
        return BreakRecommendation::not_needed();
    }

    let work_hours = work_minutes as f64 / 60.0;
    if work_hours >= settings.work_duration_hours {
        return BreakRecommendation {
            needed: true,
            reason: format!(
                "You've been working for {} hours. Time for a break!",
                work_hours.round() as u64
            ),
            duration_minutes: settings.break_duration_minutes,
            kind: Some(SuggestionKind::TimeBased),
        };
    }

    if !settings.enable_emotional_detection {
        return BreakRecommendation::not_needed();
    }

    if let (Some(emotion), Some(confidence)) = (emotion, confidence) {
        if is_negative_emotion(emotion) && confidence >= settings.emotional_break_threshold {
            return BreakRecommendation {
                needed: true,
                reason: format!(
                    "High {emotion} detected ({}%). Take a break to recharge!",
                    (confidence * 100.0).round() as i64
                ),
                duration_minutes: settings.emotional_break_duration,
                kind: Some(SuggestionKind::Emotional),
            };
        }
    }

    BreakRecommendation::not_needed()
}

/// What the tracker should do with one dominant reading from a detection tick.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionAssessment {
    /// The reading is negative and at or above `emotional_alert_threshold`.
    pub record_alert: bool,
    pub suggested_action: &'static str,
    pub recommendation: BreakRecommendation,
}

/// Single evaluation path for detection ticks: alert recording and break
/// suggestion both come from the configured thresholds.
pub fn assess_detection(
    work_minutes: u64,
    settings: &BreakSettings,
    reading: &EmotionReading,
) -> DetectionAssessment {
    let record_alert = settings.enable_emotional_detection
        && is_negative_emotion(&reading.emotion)
        && reading.confidence >= settings.emotional_alert_threshold;

    DetectionAssessment {
        record_alert,
        suggested_action: suggested_action(&reading.emotion),
        recommendation: should_take_break(
            work_minutes,
            settings,
            Some(&reading.emotion),
            Some(reading.confidence),
        ),
    }
}

pub fn suggested_action(emotion: &str) -> &'static str {
    match emotion.to_lowercase().as_str() {
        "angry" => "Step away from the screen and take a few slow, deep breaths",
        "frustrated" => "Take a short walk and come back to the problem fresh",
        "sad" => "Reach out to a friend or colleague for a quick chat",
        "fearful" => "Pause for a grounding exercise before continuing",
        "disgusted" => "Change your surroundings for a few minutes",
        _ => "Take a moment to reset",
    }
}
