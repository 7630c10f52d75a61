use log::warn;
use serde::{Deserialize, Serialize};

/// Break policy configuration persisted in the `breakSettings` slot.
///
/// `#[serde(default)]` makes a stored object with missing keys fall back to the
/// defaults below, which is the merge-over-defaults behaviour on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BreakSettings {
    pub work_duration_hours: f64,
    pub break_duration_minutes: u32,
    /// Confidence at or above which a negative emotion warrants a break.
    pub emotional_break_threshold: f64,
    pub emotional_break_duration: u32,
    pub enable_auto_breaks: bool,
    pub enable_emotional_detection: bool,
    /// Confidence at or above which a negative emotion is recorded as an alert.
    pub emotional_alert_threshold: f64,
}

impl Default for BreakSettings {
    fn default() -> Self {
        Self {
            work_duration_hours: 8.0,
            break_duration_minutes: 15,
            emotional_break_threshold: 0.7,
            emotional_break_duration: 10,
            enable_auto_breaks: true,
            enable_emotional_detection: true,
            emotional_alert_threshold: 0.6,
        }
    }
}

impl BreakSettings {
    /// Returns a copy with `patch` applied on top.
    pub fn merged(&self, patch: &BreakSettingsPatch) -> Self {
        let merged = Self {
            work_duration_hours: patch.work_duration_hours.unwrap_or(self.work_duration_hours),
            break_duration_minutes: patch
                .break_duration_minutes
                .unwrap_or(self.break_duration_minutes),
            emotional_break_threshold: patch
                .emotional_break_threshold
                .unwrap_or(self.emotional_break_threshold),
            emotional_break_duration: patch
                .emotional_break_duration
                .unwrap_or(self.emotional_break_duration),
            enable_auto_breaks: patch.enable_auto_breaks.unwrap_or(self.enable_auto_breaks),
            enable_emotional_detection: patch
                .enable_emotional_detection
                .unwrap_or(self.enable_emotional_detection),
            emotional_alert_threshold: patch
                .emotional_alert_threshold
                .unwrap_or(self.emotional_alert_threshold),
        };
        merged.sanitized()
    }

    /// Clamps both confidence thresholds into `[0, 1]`.
    pub fn sanitized(mut self) -> Self {
        self.emotional_break_threshold =
            clamp_threshold("emotionalBreakThreshold", self.emotional_break_threshold);
        self.emotional_alert_threshold =
            clamp_threshold("emotionalAlertThreshold", self.emotional_alert_threshold);
        self
    }
}

fn clamp_threshold(field: &str, value: f64) -> f64 {
    if value.is_nan() {
        warn!("{field} is NaN; falling back to 1.0");
        return 1.0;
    }
    if !(0.0..=1.0).contains(&value) {
        let clamped = value.clamp(0.0, 1.0);
        warn!("{field} {value} out of range; clamped to {clamped}");
        return clamped;
    }
    value
}

/// Partial update accepted by `save_settings`. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BreakSettingsPatch {
    pub work_duration_hours: Option<f64>,
    pub break_duration_minutes: Option<u32>,
    pub emotional_break_threshold: Option<f64>,
    pub emotional_break_duration: Option<u32>,
    pub enable_auto_breaks: Option<bool>,
    pub enable_emotional_detection: Option<bool>,
    pub emotional_alert_threshold: Option<f64>,
}
