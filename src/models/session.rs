//! Work session, break and emotional alert records.
//!
//! These are the shapes persisted in the `currentSession` and `workHistory` slots,
//! so field names serialize in camelCase and every timestamp is a `DateTime<Utc>`
//! (RFC 3339 on disk).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MS_PER_MINUTE: f64 = 60_000.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BreakReason {
    Scheduled,
    Emotional,
    Manual,
}

impl Default for BreakReason {
    fn default() -> Self {
        BreakReason::Manual
    }
}

impl BreakReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakReason::Scheduled => "scheduled",
            BreakReason::Emotional => "emotional",
            BreakReason::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Break {
    pub id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Whole minutes, rounded to nearest. Zero while the break is open.
    #[serde(default)]
    pub duration: u64,
    pub reason: BreakReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotional_trigger: Option<String>,
    /// Alert that prompted this break, when it came from an accepted suggestion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<String>,
}

impl Break {
    pub fn open(
        reason: BreakReason,
        emotional_trigger: Option<String>,
        alert_id: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        // A trigger label only makes sense on emotional breaks.
        let emotional_trigger = match reason {
            BreakReason::Emotional => emotional_trigger,
            _ => None,
        };

        Self {
            id: format!("break_{}", Uuid::new_v4().simple()),
            start_time: started_at,
            end_time: None,
            duration: 0,
            reason,
            emotional_trigger,
            alert_id,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Stamps the end time and computes `round((end - start) / 60s)`.
    pub fn seal(mut self, ended_at: DateTime<Utc>) -> Self {
        self.end_time = Some(ended_at);
        self.duration = rounded_minutes(self.start_time, ended_at);
        self
    }

    /// Raw span of a sealed break in milliseconds; zero while open.
    pub fn span_ms(&self) -> i64 {
        match self.end_time {
            Some(end) => (end - self.start_time).num_milliseconds().max(0),
            None => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmotionalAlert {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub emotion: String,
    pub confidence: f64,
    pub suggested_action: String,
    #[serde(default)]
    pub break_taken: bool,
}

impl EmotionalAlert {
    pub fn new(
        emotion: String,
        confidence: f64,
        suggested_action: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("alert_{}", Uuid::new_v4().simple()),
            timestamp,
            emotion,
            confidence,
            suggested_action,
            break_taken: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkSession {
    pub id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Accumulated work minutes, net of breaks.
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub breaks: Vec<Break>,
    #[serde(default)]
    pub emotional_alerts: Vec<EmotionalAlert>,
}

impl WorkSession {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            id: format!("session_{}", Uuid::new_v4().simple()),
            start_time: started_at,
            end_time: None,
            duration: 0,
            breaks: Vec::new(),
            emotional_alerts: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Sum of the rounded durations of all sealed breaks, in minutes.
    pub fn total_break_minutes(&self) -> u64 {
        self.breaks.iter().map(|b| b.duration).sum()
    }

    /// Work minutes elapsed at `now`, net of the raw spans of sealed breaks.
    ///
    /// Used to resume the clock after a restart instead of starting again from zero.
    pub fn elapsed_work_minutes(&self, now: DateTime<Utc>) -> u64 {
        let elapsed_ms = (now - self.start_time).num_milliseconds();
        let break_ms: i64 = self.breaks.iter().map(Break::span_ms).sum();
        let work_ms = elapsed_ms.saturating_sub(break_ms).max(0);
        (work_ms as f64 / MS_PER_MINUTE).floor() as u64
    }

    pub fn alert_mut(&mut self, alert_id: &str) -> Option<&mut EmotionalAlert> {
        self.emotional_alerts
            .iter_mut()
            .find(|alert| alert.id == alert_id)
    }
}

fn rounded_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    let ms = (end - start).num_milliseconds().max(0);
    (ms as f64 / MS_PER_MINUTE).round() as u64
}
