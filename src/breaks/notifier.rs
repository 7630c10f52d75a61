use log::info;
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use super::policy::{BreakRecommendation, EmotionReading, SuggestionKind};

pub const SUGGESTED_ACTIVITIES: [&str; 8] = [
    "Take a short walk",
    "Practice deep breathing",
    "Have a healthy snack",
    "Listen to calming music",
    "Do some light stretching",
    "Call a friend or family member",
    "Step outside for fresh air",
    "Practice mindfulness meditation",
];

const ACTIVITIES_PER_SUGGESTION: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BreakDecision {
    Take,
    Dismiss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakSuggestion {
    pub reason: String,
    pub duration_minutes: u32,
    pub emotion: Option<String>,
    pub confidence: Option<f64>,
    pub kind: SuggestionKind,
    /// Alert recorded for the same reading, if any.
    pub alert_id: Option<String>,
    pub activities: Vec<String>,
}

impl BreakSuggestion {
    /// Builds the payload for a positive recommendation; `None` if no break is needed.
    ///
    /// The emotion is only attached to emotional suggestions so that accepting a
    /// time-based one never starts an emotional break.
    pub fn from_recommendation(
        recommendation: &BreakRecommendation,
        reading: Option<&EmotionReading>,
        alert_id: Option<String>,
    ) -> Option<Self> {
        if !recommendation.needed {
            return None;
        }
        let kind = recommendation.kind?;
        let reading = match kind {
            SuggestionKind::Emotional => reading,
            SuggestionKind::TimeBased => None,
        };

        Some(Self {
            reason: recommendation.reason.clone(),
            duration_minutes: recommendation.duration_minutes,
            emotion: reading.map(|r| r.emotion.clone()),
            confidence: reading.map(|r| r.confidence),
            kind,
            alert_id: reading.and(alert_id),
            activities: pick_activities(&mut rand::thread_rng()),
        })
    }
}

pub fn pick_activities<R: Rng + ?Sized>(rng: &mut R) -> Vec<String> {
    SUGGESTED_ACTIVITIES
        .choose_multiple(rng, ACTIVITIES_PER_SUGGESTION)
        .map(|activity| activity.to_string())
        .collect()
}

/// Presents break suggestions to the user.
///
/// Implementations answer through `responder`. Dropping it, or not answering
/// within the tracker's suggestion timeout, counts as a dismissal.
pub trait BreakNotifier: Send + Sync {
    fn suggest_break(&self, suggestion: BreakSuggestion, responder: oneshot::Sender<BreakDecision>);
}

/// Logs each suggestion and lets it lapse.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl BreakNotifier for LogNotifier {
    fn suggest_break(&self, suggestion: BreakSuggestion, _responder: oneshot::Sender<BreakDecision>) {
        info!(
            "Break suggested ({:?}, {} min): {} | try: {}",
            suggestion.kind,
            suggestion.duration_minutes,
            suggestion.reason,
            suggestion.activities.join(", ")
        );
    }
}

/// A suggestion waiting on a user decision.
#[derive(Debug)]
pub struct PendingSuggestion {
    pub suggestion: BreakSuggestion,
    responder: oneshot::Sender<BreakDecision>,
}

impl PendingSuggestion {
    /// Returns false if the tracker already stopped waiting.
    pub fn respond(self, decision: BreakDecision) -> bool {
        self.responder.send(decision).is_ok()
    }

    pub fn take(self) -> bool {
        self.respond(BreakDecision::Take)
    }

    pub fn dismiss(self) -> bool {
        self.respond(BreakDecision::Dismiss)
    }
}

/// Forwards suggestions to a UI loop over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<PendingSuggestion>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PendingSuggestion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl BreakNotifier for ChannelNotifier {
    fn suggest_break(&self, suggestion: BreakSuggestion, responder: oneshot::Sender<BreakDecision>) {
        // A closed receiver drops the responder, which resolves as a dismissal.
        let _ = self.tx.send(PendingSuggestion {
            suggestion,
            responder,
        });
    }
}
