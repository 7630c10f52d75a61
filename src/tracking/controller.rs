use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use anyhow::Result;
use chrono::Utc;
use log::{debug, info, warn};
use tokio::{
    sync::{oneshot, Mutex},
    time,
};

use crate::{
    breaks::{
        should_take_break, BreakDecision, BreakNotifier, BreakRecommendation, BreakSuggestion,
        SuggestionKind,
    },
    config::TrackerConfig,
    db::SessionStore,
    detection::{DetectionController, EmotionDetector, FaceExpressions},
    error::TrackerError,
    models::{Break, BreakReason, EmotionalAlert, WorkSession},
    settings::{BreakSettings, BreakSettingsPatch},
};

use super::{
    clock::SessionClock,
    state::{SessionMachine, TrackerSnapshot},
};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Async facade over [`SessionMachine`] that owns the background loops.
///
/// Every mutation goes through one lock around the machine. The session clock
/// runs only while a session is open and no break is in progress; callers never
/// start or stop it directly. Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct SessionTracker {
    machine: Arc<Mutex<SessionMachine>>,
    clock: Arc<Mutex<SessionClock>>,
    detection: Arc<Mutex<DetectionController>>,
    notifier: Arc<dyn BreakNotifier>,
    /// Session whose suggestion is awaiting a decision.
    pending_suggestion: Arc<StdMutex<Option<String>>>,
    config: Arc<TrackerConfig>,
}

impl SessionTracker {
    /// Loads persisted state and resumes the clock if a session was left open.
    pub async fn restore(
        store: SessionStore,
        notifier: Arc<dyn BreakNotifier>,
        config: TrackerConfig,
    ) -> Self {
        let machine = SessionMachine::restore(store, config.history_limit, Utc::now());

        let tracker = Self {
            machine: Arc::new(Mutex::new(machine)),
            clock: Arc::new(Mutex::new(SessionClock::new())),
            detection: Arc::new(Mutex::new(DetectionController::new())),
            notifier,
            pending_suggestion: Arc::new(StdMutex::new(None)),
            config: Arc::new(config),
        };
        tracker.sync_clock().await;
        tracker
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub async fn get_snapshot(&self) -> TrackerSnapshot {
        self.machine.lock().await.snapshot()
    }

    pub async fn start_work_session(&self) -> Result<WorkSession, TrackerError> {
        let session = {
            let mut machine = self.machine.lock().await;
            machine.start_work_session(Utc::now())?.clone()
        };
        self.sync_clock().await;
        Ok(session)
    }

    pub async fn end_work_session(&self) -> Option<WorkSession> {
        let ended = self.machine.lock().await.end_work_session(Utc::now());
        if let Some(session) = &ended {
            self.clear_pending_suggestion(&session.id);
        }
        self.sync_clock().await;
        ended
    }

    pub async fn start_break(
        &self,
        reason: BreakReason,
        emotional_trigger: Option<String>,
    ) -> Option<Break> {
        self.start_break_for_alert(reason, emotional_trigger, None)
            .await
    }

    /// Opens a break linked to `alert_id`, marking that alert as acted on.
    pub async fn start_break_for_alert(
        &self,
        reason: BreakReason,
        emotional_trigger: Option<String>,
        alert_id: Option<String>,
    ) -> Option<Break> {
        self.open_break(None, reason, emotional_trigger, alert_id)
            .await
    }

    /// Opens a break, optionally only if `session_id` is still the open session.
    async fn open_break(
        &self,
        session_id: Option<&str>,
        reason: BreakReason,
        emotional_trigger: Option<String>,
        alert_id: Option<String>,
    ) -> Option<Break> {
        let opened = {
            let mut machine = self.machine.lock().await;
            let current = machine.session().map(|session| session.id.as_str());
            if session_id.is_some() && current != session_id {
                debug!("Ignoring break for a session that is no longer open");
                return None;
            }
            machine
                .start_break(reason, emotional_trigger, alert_id, Utc::now())
                .cloned()
        };
        if opened.is_some() {
            self.sync_clock().await;
        }
        opened
    }

    pub async fn end_break(&self) -> Option<Break> {
        let sealed = self.machine.lock().await.end_break(Utc::now());
        if sealed.is_some() {
            self.sync_clock().await;
        }
        sealed
    }

    pub async fn record_emotional_alert(
        &self,
        emotion: &str,
        confidence: f64,
        suggested_action: &str,
    ) -> Option<EmotionalAlert> {
        self.machine
            .lock()
            .await
            .record_emotional_alert(emotion, confidence, suggested_action, Utc::now())
    }

    pub async fn save_settings(&self, patch: &BreakSettingsPatch) -> BreakSettings {
        self.machine.lock().await.save_settings(patch).clone()
    }

    /// Evaluates the break policy against the current work time.
    pub async fn should_take_break(
        &self,
        emotion: Option<&str>,
        confidence: Option<f64>,
    ) -> BreakRecommendation {
        let machine = self.machine.lock().await;
        should_take_break(machine.work_minutes(), machine.settings(), emotion, confidence)
    }

    /// One session clock tick: credits a work minute and checks the time rule.
    pub async fn on_clock_tick(&self) {
        let (suggestion, session_id) = {
            let mut machine = self.machine.lock().await;
            if !machine.tick_minute() {
                return;
            }
            let Some(session_id) = machine.session().map(|session| session.id.clone()) else {
                return;
            };
            log_debug!("work minute {}", machine.work_minutes());
            let recommendation = machine.evaluate(None);
            (
                BreakSuggestion::from_recommendation(&recommendation, None, None),
                session_id,
            )
        };

        if let Some(suggestion) = suggestion {
            self.raise_suggestion(suggestion, session_id);
        }
    }

    /// One detection tick: records qualifying alerts and raises at most one
    /// emotional suggestion. Ignored without an open session.
    pub async fn on_detection_tick(&self, faces: Vec<FaceExpressions>) {
        let readings: Vec<_> = faces.iter().filter_map(FaceExpressions::dominant).collect();
        if readings.is_empty() {
            return;
        }

        let mut suggestion = None;
        let session_id = {
            let mut machine = self.machine.lock().await;
            let Some(session_id) = machine.session().map(|session| session.id.clone()) else {
                return;
            };

            for reading in &readings {
                let assessment = machine.assess(reading);
                let alert_id = if assessment.record_alert {
                    machine
                        .record_emotional_alert(
                            &reading.emotion,
                            reading.confidence,
                            assessment.suggested_action,
                            Utc::now(),
                        )
                        .map(|alert| alert.id)
                } else {
                    None
                };

                let emotional =
                    assessment.recommendation.kind == Some(SuggestionKind::Emotional);
                if suggestion.is_none() && emotional && !machine.is_on_break() {
                    suggestion = BreakSuggestion::from_recommendation(
                        &assessment.recommendation,
                        Some(reading),
                        alert_id,
                    );
                }
            }
            session_id
        };

        if let Some(suggestion) = suggestion {
            self.raise_suggestion(suggestion, session_id);
        }
    }

    /// Starts the detection loop, replacing any loop already running.
    pub async fn start_detection(&self, detector: Box<dyn EmotionDetector>) {
        self.detection
            .lock()
            .await
            .start(self.clone(), detector, &self.config);
    }

    pub async fn stop_detection(&self) -> Result<()> {
        self.detection.lock().await.stop().await
    }

    pub async fn is_detecting(&self) -> bool {
        self.detection.lock().await.is_running()
    }

    /// Stops both background loops. The loops hold clones of the tracker, so
    /// this must run before the last handle is dropped.
    pub async fn shutdown(&self) -> Result<()> {
        self.stop_detection().await?;
        self.clock.lock().await.stop().await
    }

    pub async fn is_clock_running(&self) -> bool {
        self.clock.lock().await.is_running()
    }

    pub fn suggestion_pending(&self) -> bool {
        self.pending_suggestion().is_some()
    }

    pub async fn work_duration(&self) -> u64 {
        self.machine.lock().await.work_minutes()
    }

    pub async fn is_on_break(&self) -> bool {
        self.machine.lock().await.is_on_break()
    }

    pub async fn total_break_time(&self) -> u64 {
        self.machine.lock().await.total_break_minutes()
    }

    pub async fn emotional_alerts_today(&self) -> usize {
        self.machine.lock().await.emotional_alerts_today()
    }

    pub async fn current_session(&self) -> Option<WorkSession> {
        self.machine.lock().await.session().cloned()
    }

    pub async fn current_break(&self) -> Option<Break> {
        self.machine.lock().await.current_break().cloned()
    }

    pub async fn settings(&self) -> BreakSettings {
        self.machine.lock().await.settings().clone()
    }

    pub async fn work_history(&self) -> Vec<WorkSession> {
        self.machine.lock().await.history()
    }

    /// Aligns the clock with the machine. Lock order is clock, then machine;
    /// the machine lock is never held while the clock loop is joined.
    async fn sync_clock(&self) {
        let mut clock = self.clock.lock().await;
        let should_run = {
            let machine = self.machine.lock().await;
            machine.is_open() && !machine.is_on_break()
        };

        if should_run {
            if !clock.is_running() {
                clock.start(self.clone(), self.config.tick_interval);
                debug!("Session clock running");
            }
        } else if let Err(err) = clock.stop().await {
            warn!("Failed to stop session clock: {err:#}");
        }
    }

    fn pending_suggestion(&self) -> MutexGuard<'_, Option<String>> {
        match self.pending_suggestion.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn clear_pending_suggestion(&self, session_id: &str) {
        let mut pending = self.pending_suggestion();
        if pending.as_deref() == Some(session_id) {
            *pending = None;
        }
    }

    /// Hands `suggestion` to the notifier and waits for the decision in the
    /// background. Dropped if this session already has one waiting; a waiting
    /// suggestion from an ended session is superseded.
    fn raise_suggestion(&self, suggestion: BreakSuggestion, session_id: String) {
        {
            let mut pending = self.pending_suggestion();
            if pending.as_deref() == Some(session_id.as_str()) {
                debug!("Suggestion skipped: another one is awaiting a decision");
                return;
            }
            *pending = Some(session_id.clone());
        }

        let (responder, decision) = oneshot::channel();
        self.notifier.suggest_break(suggestion.clone(), responder);

        let tracker = self.clone();
        let window = self.config.suggestion_timeout;
        tokio::spawn(async move {
            let decision = match time::timeout(window, decision).await {
                Ok(Ok(decision)) => decision,
                Ok(Err(_)) => BreakDecision::Dismiss,
                Err(_) => {
                    info!("Break suggestion timed out after {window:?}");
                    BreakDecision::Dismiss
                }
            };

            if decision == BreakDecision::Take {
                tracker.accept_suggestion(&suggestion, &session_id).await;
            } else {
                debug!("Break suggestion dismissed");
            }
            tracker.clear_pending_suggestion(&session_id);
        });
    }

    async fn accept_suggestion(
        &self,
        suggestion: &BreakSuggestion,
        session_id: &str,
    ) -> Option<Break> {
        let (reason, trigger, alert_id) = match suggestion.kind {
            SuggestionKind::Emotional => (
                BreakReason::Emotional,
                suggestion.emotion.clone(),
                suggestion.alert_id.clone(),
            ),
            SuggestionKind::TimeBased => (BreakReason::Scheduled, None, None),
        };
        self.open_break(Some(session_id), reason, trigger, alert_id)
            .await
    }
}
