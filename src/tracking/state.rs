use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    breaks::{assess_detection, should_take_break, BreakRecommendation, DetectionAssessment, EmotionReading},
    db::SessionStore,
    error::TrackerError,
    models::{Break, BreakReason, EmotionalAlert, WorkSession},
    settings::{BreakSettings, BreakSettingsPatch},
};

/// Read model handed to UI callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    pub session: Option<WorkSession>,
    pub current_break: Option<Break>,
    pub work_minutes: u64,
    pub work_hours: f64,
    pub is_on_break: bool,
    pub total_break_minutes: u64,
    pub emotional_alerts_today: usize,
    pub settings: BreakSettings,
}

/// Session/break state machine.
///
/// Owns the open session and the open break, and writes every mutation
/// through to the store before returning. A failed write is logged and the
/// in-memory state stays authoritative. Callers pass `now` explicitly.
pub struct SessionMachine {
    store: SessionStore,
    settings: BreakSettings,
    session: Option<WorkSession>,
    current_break: Option<Break>,
    /// Minutes credited by the session clock; frozen while on break.
    work_minutes: u64,
    history_limit: usize,
}

impl SessionMachine {
    /// Loads settings and any open session from `store`.
    ///
    /// A resumed session's work minutes are recomputed from its start time and
    /// sealed breaks so a restart does not reset the clock to zero.
    pub fn restore(store: SessionStore, history_limit: usize, now: DateTime<Utc>) -> Self {
        let settings = store.load_settings();
        let mut session = store.load_current_session();

        let work_minutes = match session.as_mut() {
            Some(session) => {
                let minutes = session.elapsed_work_minutes(now);
                session.duration = minutes;
                info!(
                    "Resumed work session {} at {} work minute(s)",
                    session.id, minutes
                );
                minutes
            }
            None => 0,
        };

        Self {
            store,
            settings,
            session,
            current_break: None,
            work_minutes,
            history_limit,
        }
    }

    pub fn start_work_session(&mut self, now: DateTime<Utc>) -> Result<&WorkSession, TrackerError> {
        if let Some(open) = &self.session {
            return Err(TrackerError::SessionAlreadyOpen(open.id.clone()));
        }

        let session = WorkSession::new(now);
        info!("Started work session {}", session.id);
        self.current_break = None;
        self.work_minutes = 0;
        let session = self.session.insert(session);

        if let Err(err) = self.store.save_current_session(session) {
            warn!("Failed to persist new session {}: {err:#}", session.id);
        }
        Ok(session)
    }

    /// Seals and archives the open session. Any open break is discarded.
    pub fn end_work_session(&mut self, now: DateTime<Utc>) -> Option<WorkSession> {
        let Some(mut session) = self.session.take() else {
            debug!("end_work_session ignored: no open session");
            return None;
        };

        if let Some(discarded) = self.current_break.take() {
            debug!("Discarding open break {} at session end", discarded.id);
        }

        session.end_time = Some(now);
        session.duration = self.work_minutes;
        self.work_minutes = 0;

        if let Err(err) = self.store.append_history(&session, self.history_limit) {
            warn!("Failed to archive session {}: {err:#}", session.id);
        }
        if let Err(err) = self.store.clear_current_session() {
            warn!("Failed to clear current session slot: {err:#}");
        }

        info!(
            "Ended work session {} after {} work minute(s), {} break(s)",
            session.id,
            session.duration,
            session.breaks.len()
        );
        Some(session)
    }

    /// Opens a break. No-op without an open session or while a break is open.
    ///
    /// `alert_id` links the break to the alert that prompted it; when it names
    /// an alert in this session, that alert is marked `break_taken`.
    pub fn start_break(
        &mut self,
        reason: BreakReason,
        emotional_trigger: Option<String>,
        alert_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<&Break> {
        let Some(session) = self.session.as_mut() else {
            debug!("start_break ignored: no open session");
            return None;
        };
        if self.current_break.is_some() {
            debug!("start_break ignored: a break is already open");
            return None;
        }

        let linked_alert = match alert_id {
            Some(alert_id) => match session.alert_mut(&alert_id) {
                Some(alert) => {
                    alert.break_taken = true;
                    Some(alert_id)
                }
                None => {
                    debug!("Alert {alert_id} not found in session {}", session.id);
                    None
                }
            },
            None => None,
        };

        if linked_alert.is_some() {
            if let Err(err) = self.store.save_current_session(session) {
                warn!("Failed to persist session {}: {err:#}", session.id);
            }
        }

        let opened = Break::open(reason, emotional_trigger, linked_alert, now);
        info!("Started {} break {}", reason.as_str(), opened.id);
        Some(self.current_break.insert(opened))
    }

    /// Seals the open break and appends it to the session. No-op if none is open.
    pub fn end_break(&mut self, now: DateTime<Utc>) -> Option<Break> {
        let Some(session) = self.session.as_mut() else {
            self.current_break = None;
            return None;
        };
        let Some(open) = self.current_break.take() else {
            debug!("end_break ignored: no open break");
            return None;
        };

        let sealed = open.seal(now);
        session.breaks.push(sealed.clone());
        if let Err(err) = self.store.save_current_session(session) {
            warn!("Failed to persist session {}: {err:#}", session.id);
        }

        info!("Ended break {} after {} minute(s)", sealed.id, sealed.duration);
        Some(sealed)
    }

    pub fn record_emotional_alert(
        &mut self,
        emotion: &str,
        confidence: f64,
        suggested_action: &str,
        now: DateTime<Utc>,
    ) -> Option<EmotionalAlert> {
        let session = self.session.as_mut()?;

        let alert = EmotionalAlert::new(
            emotion.to_string(),
            confidence,
            suggested_action.to_string(),
            now,
        );
        session.emotional_alerts.push(alert.clone());
        if let Err(err) = self.store.save_current_session(session) {
            warn!("Failed to persist session {}: {err:#}", session.id);
        }

        info!(
            "Recorded emotional alert {} ({} at {:.0}%)",
            alert.id,
            alert.emotion,
            alert.confidence * 100.0
        );
        Some(alert)
    }

    pub fn save_settings(&mut self, patch: &BreakSettingsPatch) -> &BreakSettings {
        self.settings = self.settings.merged(patch);
        if let Err(err) = self.store.save_settings(&self.settings) {
            warn!("Failed to persist break settings: {err:#}");
        }
        &self.settings
    }

    /// Credits one work minute. Returns false while idle or on break.
    pub fn tick_minute(&mut self) -> bool {
        if self.current_break.is_some() {
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        self.work_minutes += 1;
        session.duration = self.work_minutes;
        true
    }

    pub fn evaluate(&self, reading: Option<&EmotionReading>) -> BreakRecommendation {
        should_take_break(
            self.work_minutes,
            &self.settings,
            reading.map(|r| r.emotion.as_str()),
            reading.map(|r| r.confidence),
        )
    }

    pub fn assess(&self, reading: &EmotionReading) -> DetectionAssessment {
        assess_detection(self.work_minutes, &self.settings, reading)
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_on_break(&self) -> bool {
        self.current_break.is_some()
    }

    pub fn work_minutes(&self) -> u64 {
        self.work_minutes
    }

    pub fn work_hours(&self) -> f64 {
        self.work_minutes as f64 / 60.0
    }

    pub fn total_break_minutes(&self) -> u64 {
        self.session
            .as_ref()
            .map(WorkSession::total_break_minutes)
            .unwrap_or(0)
    }

    pub fn emotional_alerts_today(&self) -> usize {
        self.session
            .as_ref()
            .map(|session| session.emotional_alerts.len())
            .unwrap_or(0)
    }

    pub fn session(&self) -> Option<&WorkSession> {
        self.session.as_ref()
    }

    pub fn current_break(&self) -> Option<&Break> {
        self.current_break.as_ref()
    }

    pub fn settings(&self) -> &BreakSettings {
        &self.settings
    }

    pub fn history(&self) -> Vec<WorkSession> {
        self.store.load_history()
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            session: self.session.clone(),
            current_break: self.current_break.clone(),
            work_minutes: self.work_minutes,
            work_hours: self.work_hours(),
            is_on_break: self.is_on_break(),
            total_break_minutes: self.total_break_minutes(),
            emotional_alerts_today: self.emotional_alerts_today(),
            settings: self.settings.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{KeyValueStore, MemoryStore, HISTORY_LIMIT};
    use anyhow::{anyhow, Result};
    use chrono::Duration;
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-02T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn minutes(n: i64) -> DateTime<Utc> {
        t0() + Duration::minutes(n)
    }

    fn machine() -> (SessionMachine, SessionStore) {
        let store = SessionStore::in_memory();
        (SessionMachine::restore(store.clone(), HISTORY_LIMIT, t0()), store)
    }

    fn tick(machine: &mut SessionMachine, n: u64) {
        for _ in 0..n {
            machine.tick_minute();
        }
    }

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn load(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }
        fn save(&self, key: &str, _value: &str) -> Result<()> {
            Err(anyhow!("disk full writing {key}"))
        }
        fn remove(&self, key: &str) -> Result<()> {
            Err(anyhow!("disk full removing {key}"))
        }
    }

    #[test]
    fn break_in_the_middle_of_a_session() {
        let (mut machine, _) = machine();
        machine.start_work_session(t0()).unwrap();

        tick(&mut machine, 10);
        machine.start_break(BreakReason::Manual, None, None, minutes(10));
        tick(&mut machine, 15);
        let sealed = machine.end_break(minutes(25)).unwrap();

        assert_eq!(sealed.duration, 15);
        assert_eq!(machine.work_minutes(), 10);
        let session = machine.session().unwrap();
        assert_eq!(session.breaks.len(), 1);
        assert_eq!(session.breaks[0].duration, 15);
        assert_eq!(machine.total_break_minutes(), 15);
    }

    #[test]
    fn starting_twice_is_rejected() {
        let (mut machine, _) = machine();
        let first = machine.start_work_session(t0()).unwrap().id.clone();

        let err = machine.start_work_session(minutes(1)).unwrap_err();
        assert!(matches!(err, TrackerError::SessionAlreadyOpen(id) if id == first));
        assert_eq!(machine.session().unwrap().id, first);
    }

    #[test]
    fn ending_a_break_twice_is_a_no_op() {
        let (mut machine, store) = machine();
        machine.start_work_session(t0()).unwrap();
        machine.start_break(BreakReason::Manual, None, None, minutes(5));

        assert!(machine.end_break(minutes(8)).is_some());
        let after_first = store.load_current_session().unwrap();
        assert!(machine.end_break(minutes(9)).is_none());

        assert_eq!(store.load_current_session().unwrap(), after_first);
        assert_eq!(machine.session().unwrap().breaks.len(), 1);
    }

    #[test]
    fn break_transitions_require_an_open_session() {
        let (mut machine, _) = machine();
        assert!(machine
            .start_break(BreakReason::Manual, None, None, t0())
            .is_none());
        assert!(machine.end_break(t0()).is_none());
        assert!(machine
            .record_emotional_alert("angry", 0.9, "breathe", t0())
            .is_none());
        assert!(machine.end_work_session(t0()).is_none());
        assert!(!machine.tick_minute());
    }

    #[test]
    fn second_break_while_one_is_open_is_ignored() {
        let (mut machine, _) = machine();
        machine.start_work_session(t0()).unwrap();
        let first = machine
            .start_break(BreakReason::Manual, None, None, minutes(1))
            .unwrap()
            .id
            .clone();

        assert!(machine
            .start_break(BreakReason::Scheduled, None, None, minutes(2))
            .is_none());
        assert_eq!(machine.current_break().unwrap().id, first);
    }

    #[test]
    fn sealed_break_durations_match_rounded_spans() {
        let (mut machine, _) = machine();
        machine.start_work_session(t0()).unwrap();

        let spans_secs = [30_i64, 89, 90, 150, 601, 3599];
        let mut cursor = t0();
        for span in spans_secs {
            cursor += Duration::minutes(7);
            machine.start_break(BreakReason::Manual, None, None, cursor);
            cursor += Duration::seconds(span);
            machine.end_break(cursor);
        }

        let session = machine.session().unwrap();
        let recorded: u64 = session.breaks.iter().map(|b| b.duration).sum();
        let expected: u64 = session
            .breaks
            .iter()
            .map(|b| (b.span_ms() as f64 / 60_000.0).round() as u64)
            .sum();
        assert_eq!(recorded, expected);
        assert_eq!(recorded, 1 + 1 + 2 + 3 + 10 + 60);
    }

    #[test]
    fn ending_archives_and_clears_the_slot() {
        let (mut machine, store) = machine();
        machine.start_work_session(t0()).unwrap();
        tick(&mut machine, 42);
        machine.start_break(BreakReason::Manual, None, None, minutes(42));

        let ended = machine.end_work_session(minutes(50)).unwrap();

        assert_eq!(ended.end_time, Some(minutes(50)));
        assert_eq!(ended.duration, 42);
        assert!(ended.breaks.is_empty());
        assert!(!machine.is_open());
        assert!(!machine.is_on_break());
        assert!(store.load_current_session().is_none());
        assert_eq!(store.load_history(), vec![ended]);
    }

    #[test]
    fn history_is_bounded_to_the_most_recent_sessions() {
        let (mut machine, store) = machine();
        let mut ended_ids = Vec::new();
        for i in 0..(HISTORY_LIMIT as i64 + 5) {
            machine.start_work_session(minutes(i * 10)).unwrap();
            let ended = machine.end_work_session(minutes(i * 10 + 5)).unwrap();
            ended_ids.push(ended.id);
        }

        let history = store.load_history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        let ids: Vec<_> = history.into_iter().map(|s| s.id).collect();
        assert_eq!(ids, ended_ids[5..].to_vec());
    }

    #[test]
    fn alerts_are_appended_and_persisted() {
        let (mut machine, store) = machine();
        machine.start_work_session(t0()).unwrap();

        let alert = machine
            .record_emotional_alert("sad", 0.66, "Call a friend", minutes(3))
            .unwrap();

        assert!(!alert.break_taken);
        assert_eq!(machine.emotional_alerts_today(), 1);
        assert_eq!(
            store.load_current_session().unwrap().emotional_alerts,
            vec![alert]
        );
    }

    #[test]
    fn break_linked_to_alert_marks_it_taken() {
        let (mut machine, store) = machine();
        machine.start_work_session(t0()).unwrap();
        let alert = machine
            .record_emotional_alert("angry", 0.9, "Breathe", minutes(3))
            .unwrap();

        let opened = machine
            .start_break(
                BreakReason::Emotional,
                Some("angry".into()),
                Some(alert.id.clone()),
                minutes(4),
            )
            .unwrap();
        assert_eq!(opened.alert_id.as_deref(), Some(alert.id.as_str()));

        let persisted = store.load_current_session().unwrap();
        assert!(persisted.emotional_alerts[0].break_taken);
    }

    #[test]
    fn unknown_alert_id_is_not_linked() {
        let (mut machine, _) = machine();
        machine.start_work_session(t0()).unwrap();
        let opened = machine
            .start_break(BreakReason::Emotional, None, Some("alert_x".into()), t0())
            .unwrap();
        assert_eq!(opened.alert_id, None);
    }

    #[test]
    fn restore_recomputes_work_minutes_from_start_time() {
        let store = SessionStore::in_memory();
        let now = t0() + Duration::minutes(120);
        let mut session = WorkSession::new(t0());
        session.breaks.push(
            Break::open(BreakReason::Manual, None, None, minutes(30)).seal(minutes(50)),
        );
        store.save_current_session(&session).unwrap();

        let machine = SessionMachine::restore(store, HISTORY_LIMIT, now);

        assert_eq!(machine.work_minutes(), 100);
        assert_eq!(machine.session().unwrap().duration, 100);
        assert!(!machine.is_on_break());
    }

    #[test]
    fn settings_are_merged_and_persisted() {
        let (mut machine, store) = machine();
        let patch = BreakSettingsPatch {
            work_duration_hours: Some(1.0),
            ..Default::default()
        };
        machine.save_settings(&patch);

        assert_eq!(store.load_settings().work_duration_hours, 1.0);
        assert_eq!(store.load_settings().break_duration_minutes, 15);

        machine.start_work_session(t0()).unwrap();
        tick(&mut machine, 60);
        let rec = machine.evaluate(None);
        assert!(rec.needed);
        assert_eq!(rec.reason, "You've been working for 1 hours. Time for a break!");
    }

    #[test]
    fn failed_writes_leave_memory_authoritative() {
        let store = SessionStore::new(Arc::new(ReadOnlyStore));
        let mut machine = SessionMachine::restore(store, HISTORY_LIMIT, t0());

        machine.start_work_session(t0()).unwrap();
        tick(&mut machine, 3);
        machine.start_break(BreakReason::Manual, None, None, minutes(3));
        machine.end_break(minutes(6));
        machine.record_emotional_alert("sad", 0.8, "Rest", minutes(7));

        assert_eq!(machine.work_minutes(), 3);
        assert_eq!(machine.session().unwrap().breaks.len(), 1);
        assert_eq!(machine.emotional_alerts_today(), 1);
        assert_eq!(machine.end_work_session(minutes(9)).unwrap().duration, 3);
    }

    #[test]
    fn memory_store_backs_history_listing() {
        let store = SessionStore::new(Arc::new(MemoryStore::new()));
        let mut machine = SessionMachine::restore(store, HISTORY_LIMIT, t0());
        machine.start_work_session(t0()).unwrap();
        machine.end_work_session(minutes(1));
        assert_eq!(machine.history().len(), 1);
    }
}
