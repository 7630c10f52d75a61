//! Durable session store.
//!
//! Three independent slots live behind a plain key-value capability
//! ([`KeyValueStore`]). [`SessionStore`] layers typed access on top: JSON
//! serialization, merge-over-defaults for settings, the bounded history list,
//! and the rule that a malformed slot reads as absent.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{de::DeserializeOwned, Serialize};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::{error::StoreError, models::WorkSession, settings::BreakSettings};

/// Default cap on archived sessions; oldest are evicted first.
pub const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    BreakSettings,
    CurrentSession,
    WorkHistory,
}

impl Slot {
    pub fn key(&self) -> &'static str {
        match self {
            Slot::BreakSettings => "breakSettings",
            Slot::CurrentSession => "currentSession",
            Slot::WorkHistory => "workHistory",
        }
    }
}

/// Raw string storage keyed by slot name. `save` overwrites the whole slot.
pub trait KeyValueStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Store backed by a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn read_slot<T: DeserializeOwned>(&self, slot: Slot) -> Result<Option<T>, StoreError> {
        let key = slot.key();
        let raw = self.backend.load(key).map_err(|err| StoreError::Backend {
            key,
            message: format!("{err:#}"),
        })?;

        match raw {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Malformed { key, source }),
            None => Ok(None),
        }
    }

    /// Like [`read_slot`](Self::read_slot) but a read failure is logged and reported as absent.
    pub fn load_slot<T: DeserializeOwned>(&self, slot: Slot) -> Option<T> {
        match self.read_slot(slot) {
            Ok(value) => value,
            Err(err) => {
                warn!("Ignoring stored {}: {err}", slot.key());
                None
            }
        }
    }

    pub fn save_slot<T: Serialize>(&self, slot: Slot, value: &T) -> Result<()> {
        let key = slot.key();
        let serialized =
            serde_json::to_string(value).with_context(|| format!("failed to serialize {key}"))?;
        self.backend
            .save(key, &serialized)
            .with_context(|| format!("failed to write {key}"))
    }

    pub fn remove_slot(&self, slot: Slot) -> Result<()> {
        let key = slot.key();
        self.backend
            .remove(key)
            .with_context(|| format!("failed to remove {key}"))
    }

    pub fn load_settings(&self) -> BreakSettings {
        self.load_slot::<BreakSettings>(Slot::BreakSettings)
            .map(BreakSettings::sanitized)
            .unwrap_or_default()
    }

    pub fn save_settings(&self, settings: &BreakSettings) -> Result<()> {
        self.save_slot(Slot::BreakSettings, settings)
    }

    pub fn load_current_session(&self) -> Option<WorkSession> {
        let session = self.load_slot::<WorkSession>(Slot::CurrentSession)?;
        if !session.is_open() {
            warn!(
                "Stored current session {} is already sealed; ignoring it",
                session.id
            );
            return None;
        }
        Some(session)
    }

    pub fn save_current_session(&self, session: &WorkSession) -> Result<()> {
        self.save_slot(Slot::CurrentSession, session)
    }

    pub fn clear_current_session(&self) -> Result<()> {
        self.remove_slot(Slot::CurrentSession)
    }

    /// Archived sessions, oldest first.
    pub fn load_history(&self) -> Vec<WorkSession> {
        self.load_slot(Slot::WorkHistory).unwrap_or_default()
    }

    /// Appends `session` and keeps only the newest `limit` entries.
    ///
    /// A malformed list is replaced. A failed read leaves the stored list
    /// untouched and returns the error.
    pub fn append_history(&self, session: &WorkSession, limit: usize) -> Result<()> {
        let mut history: Vec<WorkSession> = match self.read_slot(Slot::WorkHistory) {
            Ok(history) => history.unwrap_or_default(),
            Err(err @ StoreError::Malformed { .. }) => {
                warn!("Replacing unreadable history: {err}");
                Vec::new()
            }
            Err(err @ StoreError::Backend { .. }) => {
                return Err(err).context("history not updated");
            }
        };
        history.push(session.clone());

        if history.len() > limit {
            let excess = history.len() - limit;
            history.drain(..excess);
            debug!("Evicted {excess} archived session(s) from history");
        }

        self.save_slot(Slot::WorkHistory, &history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Break, BreakReason, EmotionalAlert};
    use anyhow::anyhow;
    use chrono::{DateTime, Duration, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory store whose reads can be switched to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_reads: AtomicBool,
    }

    impl KeyValueStore for FlakyStore {
        fn load(&self, key: &str) -> Result<Option<String>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(anyhow!("database is locked"));
            }
            self.inner.load(key)
        }

        fn save(&self, key: &str, value: &str) -> Result<()> {
            self.inner.save(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-02T09:00:00.250Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn sealed_session(start: DateTime<Utc>) -> WorkSession {
        let mut session = WorkSession::new(start);
        session.end_time = Some(start + Duration::hours(1));
        session.duration = 60;
        session
    }

    #[test]
    fn current_session_round_trips_with_nested_records() {
        let store = SessionStore::in_memory();
        let mut session = WorkSession::new(t0());
        session.duration = 42;
        session.breaks.push(
            Break::open(
                BreakReason::Emotional,
                Some("sad".into()),
                None,
                t0() + Duration::minutes(10),
            )
            .seal(t0() + Duration::minutes(22)),
        );
        session.emotional_alerts.push(EmotionalAlert::new(
            "sad".into(),
            0.83,
            "Reach out to someone".into(),
            t0() + Duration::minutes(9),
        ));

        store.save_current_session(&session).unwrap();
        let loaded = store.load_current_session().unwrap();

        assert_eq!(loaded, session);
        assert_eq!(loaded.breaks[0].start_time, t0() + Duration::minutes(10));
        assert_eq!(loaded.emotional_alerts[0].timestamp, t0() + Duration::minutes(9));
    }

    #[test]
    fn malformed_slots_read_as_absent() {
        let backend = Arc::new(MemoryStore::new());
        backend.save("currentSession", "{ not json").unwrap();
        backend.save("breakSettings", r#"{"workDurationHours":"eight"}"#).unwrap();
        backend.save("workHistory", r#"{"oops":true}"#).unwrap();
        let store = SessionStore::new(backend);

        assert!(matches!(
            store.read_slot::<WorkSession>(Slot::CurrentSession),
            Err(StoreError::Malformed { key: "currentSession", .. })
        ));
        assert!(store.load_current_session().is_none());
        assert_eq!(store.load_settings(), BreakSettings::default());
        assert!(store.load_history().is_empty());
    }

    #[test]
    fn settings_merge_over_defaults_on_load() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .save("breakSettings", r#"{"breakDurationMinutes":25}"#)
            .unwrap();
        let store = SessionStore::new(backend);

        let settings = store.load_settings();
        assert_eq!(settings.break_duration_minutes, 25);
        assert_eq!(settings.work_duration_hours, 8.0);
    }

    #[test]
    fn history_keeps_newest_entries_oldest_first() {
        let store = SessionStore::in_memory();
        let mut ids = Vec::new();
        for i in 0..(HISTORY_LIMIT + 7) {
            let session = sealed_session(t0() + Duration::hours(i as i64));
            ids.push(session.id.clone());
            store.append_history(&session, HISTORY_LIMIT).unwrap();
        }

        let history = store.load_history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        let kept: Vec<_> = history.iter().map(|s| s.id.clone()).collect();
        assert_eq!(kept, ids[7..].to_vec());
    }

    #[test]
    fn failed_history_read_keeps_the_archive() {
        let backend = Arc::new(FlakyStore::default());
        let store = SessionStore::new(backend.clone());
        for i in 0..10 {
            store
                .append_history(&sealed_session(t0() + Duration::hours(i)), HISTORY_LIMIT)
                .unwrap();
        }

        backend.fail_reads.store(true, Ordering::SeqCst);
        let err = store
            .append_history(&sealed_session(t0() + Duration::hours(10)), HISTORY_LIMIT)
            .unwrap_err();
        assert!(format!("{err:#}").contains("database is locked"));

        backend.fail_reads.store(false, Ordering::SeqCst);
        assert_eq!(store.load_history().len(), 10);
    }

    #[test]
    fn malformed_history_is_replaced_on_append() {
        let backend = Arc::new(MemoryStore::new());
        backend.save("workHistory", "[{ broken").unwrap();
        let store = SessionStore::new(backend);

        let session = sealed_session(t0());
        store.append_history(&session, HISTORY_LIMIT).unwrap();
        assert_eq!(store.load_history(), vec![session]);
    }

    #[test]
    fn sealed_current_session_is_ignored() {
        let store = SessionStore::in_memory();
        store.save_current_session(&sealed_session(t0())).unwrap();
        assert!(store.load_current_session().is_none());
    }

    #[test]
    fn clearing_removes_the_slot() {
        let store = SessionStore::in_memory();
        store.save_current_session(&WorkSession::new(t0())).unwrap();
        store.clear_current_session().unwrap();
        assert!(store.load_current_session().is_none());
    }
}
