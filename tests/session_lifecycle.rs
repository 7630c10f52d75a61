use std::sync::Arc;

use breakwise_lib::{
    Break, BreakReason, BreakSettingsPatch, LogNotifier, SessionStore, SessionTracker,
    SqliteStore, TrackerConfig, WorkSession,
};
use chrono::{Duration, Utc};
use tempfile::TempDir;

fn config_in(dir: &TempDir) -> TrackerConfig {
    TrackerConfig {
        data_dir: dir.path().to_path_buf(),
        ..TrackerConfig::default()
    }
}

fn open_store(config: &TrackerConfig) -> SessionStore {
    let backend = SqliteStore::open(config.database_path()).unwrap();
    SessionStore::new(Arc::new(backend))
}

async fn open_tracker(config: &TrackerConfig) -> SessionTracker {
    SessionTracker::restore(open_store(config), Arc::new(LogNotifier), config.clone()).await
}

#[tokio::test(start_paused = true)]
async fn open_session_survives_a_restart() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let session_id = {
        let tracker = open_tracker(&config).await;
        let session = tracker.start_work_session().await.unwrap();
        tracker
            .record_emotional_alert("sad", 0.82, "Reach out to someone")
            .await
            .unwrap();
        tracker.start_break(BreakReason::Manual, None).await.unwrap();
        tracker.end_break().await.unwrap();
        tracker.shutdown().await.unwrap();
        session.id
    };

    let tracker = open_tracker(&config).await;
    let restored = tracker.current_session().await.unwrap();

    assert_eq!(restored.id, session_id);
    assert_eq!(restored.breaks.len(), 1);
    assert_eq!(restored.breaks[0].reason, BreakReason::Manual);
    assert_eq!(restored.emotional_alerts.len(), 1);
    assert_eq!(restored.emotional_alerts[0].emotion, "sad");
    assert!(!tracker.is_on_break().await);
    assert!(tracker.is_clock_running().await);
    tracker.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn restart_recomputes_work_time_net_of_breaks() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let now = Utc::now();
    let mut session = WorkSession::new(now - Duration::minutes(120));
    session.breaks.push(
        Break::open(BreakReason::Manual, None, None, now - Duration::minutes(90))
            .seal(now - Duration::minutes(70)),
    );
    open_store(&config).save_current_session(&session).unwrap();

    let tracker = open_tracker(&config).await;

    assert_eq!(tracker.work_duration().await, 100);
    assert_eq!(tracker.total_break_time().await, 20);
    tracker.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn history_keeps_only_the_newest_sessions() {
    let dir = TempDir::new().unwrap();
    let config = TrackerConfig {
        history_limit: 3,
        ..config_in(&dir)
    };
    let tracker = open_tracker(&config).await;

    let mut ended = Vec::new();
    for _ in 0..5 {
        tracker.start_work_session().await.unwrap();
        ended.push(tracker.end_work_session().await.unwrap().id);
    }
    tracker.shutdown().await.unwrap();

    let history = open_store(&config).load_history();
    let ids: Vec<_> = history.iter().map(|s| s.id.clone()).collect();
    assert_eq!(ids, ended[2..].to_vec());
    assert!(history.iter().all(|s| s.end_time.is_some()));
    assert!(open_store(&config).load_current_session().is_none());
}

#[tokio::test(start_paused = true)]
async fn settings_persist_across_restarts() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    {
        let tracker = open_tracker(&config).await;
        tracker
            .save_settings(&BreakSettingsPatch {
                break_duration_minutes: Some(20),
                emotional_break_threshold: Some(1.4),
                ..Default::default()
            })
            .await;
    }

    let tracker = open_tracker(&config).await;
    let settings = tracker.settings().await;
    assert_eq!(settings.break_duration_minutes, 20);
    assert_eq!(settings.emotional_break_threshold, 1.0);
    assert_eq!(settings.work_duration_hours, 8.0);
}
