pub mod breaks;
pub mod config;
pub mod db;
pub mod detection;
pub mod error;
pub mod models;
pub mod settings;
pub mod tracking;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

pub use breaks::{
    BreakDecision, BreakNotifier, BreakRecommendation, BreakSuggestion, ChannelNotifier,
    LogNotifier, PendingSuggestion, SuggestionKind,
};
pub use config::TrackerConfig;
pub use db::{KeyValueStore, MemoryStore, SessionStore, SqliteStore};
pub use detection::{DetectorMode, EmotionDetector, FaceExpressions, SimulatedDetector};
pub use error::{StoreError, TrackerError};
pub use models::{Break, BreakReason, EmotionalAlert, WorkSession};
pub use settings::{BreakSettings, BreakSettingsPatch};
pub use tracking::{SessionTracker, TrackerSnapshot};

/// Runs the tracker headless until Ctrl-C: resumes or starts a session, feeds it
/// simulated detections and logs every break suggestion.
pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("Breakwise starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async {
        let config = TrackerConfig::from_env();
        let db_path = config.database_path();
        let backend = SqliteStore::open(db_path.clone())
            .with_context(|| format!("failed to open store at {}", db_path.display()))?;

        let store = SessionStore::new(Arc::new(backend));
        let tracker = SessionTracker::restore(store, Arc::new(LogNotifier), config).await;

        match tracker.start_work_session().await {
            Ok(session) => info!("Tracking new session {}", session.id),
            Err(TrackerError::SessionAlreadyOpen(id)) => info!("Continuing session {id}"),
        }

        tracker
            .start_detection(Box::new(SimulatedDetector::new()))
            .await;

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
        info!("Shutting down...");

        if let Err(err) = tracker.stop_detection().await {
            warn!("Failed to stop detection: {err:#}");
        }
        let ended = tracker.end_work_session().await;
        tracker.shutdown().await?;

        if let Some(session) = ended {
            info!(
                "Session {} closed: {} work minute(s), {} break minute(s), {} emotional alert(s)",
                session.id,
                session.duration,
                session.total_break_minutes(),
                session.emotional_alerts.len()
            );
        }
        Ok::<(), anyhow::Error>(())
    })
}
