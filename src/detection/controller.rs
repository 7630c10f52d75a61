use anyhow::Result;
use log::info;

use crate::{config::TrackerConfig, tracking::SessionTracker, utils::PeriodicTask};

use super::types::{DetectorMode, EmotionDetector};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Owns the detection loop: polls the detector every tick and feeds the
/// results to the tracker.
pub struct DetectionController {
    task: PeriodicTask,
    mode: Option<DetectorMode>,
}

impl DetectionController {
    pub fn new() -> Self {
        Self {
            task: PeriodicTask::new("detection"),
            mode: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    pub fn mode(&self) -> Option<DetectorMode> {
        self.mode
    }

    pub fn start(
        &mut self,
        tracker: SessionTracker,
        mut detector: Box<dyn EmotionDetector>,
        config: &TrackerConfig,
    ) {
        let mode = detector.mode();
        let period = config.detection_interval(mode);
        info!("Starting {mode:?} emotion detection every {period:?}");

        self.task.start(period, move || {
            let faces = match detector.detect() {
                Ok(faces) => faces,
                Err(err) => {
                    log_warn!("emotion detection failed: {err:#}");
                    Vec::new()
                }
            };
            log_debug!("detection tick: {} face(s)", faces.len());

            let tracker = tracker.clone();
            async move {
                tracker.on_detection_tick(faces).await;
            }
        });
        self.mode = Some(mode);
    }

    pub async fn stop(&mut self) -> Result<()> {
        if self.mode.take().is_some() {
            info!("Stopping emotion detection");
        }
        self.task.stop().await
    }
}

impl Default for DetectionController {
    fn default() -> Self {
        Self::new()
    }
}
