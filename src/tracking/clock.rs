use std::time::Duration;

use anyhow::Result;

use crate::utils::PeriodicTask;

use super::controller::SessionTracker;

/// Minute ticker for the open session. Runs only while a session is open and
/// no break is in progress; the tracker starts and stops it on transitions.
pub struct SessionClock {
    task: PeriodicTask,
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            task: PeriodicTask::new("session clock"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    pub fn start(&mut self, tracker: SessionTracker, period: Duration) {
        self.task.start(period, move || {
            let tracker = tracker.clone();
            async move {
                tracker.on_clock_tick().await;
            }
        });
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.task.stop().await
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}
