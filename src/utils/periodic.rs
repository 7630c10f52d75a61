use std::future::Future;

use anyhow::{Context, Result};
use tokio::{
    task::JoinHandle,
    time::{self, Duration, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// A background task that runs a callback every `period` until cancelled.
///
/// The first tick fires one full period after `start`, so restarting the task
/// (e.g. when a break ends) begins a fresh period rather than ticking at once.
pub struct PeriodicTask {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl PeriodicTask {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Spawns the loop, replacing any loop already running. Must be called
    /// from within a tokio runtime.
    pub fn start<F, Fut>(&mut self, period: Duration, mut on_tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.abort();

        let period = period.max(Duration::from_millis(1));
        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();
        let name = self.name;

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

            loop {
                tokio::select! {
                    biased;
                    _ = token_clone.cancelled() => {
                        log_debug!("{name} loop shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        on_tick().await;
                    }
                }
            }
        });

        log_debug!("{name} loop started with period {:?}", period);
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
    }

    /// Cancels the loop and waits for an in-flight tick to finish.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .with_context(|| format!("{} loop failed to join", self.name))?;
        }
        Ok(())
    }

    fn abort(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}
