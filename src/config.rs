use std::{env, path::PathBuf, time::Duration};

use crate::{db::HISTORY_LIMIT, detection::DetectorMode};

const DATA_DIR_VAR: &str = "BREAKWISE_DATA_DIR";
const DEBUG_VAR: &str = "BREAKWISE_DEBUG";
const DATABASE_FILE: &str = "breakwise.sqlite3";

/// Runtime configuration for the tracker and its background loops.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub data_dir: PathBuf,
    /// Period of the session clock; each tick adds one work minute.
    pub tick_interval: Duration,
    pub live_detection_interval: Duration,
    pub simulated_detection_interval: Duration,
    /// How long a break suggestion waits for a decision before it counts as dismissed.
    pub suggestion_timeout: Duration,
    pub history_limit: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            tick_interval: Duration::from_secs(60),
            live_detection_interval: Duration::from_secs(1),
            simulated_detection_interval: Duration::from_secs(3),
            suggestion_timeout: Duration::from_secs(30),
            history_limit: HISTORY_LIMIT,
        }
    }
}

impl TrackerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    ///
    /// `BREAKWISE_DATA_DIR` overrides the data directory. `BREAKWISE_DEBUG=1`
    /// makes the session clock tick every second so a "minute" passes quickly.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(DATA_DIR_VAR).filter(|dir| !dir.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }

        let debug_mode = lookup(DEBUG_VAR)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug_mode {
            config.tick_interval = Duration::from_secs(1);
        }

        config
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn detection_interval(&self, mode: DetectorMode) -> Duration {
        match mode {
            DetectorMode::Live => self.live_detection_interval,
            DetectorMode::Simulated => self.simulated_detection_interval,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("breakwise")
}
