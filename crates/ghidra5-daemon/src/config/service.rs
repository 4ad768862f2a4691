use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::constants::{
    DEFAULT_HEALTH_CHECK_INTERVAL_SECS, DEFAULT_MAX_RESTARTS, DEFAULT_RESTART_DELAY_SECS,
    DEFAULT_RESTART_WINDOW_SECS, DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};

/// Supervision behavior: restart policy inputs, monitoring cadence and
/// shutdown handling.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisionConfig {
    /// Relaunch the worker when it exits. When disabled a worker exit is
    /// treated as a shutdown request.
    pub auto_restart: bool,
    /// Base delay before the first relaunch; doubles per attempt.
    pub restart_delay_secs: u64,
    /// Restart attempts tolerated inside the restart window before the
    /// supervisor gives up.
    pub max_restarts: u32,
    /// Sliding window over which restart attempts are counted.
    pub restart_window_secs: u64,
    pub health_check_interval_secs: u64,
    /// Grace period between the terminate signal and a forced kill.
    pub shutdown_timeout_secs: u64,
    pub enable_monitoring: bool,
}

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self {
            auto_restart: true,
            restart_delay_secs: DEFAULT_RESTART_DELAY_SECS,
            max_restarts: DEFAULT_MAX_RESTARTS,
            restart_window_secs: DEFAULT_RESTART_WINDOW_SECS,
            health_check_interval_secs: DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            enable_monitoring: true,
        }
    }
}

impl SupervisionConfig {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }

    pub fn restart_window(&self) -> Duration {
        Duration::from_secs(self.restart_window_secs)
    }
}
