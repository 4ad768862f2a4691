use std::path::PathBuf;

pub const DEFAULT_WORKER_HOST: &str = "localhost";

pub const DEFAULT_WORKER_PORT: u16 = 8765;

pub const DEFAULT_MAX_MEMORY_MB: u64 = 2048;

pub const DEFAULT_RESTART_DELAY_SECS: u64 = 30;

pub const DEFAULT_MAX_RESTARTS: u32 = 5;

pub const DEFAULT_RESTART_WINDOW_SECS: u64 = 3600;

pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 60;

pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 15;

/// Default location for worker program, logs and Ghidra projects.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".ghidra5"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/ghidra5"))
}
