use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::constants::{DEFAULT_MAX_MEMORY_MB, DEFAULT_WORKER_HOST, DEFAULT_WORKER_PORT};
use super::types::LogLevel;

/// Settings handed to the bridge worker through its environment.
///
/// The API key is injected as `OPENAI_API_KEY` into the child environment,
/// never passed on the command line, so it does not show up in process
/// listings. Best effort only: the environment of a process is still
/// readable by its owner.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: LogLevel,
    pub ghidra_path: PathBuf,
    pub api_key: String,
    pub max_memory_mb: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_WORKER_HOST.to_string(),
            port: DEFAULT_WORKER_PORT,
            log_level: LogLevel::Info,
            ghidra_path: PathBuf::new(),
            api_key: String::new(),
            max_memory_mb: DEFAULT_MAX_MEMORY_MB,
        }
    }
}
