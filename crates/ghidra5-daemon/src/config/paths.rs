use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::constants::default_data_dir;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    /// The bridge worker program the supervisor keeps alive.
    pub worker_script: PathBuf,
    /// Interpreter to run the worker with (e.g. a Python executable).
    /// When unset the worker program is executed directly.
    pub interpreter: Option<PathBuf>,
    /// Alternative locations tried when `worker_script` does not exist.
    pub worker_fallbacks: Vec<PathBuf>,
    pub log_path: PathBuf,
    pub project_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            worker_script: data_dir.join("src").join("mcp_ghidra_server.py"),
            interpreter: None,
            worker_fallbacks: Vec::new(),
            log_path: data_dir.join("logs"),
            project_dir: data_dir.join("projects"),
            data_dir,
        }
    }
}
