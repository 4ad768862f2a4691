use ghidra5_types::{SvcError, SvcResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use super::logging::LoggingConfig;
use super::paths::PathsConfig;
use super::server::ServerConfig;
use super::service::SupervisionConfig;
use super::types::LogLevel;

/// Resolved daemon configuration: defaults, then the TOML file, then
/// `GHIDRA5_*` environment overrides. Constructed once at startup and
/// passed by reference into the supervisor; nothing looks it up ambiently.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SvcConfig {
    pub server: ServerConfig,
    pub service: SupervisionConfig,
    pub paths: PathsConfig,
    pub logging: LoggingConfig,
}

impl Default for SvcConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            service: SupervisionConfig::default(),
            paths: PathsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SvcConfig {
    pub fn load(path: impl AsRef<std::path::Path>) -> SvcResult<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| SvcError::Config(format!("Failed to read config: {}", e)))?;

            toml::from_str(&contents)
                .map_err(|e| SvcError::Config(format!("Failed to parse config: {}", e)))?
        } else {
            info!("Config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<std::path::Path>) -> SvcResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| SvcError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SvcError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path.as_ref(), contents)
            .map_err(|e| SvcError::Config(format!("Failed to write config: {}", e)))?;

        info!("Configuration saved to {:?}", path.as_ref());
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `GHIDRA5_*` overrides from an arbitrary variable source.
    pub(crate) fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = get("GHIDRA5_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(dir);
        }

        if let Some(host) = get("GHIDRA5_HOST") {
            self.server.host = host;
        }

        if let Some(port) = get("GHIDRA5_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        if let Some(level) = get("GHIDRA5_LOG_LEVEL") {
            self.server.log_level = LogLevel::from_str_lossy(&level);
            self.logging.level = self.server.log_level;
        }

        if get("GHIDRA5_LOG_JSON").is_some() {
            self.logging.json = true;
        }

        if let Some(key) = get("GHIDRA5_API_KEY") {
            self.server.api_key = key;
        }

        if let Some(path) = get("GHIDRA5_GHIDRA_PATH") {
            self.server.ghidra_path = PathBuf::from(path);
        }

        if let Some(script) = get("GHIDRA5_WORKER") {
            self.paths.worker_script = PathBuf::from(script);
        }

        if let Some(auto) = get("GHIDRA5_AUTO_RESTART") {
            self.service.auto_restart =
                matches!(auto.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
    }

    pub fn validate(&self) -> SvcResult<()> {
        if self.server.port == 0 {
            return Err(SvcError::Config("Worker port cannot be 0".into()));
        }

        if self.service.health_check_interval_secs == 0 {
            return Err(SvcError::Config(
                "Health check interval must be at least 1 second".into(),
            ));
        }

        if self.service.shutdown_timeout_secs == 0 {
            return Err(SvcError::Config(
                "Shutdown timeout must be at least 1 second".into(),
            ));
        }

        if self.service.max_restarts == 0 {
            return Err(SvcError::Config(
                "max_restarts must be at least 1; disable auto_restart instead".into(),
            ));
        }

        if self.service.restart_delay_secs == 0 {
            return Err(SvcError::Config(
                "restart_delay_secs must be at least 1 second".into(),
            ));
        }

        Ok(())
    }

    /// Copy with the API credential masked, safe to print or serialize.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.server.api_key.is_empty() {
            copy.server.api_key = "***redacted***".to_string();
        }
        copy
    }
}
