use ghidra5_types::{SvcError, SvcResult, SERVICE_DISPLAY_NAME};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use ghidra5_daemon::{Supervisor, SvcConfig};

pub fn pid_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join(ghidra5_types::SERVICE_NAME).with_extension("pid")
}

pub async fn run_daemon(
    config_path: &Path,
    data_dir: &Path,
    pid_file: Option<PathBuf>,
) -> SvcResult<()> {
    info!("{} starting (v{})", SERVICE_DISPLAY_NAME, env!("CARGO_PKG_VERSION"));
    info!("Data directory: {:?}", data_dir);

    std::fs::create_dir_all(data_dir)
        .map_err(|e| SvcError::Config(format!("Failed to create data directory: {}", e)))?;

    if config_path.exists() {
        info!("Loading configuration from {:?}", config_path);
    }
    let mut config = SvcConfig::load(config_path)?;
    config.paths.data_dir = data_dir.to_path_buf();

    std::fs::create_dir_all(&config.paths.project_dir)
        .map_err(|e| SvcError::Config(format!("Failed to create project directory: {}", e)))?;

    let pid_path = pid_file.unwrap_or_else(|| pid_file_path(data_dir));
    std::fs::write(&pid_path, std::process::id().to_string())
        .map_err(|e| SvcError::Config(format!("Failed to write PID file: {}", e)))?;
    info!("PID file written: {:?}", pid_path);

    let mut supervisor = Supervisor::new(config);
    let handle = supervisor.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Service stop requested");
            handle.stop();
        }
    });

    let result = supervisor.run().await;

    let _ = std::fs::remove_file(&pid_path);

    match &result {
        Ok(()) => info!("Service stopped"),
        Err(e) => error!("Service execution error: {}", e),
    }
    result
}
