use ghidra5_types::{SvcError, SvcResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

use super::types::WorkerHandle;
use crate::config::SvcConfig;

/// Spawns the bridge worker with its environment prepared from the
/// service configuration. Secrets and tool paths travel through the child
/// environment rather than argv so they stay out of process listings
/// (best effort, not a guarantee).
pub struct WorkerLauncher {
    config: Arc<SvcConfig>,
}

impl WorkerLauncher {
    pub fn new(config: Arc<SvcConfig>) -> Self {
        Self { config }
    }

    /// The configured worker program, or the first fallback location that
    /// exists. The original deployment shipped the bridge script under a
    /// couple of layout variants, so the fallbacks stay.
    pub fn resolve_program(&self) -> SvcResult<PathBuf> {
        let configured = &self.config.paths.worker_script;
        if configured.exists() {
            return Ok(configured.clone());
        }

        for candidate in &self.config.paths.worker_fallbacks {
            if candidate.exists() {
                debug!("Worker program resolved via fallback: {:?}", candidate);
                return Ok(candidate.clone());
            }
        }

        Err(SvcError::Launch(format!(
            "Worker program not found: {:?}",
            configured
        )))
    }

    fn build_command(&self, program: &Path) -> Command {
        let server = &self.config.server;
        let paths = &self.config.paths;

        let mut cmd = match &paths.interpreter {
            Some(interpreter) => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(program);
                cmd
            }
            None => Command::new(program),
        };

        if let Some(parent) = program.parent() {
            cmd.current_dir(parent);
        }

        cmd.env("GHIDRA_HEADLESS_PATH", &server.ghidra_path)
            .env("GHIDRA_PROJECT_DIR", &paths.project_dir)
            .env("MCP_GHIDRA5_HOST", &server.host)
            .env("MCP_GHIDRA5_PORT", server.port.to_string())
            .env("MCP_GHIDRA5_LOG_LEVEL", server.log_level.as_str())
            // Legacy name some bridge revisions still read.
            .env("GHIDRA_INSTALL_DIR", &server.ghidra_path);

        if !server.api_key.is_empty() {
            cmd.env("OPENAI_API_KEY", &server.api_key);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        // No console window when running as a background service.
        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd
    }

    pub fn launch(&self) -> SvcResult<WorkerHandle> {
        let program = self.resolve_program()?;
        let mut cmd = self.build_command(&program);

        let child = cmd
            .spawn()
            .map_err(|e| SvcError::Launch(format!("Failed to spawn {:?}: {}", program, e)))?;

        let pid = child
            .id()
            .ok_or_else(|| SvcError::Launch("Worker exited during spawn".into()))?;

        info!("Worker started with PID: {}", pid);
        Ok(WorkerHandle::new(child, pid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SvcConfig;

    #[cfg(unix)]
    fn config_with_script(contents: &str) -> (tempfile::TempDir, Arc<SvcConfig>) {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("worker.sh");
        let mut f = std::fs::File::create(&script).unwrap();
        writeln!(f, "{}", contents).unwrap();

        let mut config = SvcConfig::default();
        config.paths.worker_script = script;
        config.paths.interpreter = Some(PathBuf::from("/bin/sh"));
        config.paths.project_dir = dir.path().join("projects");
        (dir, Arc::new(config))
    }

    #[test]
    fn missing_program_is_a_launch_error() {
        let mut config = SvcConfig::default();
        config.paths.worker_script = PathBuf::from("/nonexistent/worker.py");
        let launcher = WorkerLauncher::new(Arc::new(config));
        match launcher.resolve_program() {
            Err(SvcError::Launch(_)) => {}
            other => panic!("expected launch error, got {:?}", other),
        }
    }

    #[test]
    fn fallback_location_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("alt_worker.sh");
        std::fs::write(&fallback, "exit 0\n").unwrap();

        let mut config = SvcConfig::default();
        config.paths.worker_script = dir.path().join("missing.sh");
        config.paths.worker_fallbacks = vec![fallback.clone()];
        let launcher = WorkerLauncher::new(Arc::new(config));
        assert_eq!(launcher.resolve_program().unwrap(), fallback);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn launched_worker_reports_exit_code() {
        let (_dir, config) = config_with_script("exit 7");
        let launcher = WorkerLauncher::new(config);
        let mut handle = launcher.launch().unwrap();
        assert_eq!(handle.wait().await.unwrap(), 7);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn worker_sees_injected_environment() {
        let (dir, config) = config_with_script(
            "test \"$MCP_GHIDRA5_PORT\" = \"8765\" || exit 1\n\
             test -n \"$MCP_GHIDRA5_HOST\" || exit 2\n\
             exit 0",
        );
        let launcher = WorkerLauncher::new(config);
        let mut handle = launcher.launch().unwrap();
        assert_eq!(handle.wait().await.unwrap(), 0);
        drop(dir);
    }
}
