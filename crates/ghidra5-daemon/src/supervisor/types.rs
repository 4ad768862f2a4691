use chrono::{DateTime, Utc};
use std::time::Instant;
use tokio::process::Child;

/// Hard ceiling on the computed restart delay.
pub const RESTART_DELAY_CAP_SECS: u64 = 300;

/// Fixed CPU threshold above which a resource warning is emitted.
pub const CPU_WARN_THRESHOLD: f32 = 80.0;

/// Pause after a failed metrics sample before the monitor tries again.
pub const MONITOR_ERROR_COOLDOWN_SECS: u64 = 5;

/// The supervised child process. Replaced wholesale on every restart,
/// never mutated in place; dropping it after a confirmed kill releases
/// the OS handle.
pub struct WorkerHandle {
    child: Child,
    pid: u32,
    launched_at: DateTime<Utc>,
}

impl WorkerHandle {
    pub fn new(child: Child, pid: u32) -> Self {
        Self {
            child,
            pid,
            launched_at: Utc::now(),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn launched_at(&self) -> DateTime<Utc> {
        self.launched_at
    }

    /// Non-blocking liveness probe. Returns the exit code once the worker
    /// has terminated, reaping it in the process.
    pub fn try_wait(&mut self) -> std::io::Result<Option<i32>> {
        Ok(self.child.try_wait()?.map(|status| status.code().unwrap_or(-1)))
    }

    pub async fn wait(&mut self) -> std::io::Result<i32> {
        let status = self.child.wait().await?;
        Ok(status.code().unwrap_or(-1))
    }

    /// Cooperative termination request. Returns false when the platform
    /// has no terminate signal, in which case the caller should escalate
    /// to `kill` directly.
    pub fn terminate(&self) -> bool {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM).is_ok()
        }
        #[cfg(not(unix))]
        {
            false
        }
    }

    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("pid", &self.pid)
            .field("launched_at", &self.launched_at)
            .finish()
    }
}

/// Restart accounting, mutated only by the policy engine from the
/// supervisor's control flow.
#[derive(Clone, Debug, Default)]
pub struct RestartState {
    pub count: u32,
    pub window_start: Option<Instant>,
    pub last_restart: Option<Instant>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartDecision {
    Allow(std::time::Duration),
    Deny,
}

/// Signals from the health monitor to the supervisor. The monitor never
/// mutates supervisor state directly; these are its only output.
#[derive(Clone, Debug, PartialEq)]
pub enum MonitorEvent {
    WorkerExited { pid: u32, exit_code: i32 },
    ResourceWarning { pid: u32, warning: ResourceWarning },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ResourceWarning {
    MemoryCeiling { used_mb: f64, limit_mb: u64 },
    HighCpu { percent: f32 },
}

impl std::fmt::Display for ResourceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemoryCeiling { used_mb, limit_mb } => write!(
                f,
                "memory usage ({:.1}MB) exceeds limit ({}MB)",
                used_mb, limit_mb
            ),
            Self::HighCpu { percent } => write!(f, "high CPU usage: {:.1}%", percent),
        }
    }
}
