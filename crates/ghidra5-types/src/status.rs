use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of the supervisor.
///
/// `Failed` is terminal and only reachable from `Restarting` when the
/// restart policy denies a further attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Stopped,
    Starting,
    Running,
    Restarting,
    Stopping,
    Failed,
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Restarting => "restarting",
            Self::Stopping => "stopping",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// On-demand sample of the worker process, taken when a status snapshot is
/// requested rather than stored persistently.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerProcessStatus {
    pub pid: u32,
    pub memory_mb: f64,
    pub cpu_percent: f32,
    pub started_at: DateTime<Utc>,
}

/// Read-only snapshot exposed for external monitoring tooling.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SupervisorStatus {
    pub service_name: String,
    pub display_name: String,
    pub state: SupervisorState,
    pub restart_count: u32,
    pub last_restart: Option<DateTime<Utc>>,
    pub worker: Option<WorkerProcessStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&SupervisorState::Restarting).unwrap();
        assert_eq!(json, "\"restarting\"");
    }

    #[test]
    fn status_round_trips() {
        let status = SupervisorStatus {
            service_name: "ghidra5-svc".into(),
            display_name: "MCP Ghidra5 Server".into(),
            state: SupervisorState::Running,
            restart_count: 2,
            last_restart: Some(Utc::now()),
            worker: Some(WorkerProcessStatus {
                pid: 4242,
                memory_mb: 512.5,
                cpu_percent: 12.0,
                started_at: Utc::now(),
            }),
        };
        let json = serde_json::to_string(&status).unwrap();
        let parsed: SupervisorStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.state, SupervisorState::Running);
        assert_eq!(parsed.restart_count, 2);
        assert_eq!(parsed.worker.unwrap().pid, 4242);
    }
}
