#![warn(clippy::all)]

//! Supervisor daemon for the MCP-Ghidra5 bridge worker.
//!
//! The daemon launches the Ghidra/LLM bridge server as a child process,
//! watches its liveness and resource usage, and relaunches it after
//! crashes under a sliding-window exponential-backoff policy.

pub mod config;
pub mod supervisor;

pub use config::{LogLevel, LoggingConfig, PathsConfig, ServerConfig, SupervisionConfig, SvcConfig};
pub use supervisor::{
    HealthMonitor, MonitorEvent, ResourceWarning, RestartDecision, RestartPolicy, RestartState,
    ShutdownSignal, Supervisor, SupervisorHandle, WorkerHandle, WorkerLauncher,
};
