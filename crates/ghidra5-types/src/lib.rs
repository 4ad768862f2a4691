#![forbid(unsafe_code)]
#![warn(clippy::all)]

//! Shared types for the MCP-Ghidra5 supervisor service.

mod error;
mod status;

pub use error::{SvcError, SvcResult};
pub use status::{SupervisorState, SupervisorStatus, WorkerProcessStatus};

/// Service identifier used for the pid file and operator-facing output.
pub const SERVICE_NAME: &str = "ghidra5-svc";

/// Human-readable service name, kept from the original deployment.
pub const SERVICE_DISPLAY_NAME: &str = "MCP Ghidra5 Server";
