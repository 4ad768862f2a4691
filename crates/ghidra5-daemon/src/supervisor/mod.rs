mod core;
mod launcher;
mod monitor;
mod policy;
mod shutdown;
mod types;

pub use self::core::{Supervisor, SupervisorHandle};
pub use launcher::WorkerLauncher;
pub use monitor::HealthMonitor;
pub use policy::RestartPolicy;
pub use shutdown::ShutdownSignal;
pub use types::*;
