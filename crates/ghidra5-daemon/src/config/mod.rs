mod constants;
mod logging;
mod paths;
mod server;
mod service;
mod svc;
mod types;

pub use constants::*;
pub use logging::LoggingConfig;
pub use paths::PathsConfig;
pub use server::ServerConfig;
pub use service::SupervisionConfig;
pub use svc::SvcConfig;
pub use types::LogLevel;
