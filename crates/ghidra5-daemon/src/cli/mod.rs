mod commands;
mod config_cmd;
mod run;
mod status;
mod utils;

pub use commands::{Cli, Commands, ConfigAction, OutputFormat};
pub use config_cmd::handle_config;
pub use run::run_daemon;
pub use status::show_status;
pub use utils::init_logging;

pub fn show_version() {
    println!(
        "{} v{}",
        ghidra5_types::SERVICE_DISPLAY_NAME,
        env!("CARGO_PKG_VERSION")
    );
}
