use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "ghidra5d")]
#[command(version = BUILD_VERSION)]
#[command(about = "MCP-Ghidra5 supervisor - keeps the Ghidra/LLM bridge worker alive")]
#[command(long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(short, long, global = true, value_name = "FILE", help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[arg(short = 'd', long, global = true, value_name = "DIR", env = "GHIDRA5_DATA_DIR", help = "Data directory path")]
    pub data_dir: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase verbosity (-v, -vv, -vvv)")]
    pub verbose: u8,

    #[arg(short, long, global = true, help = "Suppress non-error output")]
    pub quiet: bool,

    #[arg(long, global = true, value_name = "FILE", help = "Write logs to file")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub log_json: bool,

    #[arg(long, global = true, default_value = "text", help = "Output format")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the supervisor")]
    #[command(long_about = "Start the supervisor daemon.\n\nLaunches the MCP-Ghidra5 bridge worker, monitors its health and restarts it after crashes with exponential backoff.")]
    Run {
        #[arg(long, value_name = "FILE", help = "Write PID to file")]
        pid_file: Option<PathBuf>,
    },

    #[command(about = "Show running status")]
    Status,

    #[command(about = "Manage configuration")]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    #[command(about = "Show version information")]
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    #[command(about = "Print the effective configuration (credentials redacted)")]
    Show,
    #[command(about = "Print the config file path")]
    Path,
    #[command(about = "Write the default configuration file")]
    Init {
        #[arg(short, long, help = "Overwrite an existing configuration")]
        force: bool,
    },
}
