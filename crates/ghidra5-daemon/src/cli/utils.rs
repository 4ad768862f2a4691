use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use super::commands::Cli;

/// Initialize the tracing subscriber from CLI flags. `GHIDRA5_LOG` takes
/// precedence over the verbosity flags when set.
pub fn init_logging(cli: &Cli) {
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_env("GHIDRA5_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    match &cli.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .unwrap_or_else(|e| {
                    eprintln!("Failed to open log file {:?}: {}", path, e);
                    std::process::exit(1);
                });
            let writer = Arc::new(file);
            if cli.log_json {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .with_ansi(false)
                    .init();
            }
        }
        None => {
            if cli.log_json {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(filter)
                    .init();
            } else {
                tracing_subscriber::fmt().with_env_filter(filter).init();
            }
        }
    }
}
