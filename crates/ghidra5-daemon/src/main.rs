mod cli;

use clap::Parser;
use cli::{handle_config, init_logging, run_daemon, show_status, show_version, Cli, Commands};
use ghidra5_daemon::config::default_data_dir;
use ghidra5_types::SvcResult;

#[tokio::main]
async fn main() -> SvcResult<()> {
    let cli = Cli::parse();

    init_logging(&cli);

    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| data_dir.join("service.toml"));

    match cli.command {
        Commands::Run { pid_file } => {
            run_daemon(&config_path, &data_dir, pid_file).await?;
        }
        Commands::Status => {
            show_status(&data_dir, cli.format)?;
        }
        Commands::Config { action } => {
            handle_config(&config_path, action)?;
        }
        Commands::Version => {
            show_version();
        }
    }

    Ok(())
}
