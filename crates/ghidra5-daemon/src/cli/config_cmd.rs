use ghidra5_types::{SvcError, SvcResult};
use std::path::Path;

use super::commands::ConfigAction;
use ghidra5_daemon::SvcConfig;

pub fn handle_config(config_path: &Path, action: Option<ConfigAction>) -> SvcResult<()> {
    match action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => {
            let config = SvcConfig::load(config_path)?;
            let rendered = toml::to_string_pretty(&config.redacted())
                .map_err(|e| SvcError::Config(format!("Failed to render config: {}", e)))?;
            println!("{}", rendered);
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                return Err(SvcError::Config(format!(
                    "{} already exists (use --force to overwrite)",
                    config_path.display()
                )));
            }
            SvcConfig::default().save(config_path)?;
            println!("Wrote default configuration to {}", config_path.display());
        }
    }
    Ok(())
}
