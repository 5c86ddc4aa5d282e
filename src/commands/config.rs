use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{ArgAction, Subcommand};
use dronegrid::{SimConfig, load_config, save_config};

use super::config_path;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Write the default config file
    Init {
        /// Target path (default: .dronegrid/config.json)
        #[arg(long)]
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
    /// Print the effective config (file values over defaults)
    Show {
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

pub fn run_config(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Init { path, force } => {
            let path = config_path(path);
            if path.exists() && !force {
                bail!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                );
            }
            save_config(&path, &SimConfig::default())?;
            println!("Wrote default config to {}", path.display());
            Ok(())
        }
        ConfigCommand::Show { path } => {
            let path = config_path(path);
            let config = load_config(&path)?;
            config.validate()?;
            let source = if path.exists() { "file" } else { "defaults" };
            println!("# {} ({})", path.display(), source);
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
