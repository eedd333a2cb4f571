use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};
use graphene_core::HostConfig;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Show configuration and data paths
    Path,
}

pub fn run(args: &ConfigArgs, config: &HostConfig, config_path: &Path) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(config),
        ConfigCommands::Path => show_paths(config, config_path),
    }
}

fn show_config(config: &HostConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{}", toml_str);
    Ok(())
}

fn show_paths(config: &HostConfig, config_path: &Path) -> Result<()> {
    println!("Config file:    {}", config_path.display());
    println!("Extensions dir: {}", config.extensions_dir.display());
    println!("Log file:       {}", config.log_file.display());
    Ok(())
}
