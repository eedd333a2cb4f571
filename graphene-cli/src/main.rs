use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use graphene_core::HostConfig;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "graphene", about = "Inspect and load graphene extension modules")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: ~/.config/graphene/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Extensions directory, overriding the configured one
    #[arg(long, global = true)]
    extensions_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List extension modules found in the extensions directory
    Modules,
    /// Run a full load cycle and report what was loaded
    Load(commands::load::LoadArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
}

impl Cli {
    fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(HostConfig::default_path)
    }

    /// Configuration file contents with command line overrides applied
    fn effective_config(&self) -> Result<HostConfig> {
        let mut config = HostConfig::load(&self.config_path())?;
        if let Some(dir) = &self.extensions_dir {
            config.extensions_dir = dir.clone();
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.effective_config()?;

    logging::init(&config.log_file, cli.verbose)?;

    match cli.command {
        Commands::Modules => commands::modules::run(&config),
        Commands::Load(ref args) => commands::load::run(args, &config),
        Commands::Config(ref args) => commands::config::run(args, &config, &cli.config_path()),
    }
}
