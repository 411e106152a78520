use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use vigil_config::ConfigLoader;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "vigil-node")]
#[command(
    about = "Runs agent containers on demand and inspects the node's own data pipeline"
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to the TOML configuration file (defaults to vigil.toml or
    /// config/vigil.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path to a .env file loaded before VIGIL_* variables are read
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn loader(&self) -> ConfigLoader {
        let mut loader = ConfigLoader::new();
        if let Some(path) = &self.config {
            loader = loader.with_config_path(path);
        }
        if let Some(path) = &self.env_file {
            loader = loader.with_env_file(path);
        }
        loader
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Start the node (default)
    Run,
    /// Load and validate the configuration, print it as JSON and exit
    CheckConfig,
}
