//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};
use courier_common_config::{ConfigLoader, CourierConfig, Environment};

use crate::commands::{self, ConfigCommand, GetCommand, PostCommand};
use crate::error::CliError;

/// Courier - resilient HTTP client
///
/// Send requests with retry and fetch cached gateway configuration.
#[derive(Debug, Parser)]
#[command(
    name = "courier",
    author,
    version,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Increase verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "COURIER_CONFIG_PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "text", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a GET request
    Get(GetCommand),

    /// Send a POST request with a JSON body
    Post(PostCommand),

    /// Fetch the gateway configuration
    Config(ConfigCommand),
}

/// State shared by every command.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: CourierConfig,
    pub format: OutputFormat,
}

impl Cli {
    /// Load `.env` files and the configuration file.
    pub fn load_config(&self) -> Result<CourierConfig, CliError> {
        Environment::init()?;
        let loader = ConfigLoader::default();
        let config = match &self.config {
            Some(path) => loader.load_from(path)?,
            None => loader.load()?,
        };
        Ok(config)
    }

    /// Run the selected command.
    pub fn execute(self, config: CourierConfig) -> Result<(), CliError> {
        let ctx = CommandContext {
            config,
            format: self.format,
        };
        match self.command {
            Command::Get(cmd) => commands::get(&ctx, cmd),
            Command::Post(cmd) => commands::post(&ctx, cmd),
            Command::Config(cmd) => commands::config(&ctx, cmd),
        }
    }
}
