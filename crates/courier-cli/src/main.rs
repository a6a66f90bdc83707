//! Courier CLI
//!
//! Main entry point for the `courier` binary.

use std::process::ExitCode;

use clap::Parser;
use courier_cli::cli::Cli;
use courier_cli::CliError;
use courier_common_log::LogConfig;
use tracing::error;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = courier_common_log::init(LogConfig::from_verbosity(cli.verbose, cli.quiet)) {
        eprintln!("warning: {e}");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(code = e.code(), "{e}");
            if let Some(hint) = e.hint() {
                eprintln!("hint: {hint}");
            }
            e.exit_code()
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.load_config()?;
    cli.execute(config)
}
