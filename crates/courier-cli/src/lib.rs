//! Courier CLI library
//!
//! Argument parsing, commands and output for the `courier` binary.

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use error::CliError;
