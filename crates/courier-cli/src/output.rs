//! Output formatting utilities for CLI commands.

use serde::Serialize;
use std::io::Write;

use crate::cli::{CommandContext, OutputFormat};
use crate::error::CliError;

/// Trait for types that can be formatted for output
pub trait FormattedOutput {
    fn format_text(&self) -> String;
    fn format_json(&self) -> Result<String, serde_json::Error>;
}

/// Print formatted output to stdout
pub fn print_output<T>(ctx: &CommandContext, value: &T) -> Result<(), CliError>
where
    T: FormattedOutput + Serialize,
{
    write_output(ctx.format, value, std::io::stdout().lock())
}

/// Print formatted output to a writer
pub fn write_output<T, W>(format: OutputFormat, value: &T, mut writer: W) -> Result<(), CliError>
where
    T: FormattedOutput + Serialize,
    W: Write,
{
    let output = match format {
        OutputFormat::Text => value.format_text(),
        OutputFormat::Json => value
            .format_json()
            .map_err(|e| CliError::Other(anyhow::anyhow!("JSON serialization failed: {e}")))?,
    };

    writeln!(writer, "{output}")?;
    Ok(())
}

/// A response body and where it came from.
#[derive(Debug, Serialize)]
pub struct ResponseOutput {
    pub url: String,
    /// The body as JSON when it parses, otherwise as a string.
    pub body: serde_json::Value,
    #[serde(skip)]
    raw: String,
}

impl ResponseOutput {
    pub fn new(url: impl Into<String>, raw: String) -> Self {
        let body = serde_json::from_str(&raw).unwrap_or_else(|_| serde_json::Value::String(raw.clone()));
        Self {
            url: url.into(),
            body,
            raw,
        }
    }
}

impl FormattedOutput for ResponseOutput {
    fn format_text(&self) -> String {
        self.raw.clone()
    }

    fn format_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
