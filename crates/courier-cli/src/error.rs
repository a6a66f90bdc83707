//! CLI error handling.

use std::io;
use std::process::ExitCode;

use courier_client::GatewayError;
use courier_common_config::{ConfigError, EnvError};
use courier_http::HttpError;
use thiserror::Error;

/// CLI error type with context.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        hint: Option<String>,
    },

    #[error("{message}")]
    Io {
        message: String,
        #[source]
        source: io::Error,
    },

    #[error("{message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        url: Option<String>,
    },

    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Configuration error with a hint.
    pub fn config(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
            hint: Some(hint.into()),
        }
    }

    /// Validation error for `field`.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Network error for a request to `url`.
    pub fn network(url: impl Into<String>, source: HttpError) -> Self {
        Self::Network {
            message: source.to_string(),
            source: Some(Box::new(source)),
            url: Some(url.into()),
        }
    }

    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "E001",
            Self::Io { .. } => "E002",
            Self::Network { .. } => "E003",
            Self::Validation { .. } => "E004",
            Self::Other(_) => "E999",
        }
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }

    /// Numeric exit status for this error.
    pub fn exit_status(&self) -> u8 {
        match self {
            Self::Config { .. } => 2,
            Self::Io { .. } => 3,
            Self::Network { .. } => 4,
            Self::Validation { .. } => 5,
            Self::Other(_) => 1,
        }
    }

    /// Get hint for this error if available.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Config { hint, .. } => hint.as_deref(),
            Self::Network { .. } => Some("check connectivity and the configured base URL"),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        let hint = match &err {
            ConfigError::NotFound { .. } => Some("pass --config with an existing file".to_string()),
            ConfigError::EnvVarNotFound { var } => Some(format!("export {var} or give it a default")),
            _ => None,
        };
        Self::Config {
            message: err.to_string(),
            source: Some(Box::new(err)),
            hint,
        }
    }
}

impl From<EnvError> for CliError {
    fn from(err: EnvError) -> Self {
        Self::Config {
            message: err.to_string(),
            source: Some(Box::new(err)),
            hint: None,
        }
    }
}

impl From<GatewayError> for CliError {
    fn from(err: GatewayError) -> Self {
        let hint = match &err {
            GatewayError::MissingSetting(field) => Some(format!("set {field} in .courier/config.yaml")),
            _ => None,
        };
        Self::Config {
            message: err.to_string(),
            source: Some(Box::new(err)),
            hint,
        }
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_status_mapping() {
        assert_eq!(CliError::config("bad", "fix it").exit_status(), 2);
        assert_eq!(
            CliError::network("https://x", HttpError::RetryLimitExceeded { attempts: 3 }).exit_status(),
            4
        );
        assert_eq!(CliError::validation("retry", "must be positive").exit_status(), 5);
        assert_eq!(CliError::Other(anyhow::anyhow!("boom")).exit_status(), 1);
    }

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            CliError::config("a", "b"),
            CliError::validation("f", "m"),
            CliError::from(io::Error::new(io::ErrorKind::Other, "io")),
            CliError::Other(anyhow::anyhow!("x")),
        ];
        let mut codes: Vec<_> = errors.iter().map(CliError::code).collect();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_config_error_hint() {
        let err = CliError::from(ConfigError::NotFound {
            path: PathBuf::from("missing.yaml"),
        });
        assert!(err.hint().unwrap().contains("--config"));
        assert_eq!(err.to_string(), "config file not found: missing.yaml");
    }

    #[test]
    fn test_missing_setting_hint_names_field() {
        let err = CliError::from(GatewayError::MissingSetting("http.base_url"));
        assert!(err.hint().unwrap().contains("http.base_url"));
    }

    #[test]
    fn test_network_message_is_http_error() {
        let err = CliError::network("https://x", HttpError::RetryLimitExceeded { attempts: 3 });
        assert_eq!(err.to_string(), "Retry limit has been exceeded. Try again later.");
    }
}
