//! Environment variable handling.

use std::env;
use std::path::Path;
use thiserror::Error;

/// Environment variable errors.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("required environment variable not set: {var}")]
    NotSet { var: String },

    #[error("invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("failed to load .env file: {0}")]
    DotenvError(#[from] dotenvy::Error),
}

/// Environment variable names.
pub mod vars {
    // Gateway
    pub const COURIER_BASE_URL: &str = "COURIER_BASE_URL";
    pub const COURIER_CONFIG_URL: &str = "COURIER_CONFIG_URL";
    pub const COURIER_AUTHORIZATION: &str = "COURIER_AUTHORIZATION";

    // Configuration
    pub const COURIER_CONFIG_PATH: &str = "COURIER_CONFIG_PATH";
    pub const COURIER_CACHE_PATH: &str = "COURIER_CACHE_PATH";
    pub const COURIER_LOG_LEVEL: &str = "COURIER_LOG_LEVEL";
    pub const COURIER_ENV: &str = "COURIER_ENV";

    // Development
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const RUST_BACKTRACE: &str = "RUST_BACKTRACE";
}

/// Environment configuration.
pub struct Environment {
    _guard: (),
}

impl Environment {
    /// Initialize environment from .env files in the working directory.
    pub fn init() -> Result<Self, EnvError> {
        Self::init_from(env::current_dir().unwrap_or_default())
    }

    /// Initialize environment from .env files in `dir`.
    ///
    /// Files load in order `.env`, `.env.local`, `.env.<COURIER_ENV>`.
    /// Variables already set are never overwritten, so earlier sources win.
    pub fn init_from(dir: impl AsRef<Path>) -> Result<Self, EnvError> {
        let dir = dir.as_ref();
        load_optional(&dir.join(".env"))?;
        load_optional(&dir.join(".env.local"))?;

        if let Ok(name) = env::var(vars::COURIER_ENV) {
            load_optional(&dir.join(format!(".env.{name}")))?;
        }

        Ok(Self { _guard: () })
    }

    /// Get a required string variable.
    pub fn require(var: &str) -> Result<String, EnvError> {
        env::var(var).map_err(|_| EnvError::NotSet {
            var: var.to_string(),
        })
    }

    /// Get an optional string variable. Empty values count as unset.
    pub fn get(var: &str) -> Option<String> {
        env::var(var).ok().filter(|v| !v.is_empty())
    }

    /// Get a variable with a default value.
    pub fn get_or(var: &str, default: &str) -> String {
        Self::get(var).unwrap_or_else(|| default.to_string())
    }

    /// Get a boolean variable.
    pub fn get_bool(var: &str) -> Option<bool> {
        env::var(var)
            .ok()
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
    }

    /// Get an integer variable.
    pub fn get_int<T: std::str::FromStr>(var: &str) -> Result<Option<T>, EnvError> {
        match env::var(var) {
            Ok(v) => v.parse().map(Some).map_err(|_| EnvError::InvalidValue {
                var: var.to_string(),
                message: "expected integer".to_string(),
            }),
            Err(_) => Ok(None),
        }
    }

    /// Check if running in production mode.
    pub fn is_production() -> bool {
        env::var(vars::COURIER_ENV)
            .map(|v| v == "production")
            .unwrap_or(false)
    }
}

fn load_optional(path: &Path) -> Result<(), EnvError> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(()),
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ENV_LOCK;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_get_or_default() {
        let val = Environment::get_or("COURIER_NONEXISTENT_VAR_12345", "default");
        assert_eq!(val, "default");
    }

    #[test]
    fn test_bool_parsing() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::set_var("COURIER_TEST_BOOL", "true");
        assert_eq!(Environment::get_bool("COURIER_TEST_BOOL"), Some(true));
        env::set_var("COURIER_TEST_BOOL", "1");
        assert_eq!(Environment::get_bool("COURIER_TEST_BOOL"), Some(true));
        env::set_var("COURIER_TEST_BOOL", "false");
        assert_eq!(Environment::get_bool("COURIER_TEST_BOOL"), Some(false));
        env::remove_var("COURIER_TEST_BOOL");
        assert_eq!(Environment::get_bool("COURIER_TEST_BOOL"), None);
    }

    #[test]
    fn test_empty_value_counts_as_unset() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::set_var("COURIER_TEST_EMPTY", "");
        assert_eq!(Environment::get("COURIER_TEST_EMPTY"), None);
        env::remove_var("COURIER_TEST_EMPTY");
    }

    #[test]
    fn test_require() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::remove_var("COURIER_TEST_REQUIRED");
        assert!(matches!(
            Environment::require("COURIER_TEST_REQUIRED"),
            Err(EnvError::NotSet { .. })
        ));

        env::set_var("COURIER_TEST_REQUIRED", "value");
        assert_eq!(Environment::require("COURIER_TEST_REQUIRED").unwrap(), "value");
        env::remove_var("COURIER_TEST_REQUIRED");
    }

    #[test]
    fn test_integer_parsing() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::set_var("COURIER_TEST_INT", "42");
        let val: Result<Option<i32>, _> = Environment::get_int("COURIER_TEST_INT");
        assert_eq!(val.unwrap(), Some(42));

        env::set_var("COURIER_TEST_INT", "invalid");
        let val: Result<Option<i32>, _> = Environment::get_int("COURIER_TEST_INT");
        assert!(val.is_err());

        env::remove_var("COURIER_TEST_INT");
        let val: Result<Option<i32>, _> = Environment::get_int("COURIER_TEST_INT");
        assert_eq!(val.unwrap(), None);
    }

    #[test]
    fn test_production_detection() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::remove_var(vars::COURIER_ENV);
        assert!(!Environment::is_production());

        env::set_var(vars::COURIER_ENV, "production");
        assert!(Environment::is_production());

        env::remove_var(vars::COURIER_ENV);
    }

    #[test]
    fn test_init_without_env_files() {
        let dir = tempdir().unwrap();
        assert!(Environment::init_from(dir.path()).is_ok());
    }

    #[test]
    fn test_dotenv_file_loading() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".env"), "COURIER_TEST_DOTENV=from_dotenv\n").unwrap();
        fs::write(
            dir.path().join(".env.local"),
            "COURIER_TEST_DOTENV=from_local\nCOURIER_TEST_LOCAL=local\n",
        )
        .unwrap();
        env::remove_var("COURIER_TEST_DOTENV");
        env::remove_var("COURIER_TEST_LOCAL");

        Environment::init_from(dir.path()).unwrap();

        assert_eq!(
            Environment::get("COURIER_TEST_DOTENV"),
            Some("from_dotenv".to_string())
        );
        assert_eq!(Environment::get("COURIER_TEST_LOCAL"), Some("local".to_string()));

        env::remove_var("COURIER_TEST_DOTENV");
        env::remove_var("COURIER_TEST_LOCAL");
    }

    #[test]
    fn test_malformed_dotenv_is_an_error() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".env"), "COURIER_TEST_BAD='unterminated\n").unwrap();

        assert!(matches!(
            Environment::init_from(dir.path()),
            Err(EnvError::DotenvError(_))
        ));
    }
}
