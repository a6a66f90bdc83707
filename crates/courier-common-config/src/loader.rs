//! Configuration file loading and parsing.

use crate::env::{vars, Environment};
use crate::types::CourierConfig;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory holding the project configuration.
pub const CONFIG_DIR: &str = ".courier";

/// Configuration file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.yaml";

const ENV_VAR_PATTERN: &str = r"\$\{([^}:]+)(?::-([^}]*))?\}";

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read config: {source}")]
    ReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ParseError { line: Option<usize>, message: String },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }
}

/// Configuration loader.
pub struct ConfigLoader {
    base_path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader for the given project directory.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            base_path: project_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the project configuration file.
    pub fn config_path(&self) -> PathBuf {
        self.base_path.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load configuration from `.courier/config.yaml`.
    ///
    /// A missing file yields the defaults. Environment overrides apply either
    /// way.
    pub fn load(&self) -> Result<CourierConfig, ConfigError> {
        let config_path = self.config_path();

        let config = if config_path.exists() {
            self.parse_file(&config_path)?
        } else {
            CourierConfig::default()
        };

        self.finish(config)
    }

    /// Load configuration from an explicit file, which must exist.
    pub fn load_from(&self, path: impl AsRef<Path>) -> Result<CourierConfig, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let config = self.parse_file(path)?;
        self.finish(config)
    }

    fn parse_file(&self, path: &Path) -> Result<CourierConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let expanded = self.expand_env_vars(&contents)?;

        serde_yaml::from_str(&expanded).map_err(|e| ConfigError::ParseError {
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })
    }

    fn finish(&self, mut config: CourierConfig) -> Result<CourierConfig, ConfigError> {
        apply_env_overrides(&mut config);
        self.validate(&config)?;
        Ok(config)
    }

    /// Expand environment variables in the form `${VAR}` or `${VAR:-default}`.
    fn expand_env_vars(&self, content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(ENV_VAR_PATTERN).map_err(|e| ConfigError::ParseError {
            line: None,
            message: e.to_string(),
        })?;

        let mut result = String::with_capacity(content.len());
        let mut last = 0;

        for cap in re.captures_iter(content) {
            let Some(full_match) = cap.get(0) else {
                continue;
            };
            let var_name = &cap[1];
            let default = cap.get(2).map(|m| m.as_str());

            let value = match std::env::var(var_name) {
                Ok(v) => v,
                Err(_) => match default {
                    Some(d) => d.to_string(),
                    None => {
                        return Err(ConfigError::EnvVarNotFound {
                            var: var_name.to_string(),
                        })
                    }
                },
            };

            result.push_str(&content[last..full_match.start()]);
            result.push_str(&value);
            last = full_match.end();
        }

        result.push_str(&content[last..]);
        Ok(result)
    }

    /// Validate configuration values.
    fn validate(&self, config: &CourierConfig) -> Result<(), ConfigError> {
        if config.http.connect_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "http.connect_timeout_secs must be greater than 0",
            ));
        }

        if config.http.request_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "http.request_timeout_secs must be greater than 0",
            ));
        }

        if config.scheduler.worker_threads == 0 {
            return Err(ConfigError::invalid(
                "scheduler.worker_threads must be greater than 0",
            ));
        }

        if config.cache.ttl_secs == 0 {
            return Err(ConfigError::invalid("cache.ttl_secs must be greater than 0"));
        }

        if let Some(base_url) = &config.http.base_url {
            check_url("http.base_url", base_url)?;
        }

        if let Some(config_url) = &config.gateway.config_url {
            check_url("gateway.config_url", config_url)?;
        }

        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, config: &CourierConfig) -> Result<(), ConfigError> {
        let config_dir = self.base_path.join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir)?;

        let yaml = serde_yaml::to_string(config).map_err(|e| ConfigError::ParseError {
            line: None,
            message: e.to_string(),
        })?;

        std::fs::write(config_dir.join(CONFIG_FILE), yaml)?;
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_default())
    }
}

fn check_url(field: &str, value: &str) -> Result<(), ConfigError> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::invalid(format!("{field} is not a valid URL: {e}")))
}

/// Environment variables win over file values.
fn apply_env_overrides(config: &mut CourierConfig) {
    if let Some(base_url) = Environment::get(vars::COURIER_BASE_URL) {
        config.http.base_url = Some(base_url);
    }
    if let Some(config_url) = Environment::get(vars::COURIER_CONFIG_URL) {
        config.gateway.config_url = Some(config_url);
    }
    if let Some(authorization) = Environment::get(vars::COURIER_AUTHORIZATION) {
        config.gateway.authorization = Some(authorization);
    }
    if let Some(path) = Environment::get(vars::COURIER_CACHE_PATH) {
        config.cache.path = Some(PathBuf::from(path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ENV_LOCK;
    use std::fs;
    use tempfile::tempdir;

    fn write_config(dir: &Path, contents: &str) {
        let config_dir = dir.join(CONFIG_DIR);
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join(CONFIG_FILE), contents).unwrap();
    }

    #[test]
    fn test_load_defaults_when_no_file() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempdir().unwrap();
        let config = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(config.scheduler.worker_threads, 4);
        assert_eq!(config.cache.ttl_secs, 300);
    }

    #[test]
    fn test_load_config_from_yaml_file() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
http:
  base_url: https://api.example.com
  request_timeout_secs: 5
scheduler:
  worker_threads: 2
cache:
  ttl_secs: 60
gateway:
  config_url: https://api.example.com/v1/configuration
"#,
        );

        let config = ConfigLoader::new(dir.path()).load().unwrap();

        assert_eq!(config.http.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.http.request_timeout_secs, 5);
        assert_eq!(config.scheduler.worker_threads, 2);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(
            config.gateway.config_url.as_deref(),
            Some("https://api.example.com/v1/configuration")
        );

        // Unspecified values use defaults
        assert_eq!(config.http.connect_timeout_secs, 10);
        assert!(config.http.gzip);
        assert!(config.cache.path.is_none());
    }

    #[test]
    fn test_load_from_missing_explicit_path() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());
        match loader.load_from(dir.path().join("absent.yaml")) {
            Err(ConfigError::NotFound { path }) => assert!(path.ends_with("absent.yaml")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_env_var_expansion() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("COURIER_TEST_VAR", "test_value");
        let loader = ConfigLoader::new(".");
        let result = loader.expand_env_vars("key: ${COURIER_TEST_VAR}").unwrap();
        assert_eq!(result, "key: test_value");
        std::env::remove_var("COURIER_TEST_VAR");
    }

    #[test]
    fn test_env_var_default() {
        let loader = ConfigLoader::new(".");
        let result = loader
            .expand_env_vars("key: ${COURIER_NONEXISTENT:-default}")
            .unwrap();
        assert_eq!(result, "key: default");
    }

    #[test]
    fn test_env_var_missing_error() {
        let loader = ConfigLoader::new(".");
        match loader.expand_env_vars("key: ${COURIER_MISSING_VAR}") {
            Err(ConfigError::EnvVarNotFound { var }) => assert_eq!(var, "COURIER_MISSING_VAR"),
            other => panic!("expected EnvVarNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_expanded_value_is_not_expanded_again() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("COURIER_TEST_OUTER", "${COURIER_TEST_INNER}");
        let loader = ConfigLoader::new(".");
        let result = loader
            .expand_env_vars("a: ${COURIER_TEST_OUTER} b: ${COURIER_TEST_OUTER}")
            .unwrap();
        assert_eq!(result, "a: ${COURIER_TEST_INNER} b: ${COURIER_TEST_INNER}");
        std::env::remove_var("COURIER_TEST_OUTER");
    }

    #[test]
    fn test_multiple_env_vars_in_single_value() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("COURIER_TEST_HOST", "api.example.com");
        std::env::set_var("COURIER_TEST_SCHEME", "https");

        let loader = ConfigLoader::new(".");
        let result = loader
            .expand_env_vars("base_url: ${COURIER_TEST_SCHEME}://${COURIER_TEST_HOST}")
            .unwrap();
        assert_eq!(result, "base_url: https://api.example.com");

        std::env::remove_var("COURIER_TEST_HOST");
        std::env::remove_var("COURIER_TEST_SCHEME");
    }

    #[test]
    fn test_env_var_expansion_in_config() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("COURIER_TEST_WORKERS", "8");

        let dir = tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
scheduler:
  worker_threads: ${COURIER_TEST_WORKERS}
cache:
  ttl_secs: ${COURIER_TEST_TTL:-120}
"#,
        );

        let config = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(config.scheduler.worker_threads, 8);
        assert_eq!(config.cache.ttl_secs, 120);

        std::env::remove_var("COURIER_TEST_WORKERS");
    }

    #[test]
    fn test_env_overrides_win_over_file() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var(vars::COURIER_AUTHORIZATION, "from-env");

        let dir = tempdir().unwrap();
        write_config(dir.path(), "gateway:\n  authorization: from-file\n");

        let config = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(config.gateway.authorization.as_deref(), Some("from-env"));

        std::env::remove_var(vars::COURIER_AUTHORIZATION);
    }

    #[test]
    fn test_validation_errors() {
        let loader = ConfigLoader::new(".");
        let cases: [(fn(&mut CourierConfig), &str); 6] = [
            (|c| c.http.connect_timeout_secs = 0, "connect_timeout_secs"),
            (|c| c.http.request_timeout_secs = 0, "request_timeout_secs"),
            (|c| c.scheduler.worker_threads = 0, "worker_threads"),
            (|c| c.cache.ttl_secs = 0, "ttl_secs"),
            (|c| c.http.base_url = Some("not a url".into()), "http.base_url"),
            (
                |c| c.gateway.config_url = Some("::".into()),
                "gateway.config_url",
            ),
        ];

        for (mutate, field) in cases {
            let mut config = CourierConfig::default();
            mutate(&mut config);
            match loader.validate(&config) {
                Err(ConfigError::ValidationError { message }) => {
                    assert!(message.contains(field), "{message} should name {field}");
                }
                other => panic!("expected ValidationError for {field}, got {other:?}"),
            }
        }

        assert!(loader.validate(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn test_parse_error_with_line_number() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
http:
  base_url: https://api.example.com
  invalid_yaml: [unclosed
"#,
        );

        match ConfigLoader::new(dir.path()).load() {
            Err(ConfigError::ParseError { line, .. }) => assert!(line.is_some()),
            other => panic!("expected ParseError with line number, got {other:?}"),
        }
    }

    #[test]
    fn test_save_config() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());

        let mut config = CourierConfig::default();
        config.http.base_url = Some("https://api.example.com".to_string());
        config.scheduler.worker_threads = 6;

        loader.save(&config).unwrap();
        assert!(loader.config_path().exists());

        let loaded = loader.load().unwrap();
        assert_eq!(loaded, config);
    }
}
