//! CLI configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via DOCFLOW_CONFIG or --config)
//! 3. Environment variables
//! 4. Command-line flags

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Declaration table of the workflow to drive (JSON or YAML).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<PathBuf>,
    /// Logging configuration.
    pub log: LogConfig,
    /// Output configuration.
    pub output: OutputConfig,
}

impl Config {
    /// Loads configuration from `path`, or from DOCFLOW_CONFIG if unset,
    /// then applies environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match std::env::var("DOCFLOW_CONFIG") {
                Ok(path) => Self::from_file(&path)?,
                Err(_) => Self::default(),
            },
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("DOCFLOW_DEFINITION") {
            self.definition = Some(PathBuf::from(path));
        }
        self.log.apply_env_overrides();
        self.output.apply_env_overrides();
    }

    /// Returns the declaration table path, or an error if none is configured.
    pub fn definition_path(&self) -> Result<&Path, ConfigError> {
        self.definition.as_deref().ok_or_else(|| {
            ConfigError::ValidationError(
                "no workflow definition configured (use --definition or DOCFLOW_DEFINITION)"
                    .to_string(),
            )
        })
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when RUST_LOG is not set.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl LogConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("DOCFLOW_LOG") {
            self.level = level;
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Colorize terminal output.
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { color: true }
    }
}

impl OutputConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(color) = std::env::var("DOCFLOW_COLOR") {
            self.color = color == "true" || color == "1";
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.definition.is_none());
        assert_eq!(config.log.level, "warn");
        assert!(config.output.color);
        assert!(config.definition_path().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "definition: /etc/docflow/article.yaml\nlog:\n  level: debug\noutput:\n  color: false"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(
            config.definition_path().unwrap(),
            Path::new("/etc/docflow/article.yaml")
        );
        assert_eq!(config.log.level, "debug");
        assert!(!config.output.color);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "log:\n  level: trace").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.log.level, "trace");
        assert!(config.output.color);
    }

    #[test]
    fn test_missing_and_invalid_files() {
        let err = Config::from_file("/nonexistent/docflow.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(..)));
        assert!(err.to_string().starts_with("failed to read config file"));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "log: [not, a, map]").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(..)));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config {
            definition: Some(PathBuf::from("article.json")),
            ..Config::default()
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.definition, config.definition);
        assert_eq!(parsed.log.level, config.log.level);
    }
}
