//! Project configuration file support for foldlog.
//!
//! Loads configuration from `foldlog.toml` in the working directory, falling
//! back to the user configuration directory.

use anyhow::{Context, Result};
use foldlog_logging::LogFormat;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration loaded from `foldlog.toml`
#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Diagnostic log level (error, warn, info, debug, trace)
    pub log_level: Option<String>,
    /// Diagnostic log format
    pub log_format: Option<LogFormat>,
    /// Also write diagnostics to this file as JSON lines
    pub log_file: Option<PathBuf>,
    /// Report output format
    pub output: Option<LogFormat>,
    /// Print every frame under its unit in summaries
    pub show_frames: Option<bool>,
    /// Read logs with the async reader
    pub async_read: Option<bool>,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "foldlog.toml";

const DEFAULT_LOG_LEVEL: &str = "warn";

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        Self::load_file(&working_dir.join(CONFIG_FILE_NAME))
    }

    /// Working directory config, else the user config, else nothing.
    pub fn discover(working_dir: &Path) -> Result<Option<Self>> {
        if let Some(config) = Self::load(working_dir)? {
            return Ok(Some(config));
        }
        match user_config_path() {
            Some(path) => Self::load_file(&path),
            None => Ok(None),
        }
    }

    fn load_file(config_path: &Path) -> Result<Option<Self>> {
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }
}

/// `<config dir>/foldlog/foldlog.toml`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("foldlog").join(CONFIG_FILE_NAME))
}

/// Values given on the command line. `None` or `false` means not given.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub log_file: Option<PathBuf>,
    pub output: Option<LogFormat>,
    pub show_frames: bool,
    pub async_read: bool,
}

/// Effective settings after merging flags, config and defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub log_level: String,
    pub log_format: LogFormat,
    pub log_file: Option<PathBuf>,
    pub output: LogFormat,
    pub show_frames: bool,
    pub async_read: bool,
}

impl Settings {
    /// Priority: command line > config file > default
    pub fn resolve(cli: CliOverrides, config: Option<&ProjectConfig>) -> Self {
        let empty = ProjectConfig::default();
        let config = config.unwrap_or(&empty);

        Self {
            log_level: cli
                .log_level
                .or_else(|| config.log_level.clone())
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            log_format: cli.log_format.or(config.log_format).unwrap_or_default(),
            log_file: cli.log_file.or_else(|| config.log_file.clone()),
            output: cli.output.or(config.output).unwrap_or_default(),
            show_frames: cli.show_frames || config.show_frames.unwrap_or(false),
            async_read: cli.async_read || config.async_read.unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_config() {
        let dir = TempDir::new().unwrap();
        assert_eq!(ProjectConfig::load(dir.path()).unwrap(), None);
    }

    #[test]
    fn test_load_full_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
log_level = "debug"
log_format = "json"
log_file = "/tmp/foldlog.log"
output = "compact"
show_frames = true
async_read = false
"#,
        )
        .unwrap();

        let config = ProjectConfig::load(dir.path()).unwrap().unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.log_format, Some(LogFormat::Json));
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/foldlog.log")));
        assert_eq!(config.output, Some(LogFormat::Compact));
        assert_eq!(config.show_frames, Some(true));
        assert_eq!(config.async_read, Some(false));
    }

    #[test]
    fn test_unknown_key_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "colour = true\n").unwrap();

        let err = ProjectConfig::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_bad_format_value_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "output = \"xml\"\n").unwrap();

        assert!(ProjectConfig::load(dir.path()).is_err());
    }

    #[test]
    fn test_resolve_defaults() {
        let settings = Settings::resolve(CliOverrides::default(), None);
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert_eq!(settings.output, LogFormat::Pretty);
        assert_eq!(settings.log_file, None);
        assert!(!settings.show_frames);
        assert!(!settings.async_read);
    }

    #[test]
    fn test_resolve_cli_over_config() {
        let config = ProjectConfig {
            log_level: Some("debug".to_string()),
            output: Some(LogFormat::Json),
            show_frames: Some(true),
            ..Default::default()
        };
        let cli = CliOverrides {
            log_level: Some("trace".to_string()),
            async_read: true,
            ..Default::default()
        };

        let settings = Settings::resolve(cli, Some(&config));
        assert_eq!(settings.log_level, "trace");
        assert_eq!(settings.output, LogFormat::Json);
        assert!(settings.show_frames);
        assert!(settings.async_read);
    }
}
