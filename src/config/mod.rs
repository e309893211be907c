//! Configuration management for tabledump
//!
//! This module handles loading, parsing, and managing configuration from various sources:
//! - Configuration files (TOML format)
//! - Environment variables
//! - Command-line arguments
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

/// Prefix of the environment variables read by [`Config::apply_env`].
pub const ENV_PREFIX: &str = "TABLEDUMP_";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Export configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server host name or IP address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server TCP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Unix socket path; takes precedence over host and port when set
    #[serde(default)]
    pub socket: Option<PathBuf>,

    /// Username for authentication
    #[serde(default = "default_username")]
    pub username: String,

    /// Password for authentication
    #[serde(default)]
    pub password: Option<String>,

    /// Database which will be dumped
    #[serde(default)]
    pub database: Option<String>,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

/// Export pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Maximum number of tables exported concurrently
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Directory holding per-table artifacts and the default output file
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    /// Final output file (defaults to `<export_dir>/<database>.sql`)
    #[serde(default)]
    pub output_file: Option<PathBuf>,

    /// How each table is exported
    #[serde(default)]
    pub strategy: ExportStrategyKind,

    /// What to do when a single table fails
    #[serde(default)]
    pub on_table_error: TableErrorPolicy,

    /// Whether row data is exported as INSERT statements
    #[serde(default = "default_include_rows")]
    pub include_rows: bool,

    /// Maximum number of rows per INSERT statement
    #[serde(default = "default_rows_per_insert")]
    pub rows_per_insert: usize,

    /// Number of rows fetched per query
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Write a header and footer comment around the table blocks
    #[serde(default = "default_write_header")]
    pub write_header: bool,

    /// Show a progress bar while merging
    #[serde(default)]
    pub progress: bool,
}

/// Export strategy options
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportStrategyKind {
    /// Query the catalog and rows through the driver
    #[default]
    Native,

    /// Run the external `mysqldump` binary once per table
    Mysqldump,
}

/// Per-table failure policy
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TableErrorPolicy {
    /// Abort the whole run and remove the partial output
    #[default]
    Abort,

    /// Write an error marker block for the table and continue
    Mark,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_username() -> String {
    "root".to_string()
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_chunk_size() -> usize {
    50
}

fn default_export_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_include_rows() -> bool {
    true
}

fn default_rows_per_insert() -> usize {
    100
}

fn default_page_size() -> u64 {
    1000
}

fn default_write_header() -> bool {
    true
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            socket: None,
            username: default_username(),
            password: None,
            database: None,
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            export_dir: default_export_dir(),
            output_file: None,
            strategy: ExportStrategyKind::default(),
            on_table_error: TableErrorPolicy::default(),
            include_rows: default_include_rows(),
            rows_per_insert: default_rows_per_insert(),
            page_size: default_page_size(),
            write_header: default_write_header(),
            progress: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Load configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound(path.display().to_string())
            } else {
                ConfigError::InvalidFormat(format!("{}: {}", path.display(), e))
            }
        })?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from an explicit path or the default location
    ///
    /// An explicit path must exist. A missing file at the default location
    /// yields the default configuration.
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default_path = Self::default_config_path();
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Override values from `TABLEDUMP_*` environment variables
    ///
    /// # Arguments
    /// * `lookup` - Variable lookup, `std::env::var(..).ok()` outside of tests
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(host) = var("HOST") {
            self.connection.host = host;
        }
        if let Some(port) = var("PORT") {
            self.connection.port = parse_env_value("TABLEDUMP_PORT", &port)?;
        }
        if let Some(user) = var("USER") {
            self.connection.username = user;
        }
        if let Some(password) = var("PASSWORD") {
            self.connection.password = Some(password);
        }
        if let Some(database) = var("DATABASE") {
            self.connection.database = Some(database);
        }
        if let Some(chunk_size) = var("CHUNK_SIZE") {
            self.export.chunk_size = parse_env_value("TABLEDUMP_CHUNK_SIZE", &chunk_size)?;
        }

        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tabledump")
            .join("config.toml")
    }

    /// Render the configuration as TOML, with the password masked
    pub fn to_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.connection.password.is_some() {
            shown.connection.password = Some("***".to_string());
        }
        toml::to_string_pretty(&shown).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        if self.connection.port == 0 {
            return Err(invalid("connection.port", "0"));
        }
        match self.connection.database.as_deref() {
            None | Some("") => {
                return Err(ConfigError::MissingField("connection.database".to_string()).into());
            }
            Some(_) => {}
        }
        if self.export.chunk_size == 0 {
            return Err(invalid("export.chunk_size", "0"));
        }
        if self.export.rows_per_insert == 0 {
            return Err(invalid("export.rows_per_insert", "0"));
        }
        if self.export.page_size == 0 {
            return Err(invalid("export.page_size", "0"));
        }
        Ok(())
    }

    /// Resolve the final output file path
    ///
    /// Falls back to `<export_dir>/<database>.sql`.
    pub fn output_path(&self) -> PathBuf {
        match &self.export.output_file {
            Some(path) => path.clone(),
            None => {
                let database = self.connection.database.as_deref().unwrap_or("dump");
                self.export.export_dir.join(format!("{database}.sql"))
            }
        }
    }
}

fn invalid(field: &str, value: &str) -> crate::error::DumpError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

fn parse_env_value<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| invalid(name, value))
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn with_database(name: &str) -> Config {
        let mut config = Config::default();
        config.connection.database = Some(name.to_string());
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.connection.host, "127.0.0.1");
        assert_eq!(config.connection.port, 3306);
        assert_eq!(config.export.chunk_size, 50);
        assert_eq!(config.export.strategy, ExportStrategyKind::Native);
        assert_eq!(config.export.on_table_error, TableErrorPolicy::Abort);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = Config::from_toml_str(
            r#"
            [connection]
            host = "db.internal"
            database = "shop"

            [export]
            chunk_size = 4
            strategy = "mysqldump"
            on_table_error = "mark"
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.host, "db.internal");
        assert_eq!(config.connection.port, 3306);
        assert_eq!(config.export.chunk_size, 4);
        assert_eq!(config.export.strategy, ExportStrategyKind::Mysqldump);
        assert_eq!(config.export.on_table_error, TableErrorPolicy::Mark);
        assert_eq!(config.export.rows_per_insert, 100);
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml_str("[export]\nchunk_size = \"many\"").unwrap_err();
        assert!(err.to_string().contains("Invalid config format"));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load_from_file(Some(Path::new("/nonexistent/tabledump.toml")))
            .unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_err());
        assert!(with_database("shop").validate().is_ok());

        let mut config = with_database("shop");
        config.export.chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = with_database("shop");
        config.export.rows_per_insert = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_env() {
        let vars: HashMap<&str, &str> = [
            ("TABLEDUMP_HOST", "10.0.0.5"),
            ("TABLEDUMP_PORT", "3307"),
            ("TABLEDUMP_PASSWORD", "secret"),
            ("TABLEDUMP_CHUNK_SIZE", "8"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.connection.host, "10.0.0.5");
        assert_eq!(config.connection.port, 3307);
        assert_eq!(config.connection.password.as_deref(), Some("secret"));
        assert_eq!(config.export.chunk_size, 8);
    }

    #[test]
    fn test_apply_env_rejects_bad_port() {
        let mut config = Config::default();
        let result = config.apply_env(|name| {
            (name == "TABLEDUMP_PORT").then(|| "not-a-port".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_output_path() {
        let mut config = with_database("shop");
        config.export.export_dir = PathBuf::from("/var/dumps");
        assert_eq!(config.output_path(), PathBuf::from("/var/dumps/shop.sql"));

        config.export.output_file = Some(PathBuf::from("/srv/out.sql"));
        assert_eq!(config.output_path(), PathBuf::from("/srv/out.sql"));
    }

    #[test]
    fn test_to_toml_masks_password() {
        let mut config = with_database("shop");
        config.connection.password = Some("hunter2".to_string());
        let rendered = config.to_toml().unwrap();
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }
}
