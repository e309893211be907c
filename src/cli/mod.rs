//! Command-line interface for tabledump
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading (file, environment, arguments)
//! - Subcommands (version, completion, config)

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use std::io;
use std::path::PathBuf;

use crate::config::{Config, ExportStrategyKind, LogLevel, TableErrorPolicy};
use crate::connection::ConnectionParams;
use crate::error::{ConfigError, Result};

/// tabledump - Export a MySQL database table by table
#[derive(Parser, Debug)]
#[command(
    name = "tabledump",
    version,
    about = "Concurrent MySQL database exporter",
    long_about = "Exports every base table of a MySQL database into one SQL file.
Tables are exported concurrently in chunks, each through its own connection,
and every table lands in the output as one contiguous block."
)]
pub struct CliArgs {
    /// Server to connect to
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port to connect to
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Unix socket to connect through
    #[arg(long, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    /// Username for authentication
    #[arg(short = 'u', long, value_name = "USERNAME")]
    pub username: Option<String>,

    /// Password for authentication
    #[arg(short = 'p', long, value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Database to export
    #[arg(long, value_name = "NAME")]
    pub database: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Directory for per-table temporary files
    #[arg(long, value_name = "DIR")]
    pub export_dir: Option<PathBuf>,

    /// Output file (defaults to <export-dir>/<database>.sql)
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Maximum number of tables exported concurrently
    #[arg(long, value_name = "N")]
    pub chunk_size: Option<usize>,

    /// Export each table with the external mysqldump binary
    #[arg(long)]
    pub use_mysqldump: bool,

    /// What to do when a table fails (abort, mark)
    #[arg(long, value_name = "POLICY")]
    pub on_table_error: Option<String>,

    /// Export table definitions only
    #[arg(long)]
    pub no_rows: bool,

    /// Maximum rows per INSERT statement
    #[arg(long, value_name = "N")]
    pub rows_per_insert: Option<usize>,

    /// Show a progress bar
    #[arg(long)]
    pub progress: bool,

    /// Print the summary and errors as JSON
    #[arg(long)]
    pub json: bool,

    /// Connection timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands for tabledump
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version,

    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        #[arg(value_name = "SHELL")]
        shell: String,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Effective configuration
    config: Config,
}

impl CliInterface {
    /// Parse the process arguments and load the configuration
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        let args = CliArgs::parse();
        Self::from_args(args, |name| std::env::var(name).ok())
    }

    /// Build the effective configuration for already parsed arguments
    ///
    /// Precedence: arguments, then environment, then file, then defaults.
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    /// * `env` - Environment variable lookup
    pub fn from_args<F>(args: CliArgs, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        config.apply_env(env)?;
        Self::apply_args_to_config(&mut config, &args)?;

        Ok(Self { args, config })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Whether results are printed as JSON
    pub fn json(&self) -> bool {
        self.args.json
    }

    /// Connection parameters of the effective configuration
    pub fn connection_params(&self) -> Result<ConnectionParams> {
        ConnectionParams::from_config(&self.config.connection)
    }

    /// Apply CLI arguments to configuration
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) -> Result<()> {
        Self::apply_connection_args(config, args);
        Self::apply_export_args(config, args)?;
        Self::apply_logging_args(config, args);
        Ok(())
    }

    /// Apply connection-related CLI arguments to configuration
    fn apply_connection_args(config: &mut Config, args: &CliArgs) {
        let conn = &mut config.connection;
        if let Some(host) = &args.host {
            conn.host = host.clone();
        }
        if let Some(port) = args.port {
            conn.port = port;
        }
        if let Some(socket) = &args.socket {
            conn.socket = Some(socket.clone());
        }
        if let Some(username) = &args.username {
            conn.username = username.clone();
        }
        if let Some(password) = &args.password {
            conn.password = Some(password.clone());
        }
        if let Some(database) = &args.database {
            conn.database = Some(database.clone());
        }
        if let Some(timeout) = args.timeout {
            conn.connect_timeout = timeout;
        }
    }

    /// Apply export-related CLI arguments to configuration
    fn apply_export_args(config: &mut Config, args: &CliArgs) -> Result<()> {
        let export = &mut config.export;
        if let Some(dir) = &args.export_dir {
            export.export_dir = dir.clone();
        }
        if let Some(output) = &args.output {
            export.output_file = Some(output.clone());
        }
        if let Some(chunk_size) = args.chunk_size {
            export.chunk_size = chunk_size;
        }
        if args.use_mysqldump {
            export.strategy = ExportStrategyKind::Mysqldump;
        }
        if let Some(policy) = &args.on_table_error {
            export.on_table_error = Self::parse_error_policy(policy)?;
        }
        if args.no_rows {
            export.include_rows = false;
        }
        if let Some(rows) = args.rows_per_insert {
            export.rows_per_insert = rows;
        }
        if args.progress {
            export.progress = true;
        }
        Ok(())
    }

    /// Apply logging-related CLI arguments to configuration
    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    /// Parse failure policy string
    fn parse_error_policy(policy: &str) -> Result<TableErrorPolicy> {
        match policy.to_lowercase().as_str() {
            "abort" => Ok(TableErrorPolicy::Abort),
            "mark" => Ok(TableErrorPolicy::Mark),
            _ => Err(ConfigError::InvalidValue {
                field: "--on-table-error".to_string(),
                value: policy.to_string(),
            }
            .into()),
        }
    }

    /// Handle subcommands
    ///
    /// # Returns
    /// * `Result<bool>` - True if subcommand was handled, false to continue
    pub fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Some(Commands::Version) => {
                self.show_version();
                Ok(true)
            }
            Some(Commands::Completion { shell }) => {
                self.generate_completion(shell)?;
                Ok(true)
            }
            Some(Commands::Config { show, validate }) => {
                self.handle_config_command(*show, *validate)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Show version information
    fn show_version(&self) {
        println!("tabledump version {}", crate::VERSION);
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    /// Write a shell completion script to stdout
    fn generate_completion(&self, shell_name: &str) -> Result<()> {
        let shell = parse_shell(shell_name)?;
        let mut cmd = CliArgs::command();
        generate(shell, &mut cmd, "tabledump", &mut io::stdout());
        Ok(())
    }

    /// Handle config subcommand
    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.validate_config_file()?;
        }

        if show {
            self.show_config()?;
        }

        Ok(())
    }

    /// Validate configuration file
    fn validate_config_file(&self) -> Result<()> {
        let path = self.get_config_path();
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("❌ Configuration file does not exist");
            return Ok(());
        }

        match Config::from_file(&path) {
            Ok(config) => match config.validate() {
                Ok(_) => println!("✅ Configuration is valid"),
                Err(e) => println!("❌ Configuration validation failed: {}", e),
            },
            Err(e) => println!("❌ Failed to load configuration: {}", e),
        }

        Ok(())
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        let path = self.get_config_path();
        println!("Configuration file: {}", path.display());
        println!();
        println!("=== Effective Configuration ===");
        println!();
        println!("{}", self.config.to_toml()?);
        Ok(())
    }

    /// Get configuration file path (from args or default)
    fn get_config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_config_path)
    }

    /// Print what is about to be exported
    pub fn print_banner(&self, target: &str, output: &std::path::Path) {
        if !self.args.quiet && !self.args.json {
            println!("Exporting: {}", target);
            println!("Output: {}", output.display());
        }
    }
}

/// Parse shell name string to Shell enum
fn parse_shell(shell_name: &str) -> Result<Shell> {
    match shell_name.to_lowercase().as_str() {
        "bash" => Ok(Shell::Bash),
        "zsh" => Ok(Shell::Zsh),
        "fish" => Ok(Shell::Fish),
        "powershell" => Ok(Shell::PowerShell),
        "elvish" => Ok(Shell::Elvish),
        _ => Err(ConfigError::InvalidValue {
            field: "shell".to_string(),
            value: shell_name.to_string(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_cli_args_parsing() {
        let args = CliArgs::try_parse_from(vec!["tabledump"]).unwrap();
        assert!(args.database.is_none());
        assert!(args.command.is_none());
        assert!(!args.use_mysqldump);
    }

    #[test]
    fn test_cli_args_with_flags() {
        let args = CliArgs::try_parse_from(vec![
            "tabledump",
            "--database",
            "shop",
            "-u",
            "backup",
            "--chunk-size",
            "8",
            "--no-rows",
            "--quiet",
        ])
        .unwrap();
        assert_eq!(args.database.as_deref(), Some("shop"));
        assert_eq!(args.username.as_deref(), Some("backup"));
        assert_eq!(args.chunk_size, Some(8));
        assert!(args.no_rows);
        assert!(args.quiet);
    }

    #[test]
    fn test_subcommands() {
        let args = CliArgs::try_parse_from(vec!["tabledump", "completion", "zsh"]).unwrap();
        assert!(matches!(args.command, Some(Commands::Completion { ref shell }) if shell == "zsh"));

        let args = CliArgs::try_parse_from(vec!["tabledump", "config", "--show"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Commands::Config {
                show: true,
                validate: false
            })
        ));
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(CliArgs::try_parse_from(vec!["tabledump", "--port", "99999"]).is_err());
    }

    #[test]
    fn test_args_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[connection]\nhost = \"db.internal\"\ndatabase = \"shop\"\n\n\
             [export]\nchunk_size = 4\n",
        );
        let args = CliArgs::try_parse_from(vec![
            "tabledump",
            "-c",
            path.to_str().unwrap(),
            "--chunk-size",
            "16",
            "--use-mysqldump",
            "--on-table-error",
            "mark",
        ])
        .unwrap();

        let cli = CliInterface::from_args(args, no_env).unwrap();
        let config = cli.config();
        assert_eq!(config.connection.host, "db.internal");
        assert_eq!(config.export.chunk_size, 16);
        assert_eq!(config.export.strategy, ExportStrategyKind::Mysqldump);
        assert_eq!(config.export.on_table_error, TableErrorPolicy::Mark);
    }

    #[test]
    fn test_precedence_args_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[connection]\nhost = \"from-file\"\nport = 3307\ndatabase = \"file_db\"\n",
        );
        let env: HashMap<&str, &str> = [
            ("TABLEDUMP_HOST", "from-env"),
            ("TABLEDUMP_DATABASE", "env_db"),
        ]
        .into_iter()
        .collect();
        let args = CliArgs::try_parse_from(vec![
            "tabledump",
            "-c",
            path.to_str().unwrap(),
            "--database",
            "cli_db",
        ])
        .unwrap();

        let cli =
            CliInterface::from_args(args, |name| env.get(name).map(|v| v.to_string())).unwrap();
        let conn = &cli.config().connection;
        assert_eq!(conn.host, "from-env");
        assert_eq!(conn.port, 3307);
        assert_eq!(conn.database.as_deref(), Some("cli_db"));
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let args =
            CliArgs::try_parse_from(vec!["tabledump", "-c", "/nonexistent/tabledump.toml"])
                .unwrap();
        assert!(CliInterface::from_args(args, no_env).is_err());
    }

    #[test]
    fn test_unknown_error_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "");
        let args = CliArgs::try_parse_from(vec![
            "tabledump",
            "-c",
            path.to_str().unwrap(),
            "--on-table-error",
            "ignore",
        ])
        .unwrap();
        assert!(CliInterface::from_args(args, no_env).is_err());
    }

    #[test]
    fn test_verbosity_sets_log_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "");
        let args =
            CliArgs::try_parse_from(vec!["tabledump", "-c", path.to_str().unwrap(), "--vv"])
                .unwrap();
        let cli = CliInterface::from_args(args, no_env).unwrap();
        assert_eq!(cli.config().logging.level, LogLevel::Trace);

        let args =
            CliArgs::try_parse_from(vec!["tabledump", "-c", path.to_str().unwrap(), "-q"]).unwrap();
        let cli = CliInterface::from_args(args, no_env).unwrap();
        assert_eq!(cli.config().logging.level, LogLevel::Error);
    }

    #[test]
    fn test_parse_shell() {
        assert_eq!(parse_shell("Bash").unwrap(), Shell::Bash);
        assert_eq!(parse_shell("powershell").unwrap(), Shell::PowerShell);
        assert!(parse_shell("tcsh").is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }
}
