use std::path::PathBuf;
use std::{fmt, io};

use crate::error::mysql::format_mysql_error;

/// Crate-wide `Result` type using [`DumpError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, DumpError>;

/// Top-level error type for tabledump operations.
///
/// This type wraps the stage-specific error kinds so every message names
/// the stage of the dump that failed.
#[derive(Debug)]
pub enum DumpError {
    /// Connection-related errors.
    Connection(ConnectionError),

    /// Catalog query errors (tables, columns, DDL, rows).
    Catalog(CatalogError),

    /// Export pipeline errors (workers, artifacts, output file).
    Export(ExportError),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors.
    Io(io::Error),

    /// MySQL driver errors.
    MySql(mysql_async::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Connection-specific errors.
#[derive(Debug)]
pub enum ConnectionError {
    /// Failed to establish a connection.
    ConnectionFailed(String),

    /// Invalid connection parameters.
    InvalidParameters(String),

    /// Ping command failed.
    PingFailed(String),
}

/// Catalog query errors.
#[derive(Debug)]
pub enum CatalogError {
    /// Listing the base tables of the database failed.
    ListTables { database: String, reason: String },

    /// Fetching the column list of a table failed.
    Columns { table: String, reason: String },

    /// `SHOW CREATE TABLE` failed or returned nothing.
    CreateStatement { table: String, reason: String },

    /// Counting the rows of a table failed.
    RowCount { table: String, reason: String },

    /// Fetching a page of rows failed.
    FetchRows { table: String, reason: String },
}

/// Export pipeline errors.
#[derive(Debug)]
pub enum ExportError {
    /// The final output file could not be created.
    OutputCreate { path: PathBuf, source: io::Error },

    /// Copying or removing a per-table artifact failed.
    Merge { path: PathBuf, source: io::Error },

    /// Flushing or closing the final output file failed.
    OutputClose { path: PathBuf, source: io::Error },

    /// A table worker reported a failure.
    TableFailed { table: String, reason: String },

    /// A table worker task panicked or was aborted.
    WorkerPanicked(String),

    /// The artifact writer stopped before the worker finished pushing.
    SinkClosed(PathBuf),

    /// The `mysqldump` binary could not be found on `PATH`.
    MysqldumpNotFound,

    /// `mysqldump` exited unsuccessfully.
    MysqldumpFailed { table: String, status: String },

    /// The run was interrupted before it completed.
    Interrupted,
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Missing required field.
    MissingField(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpError::Connection(e) => write!(f, "Connection error: {e}"),
            DumpError::Catalog(e) => write!(f, "Catalog error: {e}"),
            DumpError::Export(e) => write!(f, "Export error: {e}"),
            DumpError::Config(e) => write!(f, "Configuration error: {e}"),
            DumpError::Io(e) => write!(f, "I/O error: {e}"),
            DumpError::MySql(e) => format_mysql_error(f, e),
            DumpError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::ConnectionFailed(msg) => write!(f, "Failed to connect: {msg}"),
            ConnectionError::InvalidParameters(msg) => {
                write!(f, "Invalid connection parameters: {msg}")
            }
            ConnectionError::PingFailed(msg) => write!(f, "Ping failed: {msg}"),
        }
    }
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::ListTables { database, reason } => {
                write!(f, "Could not list tables of database '{database}': {reason}")
            }
            CatalogError::Columns { table, reason } => {
                write!(f, "Could not get column list of table '{table}': {reason}")
            }
            CatalogError::CreateStatement { table, reason } => {
                write!(f, "Could not get create statement of table '{table}': {reason}")
            }
            CatalogError::RowCount { table, reason } => {
                write!(f, "Could not count rows of table '{table}': {reason}")
            }
            CatalogError::FetchRows { table, reason } => {
                write!(f, "Could not fetch rows of table '{table}': {reason}")
            }
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::OutputCreate { path, source } => {
                write!(f, "Could not create output file {}: {source}", path.display())
            }
            ExportError::Merge { path, source } => {
                write!(f, "Could not merge artifact {}: {source}", path.display())
            }
            ExportError::OutputClose { path, source } => {
                write!(f, "Could not close output file {}: {source}", path.display())
            }
            ExportError::TableFailed { table, reason } => {
                write!(f, "Export of table '{table}' failed: {reason}")
            }
            ExportError::WorkerPanicked(msg) => write!(f, "Table worker panicked: {msg}"),
            ExportError::SinkClosed(path) => {
                write!(f, "Artifact writer for {} stopped early", path.display())
            }
            ExportError::MysqldumpNotFound => write!(f, "Could not find 'mysqldump' command"),
            ExportError::MysqldumpFailed { table, status } => {
                write!(f, "mysqldump failed for table '{table}': {status}")
            }
            ExportError::Interrupted => write!(f, "Export interrupted"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::MissingField(field) => write!(f, "Missing required field: {field}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for DumpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DumpError::Io(e) => Some(e),
            DumpError::MySql(e) => Some(e),
            DumpError::Export(e) => e.source(),
            _ => None,
        }
    }
}

impl std::error::Error for ConnectionError {}
impl std::error::Error for CatalogError {}
impl std::error::Error for ConfigError {}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::OutputCreate { source, .. }
            | ExportError::Merge { source, .. }
            | ExportError::OutputClose { source, .. } => Some(source),
            _ => None,
        }
    }
}

/* ========================= Conversions to DumpError ========================= */

impl From<io::Error> for DumpError {
    fn from(err: io::Error) -> Self {
        DumpError::Io(err)
    }
}

impl From<mysql_async::Error> for DumpError {
    fn from(err: mysql_async::Error) -> Self {
        DumpError::MySql(err)
    }
}

impl From<ConnectionError> for DumpError {
    fn from(err: ConnectionError) -> Self {
        DumpError::Connection(err)
    }
}

impl From<CatalogError> for DumpError {
    fn from(err: CatalogError) -> Self {
        DumpError::Catalog(err)
    }
}

impl From<ExportError> for DumpError {
    fn from(err: ExportError) -> Self {
        DumpError::Export(err)
    }
}

impl From<ConfigError> for DumpError {
    fn from(err: ConfigError) -> Self {
        DumpError::Config(err)
    }
}

impl From<String> for DumpError {
    fn from(msg: String) -> Self {
        DumpError::Generic(msg)
    }
}

impl From<&str> for DumpError {
    fn from(msg: &str) -> Self {
        DumpError::Generic(msg.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_error_names_table() {
        let err: DumpError = CatalogError::Columns {
            table: "orders".to_string(),
            reason: "boom".to_string(),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.starts_with("Catalog error:"));
        assert!(msg.contains("'orders'"));
    }

    #[test]
    fn test_export_error_source() {
        use std::error::Error;

        let err = ExportError::Merge {
            path: PathBuf::from("/tmp/x.sql"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("/tmp/x.sql"));
    }

    #[test]
    fn test_from_str() {
        let err: DumpError = "plain".into();
        assert_eq!(err.to_string(), "plain");
    }
}
