//! MySQL Table Dump Library
//!
//! This library exports every base table of a MySQL database into a single
//! SQL file. Tables are exported concurrently, in chunks of bounded size,
//! each through a private connection, and merged as contiguous blocks.
//!
//! # Modules
//!
//! - `catalog`: Catalog queries and SQL value rendering
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `connection`: Connection parameters and per-table connections
//! - `error`: Error types and handling
//! - `export`: Orchestrator, table workers and artifact merging
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use tabledump::{Config, ExportSettings, connection::ConnectionParams, export_database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.connection.database = Some("shop".to_string());
//!     config.export.chunk_size = 8;
//!
//!     let params = ConnectionParams::from_config(&config.connection)?;
//!     let settings = ExportSettings::from_config(&config, &params)?;
//!     let summary = export_database(&params, &settings, Path::new("shop.sql"), None).await?;
//!
//!     println!("Exported {} tables", summary.tables_exported);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod export;

// Re-export commonly used types
pub use catalog::{CatalogSession, ColumnDescriptor, SqlValue, TableDescriptor};
pub use config::Config;
pub use connection::{ConnectionParams, ConnectionProvider, MySqlConnectionProvider};
pub use error::{DumpError, Result};
pub use export::{ExportOrchestrator, ExportSettings, ExportSummary, export_database};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
