//! Error handling for tabledump.
//!
//! This module provides:
//! - A top-level [`DumpError`] wrapping stage-specific error kinds
//! - Structured information extracted from MySQL driver errors
//!
//! # Example
//!
//! ```rust,no_run
//! use tabledump::error::{CatalogError, Result};
//!
//! fn columns_of(table: &str) -> Result<Vec<String>> {
//!     Err(CatalogError::Columns {
//!         table: table.to_string(),
//!         reason: "server went away".to_string(),
//!     }
//!     .into())
//! }
//! ```

pub mod kinds;
pub mod mysql;

// Re-export commonly used types
pub use kinds::{CatalogError, ConfigError, ConnectionError, DumpError, ExportError, Result};
pub use mysql::{ErrorInfo, describe_error, extract_error_info};
