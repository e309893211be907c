//! Bounded-concurrency database export
//!
//! This module dumps every base table of a database into one SQL file:
//! - One worker per table, each with its own private connection
//! - At most `chunk_size` workers alive at once, chunk after chunk
//! - Each table's artifact merged as one contiguous block, in completion order
//!
//! # Architecture
//!
//! 1. **ExportOrchestrator**: discovers tables, dispatches and throttles workers, merges
//! 2. **TableWorker**: writes one table's schema and data to a per-table artifact
//! 3. **CompletionChannel**: carries each worker's completion signal back
//! 4. **ArtifactSink**: decouples statement generation from file writes inside a worker
//! 5. **RowEmitter**: pluggable row serialization (INSERT statements by default)
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use tabledump::config::Config;
//! use tabledump::connection::ConnectionParams;
//! use tabledump::export::{ExportSettings, export_database};
//!
//! # async fn example() -> tabledump::Result<()> {
//! let mut config = Config::default();
//! config.connection.database = Some("shop".to_string());
//!
//! let params = ConnectionParams::from_config(&config.connection)?;
//! let settings = ExportSettings::from_config(&config, &params)?;
//! let summary = export_database(&params, &settings, Path::new("/tmp/shop.sql"), None).await?;
//! println!("{} tables", summary.tables_processed());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{Config, ExportStrategyKind, TableErrorPolicy};
use crate::connection::{ConnectionParams, MySqlConnectionProvider};
use crate::error::Result;

pub mod channel;
pub mod mysqldump;
pub mod orchestrator;
pub mod progress;
pub mod rows;
pub mod sink;
pub mod worker;


pub use channel::{CompletionChannel, CompletionSender, CompletionSignal, TableStats, WorkerOutcome};
pub use mysqldump::MysqldumpCommand;
pub use orchestrator::{ExportOrchestrator, ExportSummary};
pub use progress::ProgressTracker;
pub use rows::{InsertStatementEmitter, RowEmitter};
pub use sink::ArtifactSink;
pub use worker::{ExportJob, TableWorker};

/// How each table is exported
#[derive(Debug, Clone)]
pub enum ExportStrategy {
    /// Catalog queries through the driver
    Native,
    /// External `mysqldump`, one process per table
    Mysqldump(MysqldumpCommand),
}

/// Row export parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowExportSettings {
    /// Maximum rows per INSERT statement
    pub rows_per_insert: usize,
    /// Rows fetched per query
    pub page_size: u64,
}

/// Everything the orchestrator and its workers need for one run
#[derive(Debug, Clone)]
pub struct ExportSettings {
    /// Maximum number of concurrently running table workers
    pub chunk_size: usize,
    /// Directory under which per-table artifacts are written
    pub export_dir: PathBuf,
    /// Export strategy
    pub strategy: ExportStrategy,
    /// What to do when one table fails
    pub on_table_error: TableErrorPolicy,
    /// Row export, or `None` for a schema-only dump
    pub rows: Option<RowExportSettings>,
    /// Write header and footer comments
    pub write_header: bool,
    /// Show a progress bar
    pub progress: bool,
}

impl ExportSettings {
    /// Schema-and-data export with default batching
    pub fn new(chunk_size: usize, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            chunk_size,
            export_dir: export_dir.into(),
            strategy: ExportStrategy::Native,
            on_table_error: TableErrorPolicy::Abort,
            rows: Some(RowExportSettings {
                rows_per_insert: 100,
                page_size: 1000,
            }),
            write_header: true,
            progress: false,
        }
    }

    /// Build settings from the loaded configuration
    ///
    /// Locates `mysqldump` up front when that strategy is selected.
    pub fn from_config(config: &Config, params: &ConnectionParams) -> Result<Self> {
        let export = &config.export;
        let strategy = match export.strategy {
            ExportStrategyKind::Native => ExportStrategy::Native,
            ExportStrategyKind::Mysqldump => {
                ExportStrategy::Mysqldump(MysqldumpCommand::locate(params.clone())?)
            }
        };

        Ok(Self {
            chunk_size: export.chunk_size,
            export_dir: export.export_dir.clone(),
            strategy,
            on_table_error: export.on_table_error,
            rows: export.include_rows.then_some(RowExportSettings {
                rows_per_insert: export.rows_per_insert,
                page_size: export.page_size,
            }),
            write_header: export.write_header,
            progress: export.progress,
        })
    }

    /// Worker template cloned for every dispatched table
    pub fn table_worker(&self, database: &str) -> TableWorker {
        match &self.strategy {
            ExportStrategy::Native => {
                let rows = self.rows.map(|r| {
                    Arc::new(InsertStatementEmitter::new(r.rows_per_insert, r.page_size))
                        as Arc<dyn RowEmitter>
                });
                TableWorker::native(database, rows)
            }
            ExportStrategy::Mysqldump(command) => TableWorker::mysqldump(database, command.clone()),
        }
    }
}

/// Export a whole database into `output_path`
///
/// Checks connectivity before any table is dispatched, so unreachable
/// servers and bad credentials fail the run without touching the output.
pub async fn export_database(
    params: &ConnectionParams,
    settings: &ExportSettings,
    output_path: &Path,
    cancel_token: Option<CancellationToken>,
) -> Result<ExportSummary> {
    let provider = MySqlConnectionProvider::new(params.clone());
    let health = provider.health_check().await?;
    info!(
        "Connected to MySQL {} at {} ({} ms)",
        health.server_version,
        params.display_target(),
        health.response_time_ms
    );

    let mut orchestrator = ExportOrchestrator::new(Arc::new(provider), settings.clone());
    if let Some(token) = cancel_token {
        orchestrator = orchestrator.with_cancellation(token);
    }
    orchestrator.run(output_path).await
}
