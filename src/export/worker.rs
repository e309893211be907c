//! Table worker: exports one table through its own private connection
//!
//! A worker owns its [`ExportJob`] for its whole lifetime. Its only visible
//! effects are the artifact at the job's target path, the release of the
//! job's connection and exactly one completion signal.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error};

use crate::catalog::{CatalogSession, ColumnDescriptor, TableDescriptor, quote_identifier};
use crate::error::{DumpError, ExportError, Result};

use super::channel::{CompletionSender, CompletionSignal, TableStats, WorkerOutcome};
use super::mysqldump::MysqldumpCommand;
use super::rows::RowEmitter;
use super::sink::{ArtifactSink, DEFAULT_SINK_CAPACITY};

/// One table export, created by the orchestrator at dispatch time
pub struct ExportJob {
    /// Dispatch position of the table
    pub index: usize,
    /// Table to export
    pub table: TableDescriptor,
    /// Private connection, closed by the worker
    pub session: Box<dyn CatalogSession>,
    /// Per-table artifact location
    pub target_path: PathBuf,
}

/// How a worker produces the artifact
#[derive(Clone)]
enum Strategy {
    /// Catalog queries plus an optional row emitter
    Native(Option<Arc<dyn RowEmitter>>),
    /// External `mysqldump`
    Mysqldump(MysqldumpCommand),
}

/// Exports a single table
///
/// Cloned once per dispatched job.
#[derive(Clone)]
pub struct TableWorker {
    database: String,
    strategy: Strategy,
}

impl TableWorker {
    /// Worker querying the catalog directly
    ///
    /// # Arguments
    /// * `database` - Database the tables belong to
    /// * `rows` - Row emitter, or `None` for a schema-only dump
    pub fn native(database: impl Into<String>, rows: Option<Arc<dyn RowEmitter>>) -> Self {
        Self {
            database: database.into(),
            strategy: Strategy::Native(rows),
        }
    }

    /// Worker delegating to `mysqldump`
    pub fn mysqldump(database: impl Into<String>, command: MysqldumpCommand) -> Self {
        Self {
            database: database.into(),
            strategy: Strategy::Mysqldump(command),
        }
    }

    /// Process the job and report exactly one completion signal
    pub async fn run(self, job: ExportJob, completion: CompletionSender) {
        let index = job.index;
        let table = job.table.name.clone();
        let target_path = job.target_path.clone();

        let outcome = match self.process(job).await {
            Ok(stats) => WorkerOutcome::Completed(stats),
            Err(e) => {
                error!("Export of table {} failed: {}", table, e);
                WorkerOutcome::Failed(e.to_string())
            }
        };

        let signal = CompletionSignal {
            index,
            table,
            target_path,
            outcome,
        };
        if let Err(e) = completion.send(signal).await {
            debug!("Completion channel closed: {}", e);
        }
    }

    /// Write the table's artifact and release the connection
    ///
    /// The connection is closed on both the success and the error path.
    pub async fn process(&self, job: ExportJob) -> Result<TableStats> {
        let ExportJob {
            table,
            mut session,
            target_path,
            ..
        } = job;
        debug!("Processing table {}...", table.name);

        match &self.strategy {
            Strategy::Mysqldump(command) => {
                session.close().await?;
                command.dump_table(&table.name, &target_path).await
            }
            Strategy::Native(rows) => {
                let result = self
                    .export_native(session.as_mut(), &table, &target_path, rows.as_deref())
                    .await;
                let closed = session.close().await;
                let stats = result?;
                closed?;
                Ok(stats)
            }
        }
    }

    async fn export_native(
        &self,
        session: &mut dyn CatalogSession,
        table: &TableDescriptor,
        target_path: &Path,
        rows: Option<&dyn RowEmitter>,
    ) -> Result<TableStats> {
        let row_count = session.get_row_count(&table.name).await?;
        let columns = session.get_columns(&self.database, &table.name).await?;
        let create_statement = session.get_create_statement(&table.name).await?;
        debug!(
            "Table {}: {} rows, {} columns",
            table.name,
            row_count,
            columns.len()
        );

        let sink = ArtifactSink::create(target_path, DEFAULT_SINK_CAPACITY).await?;
        let pushed = write_block(&sink, session, table, &columns, &create_statement, rows).await;
        let finished = sink.finish().await;

        match (pushed, finished) {
            (Ok(rows), Ok(bytes)) => {
                if rows > 0 && rows != row_count {
                    debug!(
                        "Table {} changed during export: counted {}, wrote {}",
                        table.name, row_count, rows
                    );
                }
                Ok(TableStats { rows, bytes })
            }
            (Err(DumpError::Export(ExportError::SinkClosed(_))), Err(e)) => Err(e),
            (Err(e), _) | (_, Err(e)) => Err(e),
        }
    }
}

/// Header comment, DROP, verbatim CREATE and row statements of one table
async fn write_block(
    sink: &ArtifactSink,
    session: &mut dyn CatalogSession,
    table: &TableDescriptor,
    columns: &[ColumnDescriptor],
    create_statement: &str,
    rows: Option<&dyn RowEmitter>,
) -> Result<u64> {
    let quoted = quote_identifier(&table.name);

    sink.push(format!("--\n-- Dump data of table {quoted}\n--\n\n"))
        .await?;
    sink.push(format!("DROP TABLE IF EXISTS {quoted};\n\n")).await?;
    sink.push(format!("{};\n\n", create_statement.trim_end_matches(';')))
        .await?;

    let written = match rows {
        Some(emitter) => emitter.emit_rows(session, &table.name, columns, sink).await?,
        None => 0,
    };
    if written > 0 {
        sink.push("\n").await?;
    }
    Ok(written)
}
