//! Export orchestrator
//!
//! Discovers the base tables, dispatches one [`TableWorker`] per table in
//! chunks of at most `chunk_size` concurrent workers, and merges each
//! finished artifact into the output file in completion order. A chunk is
//! fully drained and merged before the next one is dispatched.
//!
//! Workers run as tasks of a [`JoinSet`] owned by the run, so every error
//! path aborts and joins them before returning. Individual tables have no
//! timeout: a stuck table holds the chunk barrier and with it the whole run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::{TableDescriptor, quote_identifier};
use crate::config::TableErrorPolicy;
use crate::connection::ConnectionProvider;
use crate::error::{ExportError, Result};

use super::ExportSettings;
use super::channel::{CompletionChannel, CompletionSignal, WorkerOutcome};
use super::progress::ProgressTracker;
use super::worker::{ExportJob, TableWorker};

/// Result of an export run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportSummary {
    /// Tables merged into the output
    pub tables_exported: u64,
    /// Tables replaced by an error marker
    pub tables_failed: Vec<String>,
    /// Rows written as INSERT statements
    pub rows_exported: u64,
    /// Bytes written to the output file
    pub bytes_written: u64,
    /// Number of chunks dispatched
    pub chunks: u64,
    /// Time taken for the run
    pub elapsed_ms: u64,
    /// Final output file
    pub output_path: PathBuf,
}

impl ExportSummary {
    /// Total tables processed, failed ones included
    pub fn tables_processed(&self) -> u64 {
        self.tables_exported + self.tables_failed.len() as u64
    }
}

/// Coordinator of a whole-database export
pub struct ExportOrchestrator {
    provider: Arc<dyn ConnectionProvider>,
    settings: ExportSettings,
    worker: TableWorker,
    cancel_token: Option<CancellationToken>,
}

type Output = BufWriter<File>;

/// Written before the first table block
///
/// Blocks land in completion order, so foreign keys may reference tables
/// defined later in the file.
pub const SESSION_PREAMBLE: &str = "SET NAMES utf8mb4;\n\
    SET @OLD_FOREIGN_KEY_CHECKS=@@FOREIGN_KEY_CHECKS, FOREIGN_KEY_CHECKS=0;\n\n";

/// Written after the last table block
pub const SESSION_RESTORE: &str = "SET FOREIGN_KEY_CHECKS=@OLD_FOREIGN_KEY_CHECKS;\n";

impl ExportOrchestrator {
    /// Create a new orchestrator
    ///
    /// # Arguments
    /// * `provider` - Source of one private connection per table
    /// * `settings` - Chunk size, strategy, failure policy and paths
    pub fn new(provider: Arc<dyn ConnectionProvider>, settings: ExportSettings) -> Self {
        let worker = settings.table_worker(provider.database());
        Self {
            provider,
            settings,
            worker,
            cancel_token: None,
        }
    }

    /// Set cancellation token for this run
    ///
    /// Cancellation is treated like any other fatal error.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Export every base table into `output_path`
    ///
    /// On any fatal error the partially written output file is removed.
    ///
    /// # Returns
    /// * `Result<ExportSummary>` - Run statistics or the first fatal error
    pub async fn run(&self, output_path: &Path) -> Result<ExportSummary> {
        let start_time = Instant::now();
        let tables = self.discover_tables().await?;
        info!(
            "Found {} tables in {}",
            tables.len(),
            self.provider.database()
        );

        let file = File::create(output_path)
            .await
            .map_err(|source| ExportError::OutputCreate {
                path: output_path.to_path_buf(),
                source,
            })?;
        let mut output = BufWriter::new(file);

        let run_dir = self
            .settings
            .export_dir
            .join(format!(".tabledump-{}", Uuid::new_v4()));

        let mut summary = ExportSummary {
            output_path: output_path.to_path_buf(),
            ..ExportSummary::default()
        };

        let exported = match fs::create_dir_all(&run_dir).await {
            Ok(()) => {
                let result = self
                    .export_tables(&tables, &run_dir, &mut output, &mut summary)
                    .await;
                if let Err(e) = fs::remove_dir_all(&run_dir).await {
                    warn!("Could not remove {}: {}", run_dir.display(), e);
                }
                result
            }
            Err(e) => Err(e.into()),
        };

        let closed = match exported {
            Ok(()) => close_output(output, output_path).await,
            Err(e) => {
                drop(output);
                Err(e)
            }
        };

        if let Err(e) = closed {
            if let Err(remove_err) = fs::remove_file(output_path).await {
                warn!(
                    "Could not remove partial output {}: {}",
                    output_path.display(),
                    remove_err
                );
            }
            return Err(e);
        }

        summary.elapsed_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "Done! {} tables, {} rows, {} bytes in {} ms",
            summary.tables_processed(),
            summary.rows_exported,
            summary.bytes_written,
            summary.elapsed_ms
        );
        Ok(summary)
    }

    /// List the base tables through a short-lived control connection
    async fn discover_tables(&self) -> Result<Vec<TableDescriptor>> {
        let mut session = self.provider.open().await?;
        let listed = session.list_base_tables(self.provider.database()).await;
        let closed = session.close().await;
        let tables = listed?;
        closed?;
        Ok(tables)
    }

    async fn export_tables(
        &self,
        tables: &[TableDescriptor],
        run_dir: &Path,
        output: &mut Output,
        summary: &mut ExportSummary,
    ) -> Result<()> {
        let chunk_size = self.settings.chunk_size.max(1);
        let tracker = ProgressTracker::new(tables.len() as u64, self.settings.progress);
        let mut channel = CompletionChannel::new(chunk_size);
        let mut workers = JoinSet::new();

        if self.settings.write_header {
            self.write_header(output, summary).await?;
        }
        write_output(output, SESSION_PREAMBLE.as_bytes(), summary).await?;

        for (chunk_index, chunk) in tables.chunks(chunk_size).enumerate() {
            info!("Start a chunk with {} tables", chunk.len());
            summary.chunks += 1;

            let result = async {
                for (offset, table) in chunk.iter().enumerate() {
                    let index = chunk_index * chunk_size + offset;
                    let session = tokio::select! {
                        biased;
                        _ = cancelled(self.cancel_token.as_ref()) => {
                            return Err(ExportError::Interrupted.into());
                        }
                        session = self.provider.open() => session?,
                    };
                    let job = ExportJob {
                        index,
                        table: table.clone(),
                        session,
                        target_path: artifact_path(run_dir, index, &table.name),
                    };
                    debug!("Dispatching table {}", table.name);
                    workers.spawn(self.worker.clone().run(job, channel.sender()));
                }
                self.drain_chunk(chunk.len(), &mut channel, &mut workers, output, summary, &tracker)
                    .await
            }
            .await;

            if let Err(e) = result {
                workers.shutdown().await;
                tracker.finish();
                return Err(e);
            }
            info!("Chunk finish!");
        }

        tracker.finish();
        debug!("Merged {} tables", tracker.processed());

        write_output(output, SESSION_RESTORE.as_bytes(), summary).await?;
        if self.settings.write_header {
            let footer = format!("-- Dump completed: {}\n", chrono::Local::now().to_rfc3339());
            write_output(output, footer.as_bytes(), summary).await?;
        }
        Ok(())
    }

    /// Drain exactly `expected` completion signals and merge each one
    async fn drain_chunk(
        &self,
        expected: usize,
        channel: &mut CompletionChannel,
        workers: &mut JoinSet<()>,
        output: &mut Output,
        summary: &mut ExportSummary,
        tracker: &ProgressTracker,
    ) -> Result<()> {
        let mut drained = 0;
        while drained < expected {
            let signal = tokio::select! {
                biased;
                signal = channel.receive() => match signal {
                    Some(signal) => signal,
                    None => {
                        let reason = "completion channel closed".to_string();
                        return Err(ExportError::WorkerPanicked(reason).into());
                    }
                },
                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    if let Err(e) = joined {
                        return Err(ExportError::WorkerPanicked(e.to_string()).into());
                    }
                    continue;
                }
                _ = cancelled(self.cancel_token.as_ref()) => {
                    return Err(ExportError::Interrupted.into());
                }
            };

            drained += 1;
            let table = signal.table.clone();
            self.merge(signal, output, summary).await?;
            tracker.table_merged(&table);
        }

        // Every worker of the chunk has signalled; join them before the next chunk.
        while let Some(joined) = workers.join_next().await {
            joined.map_err(|e| ExportError::WorkerPanicked(e.to_string()))?;
        }
        Ok(())
    }

    /// Append one completed artifact to the output and delete it
    async fn merge(
        &self,
        signal: CompletionSignal,
        output: &mut Output,
        summary: &mut ExportSummary,
    ) -> Result<()> {
        let CompletionSignal {
            table,
            target_path,
            outcome,
            ..
        } = signal;

        match outcome {
            WorkerOutcome::Completed(stats) => {
                let bytes = copy_artifact(&target_path, output).await?;
                debug!("Merged {} ({} bytes)", table, bytes);
                summary.tables_exported += 1;
                summary.rows_exported += stats.rows;
                summary.bytes_written += bytes;
                Ok(())
            }
            WorkerOutcome::Failed(reason) => match self.settings.on_table_error {
                TableErrorPolicy::Abort => Err(ExportError::TableFailed { table, reason }.into()),
                TableErrorPolicy::Mark => {
                    warn!("Marking table {} as failed: {}", table, reason);
                    let marker = error_marker(&table, &reason);
                    write_output(output, marker.as_bytes(), summary).await?;
                    if let Err(e) = fs::remove_file(&target_path).await {
                        if e.kind() != std::io::ErrorKind::NotFound {
                            return Err(ExportError::Merge {
                                path: target_path,
                                source: e,
                            }
                            .into());
                        }
                    }
                    summary.tables_failed.push(table);
                    Ok(())
                }
            },
        }
    }

    async fn write_header(&self, output: &mut Output, summary: &mut ExportSummary) -> Result<()> {
        let header = format!(
            "-- tabledump {}\n-- Database: {}\n-- Started: {}\n\n",
            crate::VERSION,
            self.provider.database(),
            chrono::Local::now().to_rfc3339()
        );
        write_output(output, header.as_bytes(), summary).await
    }
}

/// Copy an artifact onto the end of the output, then remove it
async fn copy_artifact(path: &Path, output: &mut Output) -> Result<u64> {
    let merge_err = |source| ExportError::Merge {
        path: path.to_path_buf(),
        source,
    };

    let mut source = File::open(path).await.map_err(merge_err)?;
    let bytes = tokio::io::copy(&mut source, output)
        .await
        .map_err(merge_err)?;
    drop(source);
    fs::remove_file(path).await.map_err(merge_err)?;
    Ok(bytes)
}

/// Append bytes written by the orchestrator itself, outside any table block
async fn write_output(
    output: &mut Output,
    bytes: &[u8],
    summary: &mut ExportSummary,
) -> Result<()> {
    output.write_all(bytes).await?;
    summary.bytes_written += bytes.len() as u64;
    Ok(())
}

/// Flush and sync the output file
async fn close_output(mut output: Output, path: &Path) -> Result<()> {
    let close_err = |source| ExportError::OutputClose {
        path: path.to_path_buf(),
        source,
    };

    output.flush().await.map_err(close_err)?;
    output.get_ref().sync_all().await.map_err(close_err)?;
    Ok(())
}

/// Per-table artifact location inside the run directory
///
/// The dispatch index keeps names unique after sanitizing.
pub fn artifact_path(run_dir: &Path, index: usize, table: &str) -> PathBuf {
    let safe: String = table
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    run_dir.join(format!("{index:05}_{safe}.sql"))
}

/// Block written in place of a table whose export failed
pub fn error_marker(table: &str, reason: &str) -> String {
    let reason = reason.replace('\n', " ");
    format!(
        "--\n-- Export of table {} failed: {}\n--\n\n",
        quote_identifier(table),
        reason
    )
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
