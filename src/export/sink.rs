//! Per-table artifact sink
//!
//! A table worker pushes output fragments into a bounded queue while a
//! background writer task appends them to the artifact file. Fragments are
//! written in push order.

use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::error::{ExportError, Result};

/// Number of fragments buffered between the worker and the writer
pub const DEFAULT_SINK_CAPACITY: usize = 64;

/// Single-producer queue in front of an artifact file
pub struct ArtifactSink {
    path: PathBuf,
    tx: mpsc::Sender<String>,
    writer: JoinHandle<Result<u64>>,
}

impl ArtifactSink {
    /// Create the artifact file and start its writer
    ///
    /// # Arguments
    /// * `path` - Artifact file, truncated if it exists
    /// * `capacity` - Fragments buffered before `push` waits
    pub async fn create(path: impl Into<PathBuf>, capacity: usize) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path).await?;
        Ok(Self::with_writer(path, BufWriter::new(file), capacity))
    }

    /// Start a sink over any async writer
    pub fn with_writer<W>(path: PathBuf, writer: W, capacity: usize) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let writer = tokio::spawn(run(rx, writer));
        Self { path, tx, writer }
    }

    /// Queue a fragment for writing
    ///
    /// Fails with `SinkClosed` when the writer has stopped; `finish` then
    /// returns the underlying write error.
    pub async fn push(&self, fragment: impl Into<String>) -> Result<()> {
        self.tx
            .send(fragment.into())
            .await
            .map_err(|_| ExportError::SinkClosed(self.path.clone()).into())
    }

    /// Signal the end of output and wait for the writer to close the file
    ///
    /// # Returns
    /// * `Result<u64>` - Bytes written to the artifact
    pub async fn finish(self) -> Result<u64> {
        drop(self.tx);
        match self.writer.await {
            Ok(result) => result,
            Err(e) => Err(ExportError::WorkerPanicked(e.to_string()).into()),
        }
    }
}

/// Drain loop: append every fragment, then flush and shut the writer down
pub async fn run<W>(mut rx: mpsc::Receiver<String>, mut writer: W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    while let Some(fragment) = rx.recv().await {
        writer.write_all(fragment.as_bytes()).await?;
        written += fragment.len() as u64;
    }
    writer.shutdown().await?;
    trace!("Artifact writer finished after {} bytes", written);
    Ok(written)
}
