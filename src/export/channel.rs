//! Completion channel between table workers and the orchestrator
//!
//! Workers report "my artifact is ready" through a bounded queue sized to the
//! chunk, so a send never waits on the orchestrator. Signals surface in arrival
//! order, which defines the merge order within a chunk.

use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::error::{ExportError, Result};

/// Statistics of one exported table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    /// Rows written as INSERT statements
    pub rows: u64,
    /// Size of the per-table artifact in bytes
    pub bytes: u64,
}

/// How a table worker finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The artifact is complete
    Completed(TableStats),
    /// The export failed; the artifact may be partial or missing
    Failed(String),
}

/// The single message a worker sends back to the orchestrator
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    /// Dispatch position of the table
    pub index: usize,
    /// Table name
    pub table: String,
    /// Location of the per-table artifact
    pub target_path: PathBuf,
    /// Result of the export
    pub outcome: WorkerOutcome,
}

/// Sending half handed to each worker
#[derive(Debug, Clone)]
pub struct CompletionSender {
    tx: mpsc::Sender<CompletionSignal>,
}

impl CompletionSender {
    /// Report completion to the orchestrator
    pub async fn send(&self, signal: CompletionSignal) -> Result<()> {
        self.tx
            .send(signal)
            .await
            .map_err(|e| ExportError::SinkClosed(e.0.target_path).into())
    }
}

/// Rendezvous point owned by the orchestrator
pub struct CompletionChannel {
    tx: mpsc::Sender<CompletionSignal>,
    rx: mpsc::Receiver<CompletionSignal>,
}

impl CompletionChannel {
    /// Create a channel holding up to `capacity` undrained signals
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self { tx, rx }
    }

    /// A new sender for one worker
    pub fn sender(&self) -> CompletionSender {
        CompletionSender {
            tx: self.tx.clone(),
        }
    }

    /// Wait for the next signal
    ///
    /// The channel keeps a sender of its own, so this only returns `None`
    /// after the channel has been closed.
    pub async fn receive(&mut self) -> Option<CompletionSignal> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(index: usize, table: &str) -> CompletionSignal {
        CompletionSignal {
            index,
            table: table.to_string(),
            target_path: PathBuf::from(format!("/tmp/{table}.sql")),
            outcome: WorkerOutcome::Completed(TableStats::default()),
        }
    }

    #[tokio::test]
    async fn test_signals_arrive_in_send_order() {
        let mut channel = CompletionChannel::new(3);
        let sender = channel.sender();

        sender.send(signal(1, "orders")).await.unwrap();
        sender.send(signal(0, "users")).await.unwrap();

        assert_eq!(channel.receive().await.unwrap().table, "orders");
        assert_eq!(channel.receive().await.unwrap().table, "users");
    }

    #[tokio::test]
    async fn test_send_does_not_block_up_to_capacity() {
        let mut channel = CompletionChannel::new(2);
        let a = channel.sender();
        let b = channel.sender();

        // Both sends complete without a concurrent receiver.
        tokio_test::assert_ok!(a.send(signal(0, "a")).await);
        tokio_test::assert_ok!(b.send(signal(1, "b")).await);

        assert!(channel.receive().await.is_some());
        assert!(channel.receive().await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_senders() {
        let mut channel = CompletionChannel::new(4);
        for i in 0..4 {
            let sender = channel.sender();
            tokio::spawn(async move {
                sender.send(signal(i, &format!("t{i}"))).await.unwrap();
            });
        }

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(channel.receive().await.unwrap().index);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }
}
