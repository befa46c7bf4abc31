//! Chunked transfer of encrypted file content.
//!
//! Every transfer runs on its own spawned task, owning one cipher session and
//! one [`TransferSession`]. Progress and the terminal outcome are delivered
//! over a channel held by the [`TransferHandle`]; exactly one of
//! completed/failed/canceled is ever sent per transfer.

pub mod channel;
mod download;
mod session;
mod upload;

pub use download::{DownloadRequest, spawn_download};
pub use session::{TransferSession, TransferStatus};
pub use upload::{UploadRequest, spawn_upload};

use {
    crate::error::TransferError,
    serde::Deserialize,
    std::{path::PathBuf, sync::Arc},
    tokio::{sync::mpsc, task::JoinHandle},
    tresor_protocol::Node,
};

/// Default size of one transferred chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 200 * 1024;
/// Default number of delivery attempts per chunk.
pub const MAX_CHUNK_ATTEMPTS: u32 = 3;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Tuning knobs of the chunked pipeline.
///
/// Correctness never depends on the chunk size; tests run with tiny chunks.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub chunk_size: usize,
    pub max_chunk_attempts: u32,
}

impl Default for TransferConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_chunk_attempts: MAX_CHUNK_ATTEMPTS,
        }
    }
}

/// Where a finished transfer ended up.
#[derive(Debug)]
pub enum TransferOutcome {
    /// The remote node created by an upload.
    Uploaded(Node),
    /// The local location written by a download, if the target has one.
    Downloaded { location: Option<PathBuf> },
}

#[derive(Debug)]
pub enum TransferEvent {
    Progress {
        bytes_transferred: u64,
        /// Fraction complete, absent while the total size is unknown.
        fraction: Option<f64>,
    },
    Completed(TransferOutcome),
    Failed(TransferError),
    Canceled,
}

impl TransferEvent {
    #[must_use]
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

/// Caller-side handle of one running transfer.
pub struct TransferHandle {
    session: Arc<TransferSession>,
    events: mpsc::Receiver<TransferEvent>,
    task: JoinHandle<()>,
}

impl TransferHandle {
    #[must_use]
    #[inline]
    pub fn session(&self) -> &Arc<TransferSession> {
        &self.session
    }

    /// Requests cooperative cancellation; the worker notices at the next
    /// chunk boundary and reports [`TransferEvent::Canceled`].
    #[inline]
    pub fn cancel(&self) {
        self.session.cancel();
    }

    /// Next progress or terminal event. `None` once the worker is gone.
    #[inline]
    pub async fn next_event(&mut self) -> Option<TransferEvent> {
        self.events.recv().await
    }

    /// Drains events until the worker finishes and returns the terminal one.
    #[inline]
    pub async fn wait(mut self) -> Option<TransferEvent> {
        let mut terminal = None;
        while let Some(event) = self.events.recv().await {
            if event.is_terminal() {
                terminal = Some(event);
            }
        }
        let _ = self.task.await;
        terminal
    }
}

/// Maps the worker result to the session's terminal status and the terminal
/// event. Called exactly once per transfer.
fn finish(
    session: &TransferSession,
    result: Result<TransferOutcome, TransferError>,
) -> TransferEvent {
    match result {
        Ok(outcome) => {
            session.transition(TransferStatus::Completed);
            TransferEvent::Completed(outcome)
        }
        Err(TransferError::Canceled) => {
            session.transition(TransferStatus::Canceled);
            TransferEvent::Canceled
        }
        Err(err) => {
            session.transition(TransferStatus::Failed);
            TransferEvent::Failed(err)
        }
    }
}

/// Progress reports are lossy: a slow consumer drops updates, never blocks
/// the transfer.
fn emit_progress(session: &TransferSession, events: &mpsc::Sender<TransferEvent>) {
    let _ = events.try_send(TransferEvent::Progress {
        bytes_transferred: session.bytes_transferred(),
        fraction: session.progress(),
    });
}
