use {
    parking_lot::Mutex,
    std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    tresor_protocol::TransferId,
};

/// Lifecycle of one transfer. `Completed`, `Canceled` and `Failed` are
/// terminal; a session never leaves a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Pending,
    InProgress,
    Completed,
    Canceled,
    Failed,
}

impl TransferStatus {
    #[must_use]
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Canceled | Self::Failed)
    }
}

/// Shared state of one upload or download.
///
/// The controller mutates it as chunks complete; any other thread may observe
/// progress or request cancellation through a clone of the [`Arc`] handle.
/// Cancellation is cooperative: the controller notices the flag at the next
/// chunk boundary.
///
/// [`Arc`]: std::sync::Arc
#[derive(Debug)]
pub struct TransferSession {
    transfer_id: TransferId,
    source_length: Mutex<Option<u64>>,
    bytes_transferred: AtomicU64,
    chunk_retries: AtomicU32,
    cancelled: AtomicBool,
    status: Mutex<TransferStatus>,
}

impl TransferSession {
    #[must_use]
    #[inline]
    pub fn new(source_length: Option<u64>) -> Self {
        Self {
            transfer_id: TransferId::generate(),
            source_length: Mutex::new(source_length),
            bytes_transferred: AtomicU64::new(0),
            chunk_retries: AtomicU32::new(0),
            cancelled: AtomicBool::new(false),
            status: Mutex::new(TransferStatus::Pending),
        }
    }

    #[must_use]
    #[inline]
    pub fn transfer_id(&self) -> &TransferId {
        &self.transfer_id
    }

    /// Requests cooperative cancellation.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    #[must_use]
    #[inline]
    pub fn source_length(&self) -> Option<u64> {
        *self.source_length.lock()
    }

    pub(crate) fn set_source_length(&self, length: Option<u64>) {
        *self.source_length.lock() = length;
    }

    #[must_use]
    #[inline]
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred.load(Ordering::Relaxed)
    }

    pub(crate) fn add_bytes(&self, count: u64) {
        self.bytes_transferred.fetch_add(count, Ordering::Relaxed);
    }

    /// Fraction of the transfer done, if the total length is known.
    #[must_use]
    #[inline]
    pub fn progress(&self) -> Option<f64> {
        let length = self.source_length()?;
        if length == 0 {
            return Some(1.0);
        }
        #[expect(clippy::cast_precision_loss, reason = "progress display only")]
        let fraction = self.bytes_transferred() as f64 / length as f64;
        Some(fraction.min(1.0))
    }

    #[must_use]
    #[inline]
    pub fn chunk_retries(&self) -> u32 {
        self.chunk_retries.load(Ordering::Relaxed)
    }

    pub(crate) fn note_chunk_retry(&self) {
        self.chunk_retries.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    #[inline]
    pub fn status(&self) -> TransferStatus {
        *self.status.lock()
    }

    /// Moves the session to `next` unless it already reached a terminal
    /// status.
    pub(crate) fn transition(&self, next: TransferStatus) {
        let mut status = self.status.lock();
        if !status.is_terminal() {
            *status = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_status_sticks() {
        let session = TransferSession::new(Some(100));
        assert_eq!(session.status(), TransferStatus::Pending);
        session.transition(TransferStatus::InProgress);
        session.transition(TransferStatus::Canceled);
        session.transition(TransferStatus::Completed);
        assert_eq!(session.status(), TransferStatus::Canceled);
    }

    #[test]
    fn progress_fraction() {
        let session = TransferSession::new(Some(200));
        assert_eq!(session.progress(), Some(0.0));
        session.add_bytes(50);
        assert_eq!(session.progress(), Some(0.25));
        session.add_bytes(150);
        assert_eq!(session.progress(), Some(1.0));

        let unknown = TransferSession::new(None);
        unknown.add_bytes(10);
        assert_eq!(unknown.progress(), None);
    }

    #[test]
    fn cancellation_flag() {
        let session = TransferSession::new(None);
        assert!(!session.is_cancelled());
        session.cancel();
        assert!(session.is_cancelled());
    }
}
