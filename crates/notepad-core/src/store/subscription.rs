//! Cancellable live snapshot subscriptions.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::CollectionPath;
use crate::error::Result;
use crate::models::Snapshot;

const SNAPSHOT_BUFFER: usize = 16;

/// Consumer side of a live query over one collection.
///
/// Yields a full snapshot every time the collection changes. The consumer
/// owns cancellation: once [`Subscription::cancel`] is called (or the value is
/// dropped) `next` returns `None` and nothing buffered leaks through.
pub struct Subscription {
    path: CollectionPath,
    receiver: mpsc::Receiver<Result<Snapshot>>,
    cancel: CancellationToken,
}

/// Producer side handed to the task that feeds a [`Subscription`].
#[derive(Clone)]
pub struct SnapshotSender {
    sender: mpsc::Sender<Result<Snapshot>>,
    cancel: CancellationToken,
}

impl Subscription {
    /// Create a connected producer/consumer pair for `path`.
    pub fn channel(path: CollectionPath) -> (SnapshotSender, Self) {
        let (sender, receiver) = mpsc::channel(SNAPSHOT_BUFFER);
        let cancel = CancellationToken::new();
        (
            SnapshotSender {
                sender,
                cancel: cancel.clone(),
            },
            Self {
                path,
                receiver,
                cancel,
            },
        )
    }

    /// Wait for the next snapshot (or subscription error).
    ///
    /// Returns `None` once cancelled or when the producer has stopped.
    pub async fn next(&mut self) -> Option<Result<Snapshot>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            item = self.receiver.recv() => item,
        }
    }

    /// Stop the subscription and its producer task.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!("Cancelling subscription on {}", self.path);
            self.cancel.cancel();
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Collection this subscription is scoped to
    #[must_use]
    pub const fn path(&self) -> &CollectionPath {
        &self.path
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl SnapshotSender {
    /// Deliver a snapshot. Returns `false` when the consumer is gone or has
    /// cancelled, meaning the producer should stop.
    pub async fn send(&self, item: Result<Snapshot>) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            sent = self.sender.send(item) => sent.is_ok(),
        }
    }

    /// Resolves when the consumer cancels.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.sender.is_closed()
    }
}
