use std::fmt;
use tokio::sync::{Mutex, mpsc};

/// Result of offering a block to the pending-inspection slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The block is now pending.
    Queued,
    /// The slot already held a block; the offer was dropped.
    Busy,
    /// The worker is gone.
    Closed,
}

/// Capacity-1 queue of the next block to inspect.
///
/// Offers never block: while a block is pending, newer offers are dropped.
pub struct PendingSlot {
    tx: mpsc::Sender<u64>,
    rx: Mutex<Option<mpsc::Receiver<u64>>>,
}

impl fmt::Debug for PendingSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSlot")
            .field("occupied", &(self.tx.capacity() == 0))
            .finish()
    }
}

impl Default for PendingSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingSlot {
    /// An empty slot that still owns its receiver.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Queues `block` unless another block is already pending.
    pub fn offer(&self, block: u64) -> TriggerOutcome {
        match self.tx.try_send(block) {
            Ok(()) => TriggerOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => TriggerOutcome::Busy,
            Err(mpsc::error::TrySendError::Closed(_)) => TriggerOutcome::Closed,
        }
    }

    /// Hands the receiving end to the worker. Only the first call gets it.
    pub async fn take_receiver(&self) -> Option<mpsc::Receiver<u64>> {
        self.rx.lock().await.take()
    }

    /// Removes the pending block without waiting, while no worker owns the
    /// receiver.
    pub async fn try_take(&self) -> Option<u64> {
        self.rx.lock().await.as_mut()?.try_recv().ok()
    }
}
