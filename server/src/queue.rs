//! Handoff queue between the receiver worker and the engine loop.

use std::sync::{Mutex, PoisonError};

use shared::ClientInput;

/// An input bound to the simulation tick it must be applied at. Produced by
/// the receiver worker, consumed by the engine loop.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedInput {
    pub target_sim_tick: u64,
    pub input: ClientInput,
}

/// Single-producer single-consumer FIFO with swap-based draining.
///
/// The consumer exchanges its recycled scratch buffer for the queued batch,
/// so the lock is held for a pointer swap rather than for the length of the
/// work. Inputs pushed concurrently with a drain land in the next batch.
/// There is no size cap; admission pressure belongs to the transport layer.
#[derive(Debug, Default)]
pub struct HandoffQueue {
    inner: Mutex<Vec<QueuedInput>>,
}

impl HandoffQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one input under the lock.
    pub fn push(&self, queued: QueuedInput) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(queued);
    }

    /// Swaps the queued batch into `out` in O(1). `out` is cleared first and
    /// its backing storage becomes the queue's next buffer.
    pub fn drain_into(&self, out: &mut Vec<QueuedInput>) {
        out.clear();
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::swap(&mut *guard, out);
    }
}
