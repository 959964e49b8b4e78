//! Ordered write-through.
//!
//! Adapter calls happen outside the table lock, but must reach the backend in
//! the same order the table applied the mutations. Each mutation reserves a
//! ticket while it still holds the table write lock; tickets are then served
//! strictly in order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use super::Persistence;
use crate::error::Result;

/// An adapter plus the ticket queue that orders calls into it.
pub struct WriteThrough {
    adapter: Arc<dyn Persistence>,
    next: AtomicU64,
    serving: Mutex<u64>,
    turn: Condvar,
}

impl WriteThrough {
    pub fn new(adapter: Arc<dyn Persistence>) -> Self {
        Self {
            adapter,
            next: AtomicU64::new(0),
            serving: Mutex::new(0),
            turn: Condvar::new(),
        }
    }

    /// Reserves the next slot in the queue.
    ///
    /// Must be called under the lock that orders the in-memory mutation, so ticket
    /// order matches mutation order.
    pub fn reserve(self: &Arc<Self>) -> PendingWrite {
        PendingWrite {
            owner: Arc::clone(self),
            ticket: self.next.fetch_add(1, Ordering::Relaxed),
        }
    }

    fn wait_for(&self, ticket: u64) -> MutexGuard<'_, u64> {
        let mut serving = self.serving.lock().unwrap_or_else(PoisonError::into_inner);
        while *serving != ticket {
            serving = self
                .turn
                .wait(serving)
                .unwrap_or_else(PoisonError::into_inner);
        }
        serving
    }
}

/// A reserved slot. Dropping it without [`PendingWrite::apply`] still waits its
/// turn and passes it on, so the queue never stalls.
#[must_use = "a reserved write blocks later writes until applied or dropped"]
pub struct PendingWrite {
    owner: Arc<WriteThrough>,
    ticket: u64,
}

impl PendingWrite {
    /// Waits for every earlier ticket, then runs `f` against the adapter.
    pub fn apply(self, f: impl FnOnce(&dyn Persistence) -> Result<()>) -> Result<()> {
        drop(self.owner.wait_for(self.ticket));
        // Only this ticket can advance `serving` now; `Drop` hands the turn on
        f(self.owner.adapter.as_ref())
    }
}

impl Drop for PendingWrite {
    fn drop(&mut self) {
        let mut serving = self.owner.wait_for(self.ticket);
        *serving += 1;
        drop(serving);
        self.owner.turn.notify_all();
    }
}
