//! Runtime counters.
//!
//! Updated lock-free by publishers and workers; read through a [`BusStats`]
//! snapshot.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::registry::DispatchOutcome;

#[derive(Debug, Default)]
pub(crate) struct Counters {
    published: AtomicU64,
    rejected: AtomicU64,
    dispatched: AtomicU64,
    invocations: AtomicU64,
    panics: AtomicU64,
}

impl Counters {
    pub(crate) fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatch(&self, outcome: DispatchOutcome) {
        self.invocations
            .fetch_add(outcome.invoked as u64, Ordering::Relaxed);
        self.panics
            .fetch_add(outcome.panicked as u64, Ordering::Relaxed);
        // Last, so a reader that sees the event as dispatched also sees its invocations.
        self.dispatched.fetch_add(1, Ordering::Release);
    }

    pub(crate) fn snapshot(&self) -> BusStats {
        let dispatched = self.dispatched.load(Ordering::Acquire);
        BusStats {
            published: self.published.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            dispatched,
            handler_invocations: self.invocations.load(Ordering::Relaxed),
            handler_panics: self.panics.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the bus counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    /// Events accepted onto the queue.
    pub published: u64,
    /// Publish calls refused because no handler was registered.
    pub rejected: u64,
    /// Events taken off the queue and dispatched.
    pub dispatched: u64,
    /// Handler calls that returned normally.
    pub handler_invocations: u64,
    /// Handler calls that panicked and were contained.
    pub handler_panics: u64,
}

impl BusStats {
    /// Events accepted but not yet dispatched.
    pub fn in_flight(&self) -> u64 {
        self.published.saturating_sub(self.dispatched)
    }
}
