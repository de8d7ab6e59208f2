//! Progress-reporting capability
//!
//! Monotone progress counter plus a total per session, queryable by
//! administrative observers. Advisory only; no real-time guarantee.

use crate::session::Session;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Per-session progress slot. Lives inside the session so it disappears
/// with it.
pub struct ProgressSlot {
    done: AtomicU64,
    total: AtomicU64,
}

impl ProgressSlot {
    pub fn new() -> Self {
        ProgressSlot {
            done: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }
}

impl Default for ProgressSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot for administrative observers.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub session: u64,
    pub done: u64,
    pub total: u64,
}

pub trait ProgressService: Send + Sync {
    /// Start (or restart) reporting with a known total. Resets the counter.
    fn begin(&self, session: &Session, total: u64);

    /// Advance the counter. Saturates at the total when one is set.
    fn advance(&self, session: &Session, delta: u64);

    /// Current snapshot for the session.
    fn snapshot(&self, session: &Session) -> ProgressSnapshot;
}

pub struct SessionProgress;

impl ProgressService for SessionProgress {
    fn begin(&self, session: &Session, total: u64) {
        let slot = session.progress();
        slot.total.store(total, Ordering::Relaxed);
        slot.done.store(0, Ordering::Relaxed);
    }

    fn advance(&self, session: &Session, delta: u64) {
        let slot = session.progress();
        let total = slot.total.load(Ordering::Relaxed);
        let prev = slot.done.fetch_add(delta, Ordering::Relaxed);
        // Pull the raw counter back on overshoot. The add and the store are
        // not one atomic step, so snapshots clamp independently.
        if total > 0 && prev + delta > total {
            slot.done.store(total, Ordering::Relaxed);
        }
    }

    fn snapshot(&self, session: &Session) -> ProgressSnapshot {
        let slot = session.progress();
        let total = slot.total.load(Ordering::Relaxed);
        let done = slot.done.load(Ordering::Relaxed);
        ProgressSnapshot {
            session: session.id(),
            done: if total > 0 { done.min(total) } else { done },
            total,
        }
    }
}

pub fn service() -> Arc<dyn ProgressService> {
    Arc::new(SessionProgress)
}
