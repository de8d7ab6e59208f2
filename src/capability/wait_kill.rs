//! Wait/kill capability
//!
//! Cooperative interruption. Modules bracket blocking operations with
//! `begin_wait`/`end_wait` so the server can account for blocked sessions,
//! and poll `is_killed` at bounded intervals during long operations. There
//! are no interrupts; a kill is observed at the next poll.

use crate::session::Session;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// One per session. Set asynchronously by an administrative actor, read
/// cooperatively by the session's own execution loop.
pub struct KillFlag {
    killed: AtomicBool,
}

impl KillFlag {
    pub fn new() -> Self {
        KillFlag {
            killed: AtomicBool::new(false),
        }
    }

    pub fn set(&self) {
        self.killed.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }
}

impl Default for KillFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// What a session is blocked on, for wait accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitKind {
    RowLock,
    TableLock,
    DiskIo,
    Network,
    Other,
}

/// Per-session wait bookkeeping. Waits nest; `end_wait` closes the
/// innermost one.
pub struct WaitState {
    stack: Mutex<Vec<WaitKind>>,
}

impl WaitState {
    pub fn new() -> Self {
        WaitState {
            stack: Mutex::new(Vec::new()),
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.lock().len()
    }
}

impl Default for WaitState {
    fn default() -> Self {
        Self::new()
    }
}

pub trait WaitKillService: Send + Sync {
    /// Mark the session as entering a blocking operation.
    fn begin_wait(&self, session: &Session, kind: WaitKind);

    /// Mark the session as leaving its innermost blocking operation.
    fn end_wait(&self, session: &Session);

    /// Non-blocking poll of the session's kill flag.
    fn is_killed(&self, session: &Session) -> bool;

    /// Number of sessions currently blocked on `kind`, advisory.
    fn waiting_count(&self, kind: WaitKind) -> usize;
}

/// Server implementation with global per-kind counters.
pub struct CooperativeWaitKill {
    waiting: RwLock<HashMap<WaitKind, Arc<AtomicUsize>>>,
}

impl CooperativeWaitKill {
    pub fn new() -> Self {
        CooperativeWaitKill {
            waiting: RwLock::new(HashMap::new()),
        }
    }

    fn counter(&self, kind: WaitKind) -> Arc<AtomicUsize> {
        if let Some(c) = self.waiting.read().get(&kind) {
            return c.clone();
        }
        self.waiting
            .write()
            .entry(kind)
            .or_insert_with(|| Arc::new(AtomicUsize::new(0)))
            .clone()
    }
}

impl Default for CooperativeWaitKill {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitKillService for CooperativeWaitKill {
    fn begin_wait(&self, session: &Session, kind: WaitKind) {
        session.wait_state().stack.lock().push(kind);
        self.counter(kind).fetch_add(1, Ordering::Relaxed);
    }

    fn end_wait(&self, session: &Session) {
        let popped = session.wait_state().stack.lock().pop();
        debug_assert!(popped.is_some(), "end_wait without matching begin_wait");
        if let Some(kind) = popped {
            self.counter(kind).fetch_sub(1, Ordering::Relaxed);
        }
    }

    fn is_killed(&self, session: &Session) -> bool {
        session.kill_flag().is_set()
    }

    fn waiting_count(&self, kind: WaitKind) -> usize {
        self.waiting
            .read()
            .get(&kind)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

pub fn service() -> Arc<dyn WaitKillService> {
    Arc::new(CooperativeWaitKill::new())
}
