//! Session model
//!
//! One `Session` per client connection. The session owns the resources that
//! capability calls operate on: its allocation arena, its kill flag, its
//! wait state and its progress slots. Administrative actors hold `Arc`
//! references through the `SessionManager` but only ever touch the kill
//! flag; the arena belongs to the session's own execution thread.

use crate::capability::alloc::SessionArena;
use crate::capability::progress::ProgressSlot;
use crate::capability::wait_kill::{KillFlag, WaitState};
use crate::error::{Result, ServiceError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type SessionId = u64;

pub struct Session {
    id: SessionId,
    arena: SessionArena,
    kill: KillFlag,
    wait: WaitState,
    progress: ProgressSlot,
}

impl Session {
    fn new(id: SessionId) -> Self {
        Session {
            id,
            arena: SessionArena::new(),
            kill: KillFlag::new(),
            wait: WaitState::new(),
            progress: ProgressSlot::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn arena(&self) -> &SessionArena {
        &self.arena
    }

    pub fn kill_flag(&self) -> &KillFlag {
        &self.kill
    }

    pub fn wait_state(&self) -> &WaitState {
        &self.wait
    }

    pub fn progress(&self) -> &ProgressSlot {
        &self.progress
    }

    /// Cooperative check used by long-running capability calls.
    pub fn check_killed(&self) -> Result<()> {
        if self.kill.is_set() {
            Err(ServiceError::SessionKilled)
        } else {
            Ok(())
        }
    }
}

/// Process-wide table of active sessions.
///
/// Created alongside the registry at startup. `kill` is the administrative
/// entry point; everything else a session does goes through its own handle.
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    next_id: AtomicU64,
}

impl SessionManager {
    pub fn new() -> Self {
        SessionManager {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn create_session(&self) -> Arc<Session> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(Session::new(id));
        self.sessions.write().insert(id, session.clone());
        session
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.read().get(&id).cloned()
    }

    /// Set the kill flag on a session. Observed at the session's next poll.
    pub fn kill(&self, id: SessionId) -> Result<()> {
        let sessions = self.sessions.read();
        let session = sessions
            .get(&id)
            .ok_or(ServiceError::UnknownSession(id))?;
        session.kill_flag().set();
        tracing::debug!(session = id, "kill flag set");
        Ok(())
    }

    /// Remove a session from the table. Dropping the last `Arc` releases the
    /// arena and everything allocated from it, leaked module handles included.
    pub fn end_session(&self, id: SessionId) {
        self.sessions.write().remove(&id);
    }

    pub fn active_count(&self) -> usize {
        self.sessions.read().len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
