//! Allocation capability
//!
//! Scoped arena allocation tied to a session's lifetime. Modules receive
//! opaque handles into the arena rather than raw pointers; the session owns
//! the backing memory, so everything is reclaimed when the session ends even
//! if a module leaks its handles.

use crate::error::{Result, ServiceError};
use crate::session::Session;
use parking_lot::Mutex;
use std::sync::Arc;

/// Opaque handle to a slice of arena memory. Valid until the owning
/// session's arena is reset or the session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaHandle {
    index: usize,
    generation: u64,
}

struct ArenaInner {
    buffers: Vec<Box<[u8]>>,
    allocated_bytes: usize,
    generation: u64,
}

/// Session-owned arena. Interior mutability so capability calls can allocate
/// through a shared `&Session`; intended for use from the session's own
/// thread only.
pub struct SessionArena {
    inner: Mutex<ArenaInner>,
}

impl SessionArena {
    pub fn new() -> Self {
        SessionArena {
            inner: Mutex::new(ArenaInner {
                buffers: Vec::new(),
                allocated_bytes: 0,
                generation: 0,
            }),
        }
    }

    pub fn alloc(&self, len: usize) -> ArenaHandle {
        let mut inner = self.inner.lock();
        let index = inner.buffers.len();
        inner.buffers.push(vec![0u8; len].into_boxed_slice());
        inner.allocated_bytes += len;
        ArenaHandle {
            index,
            generation: inner.generation,
        }
    }

    pub fn write(&self, handle: ArenaHandle, offset: usize, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        if handle.generation != inner.generation {
            return Err(ServiceError::CapabilityFailure(
                "stale arena handle (arena was reset)".to_string(),
            ));
        }
        let buf = inner
            .buffers
            .get_mut(handle.index)
            .ok_or_else(|| ServiceError::CapabilityFailure("invalid arena handle".to_string()))?;
        let end = offset
            .checked_add(data.len())
            .filter(|&e| e <= buf.len())
            .ok_or_else(|| ServiceError::CapabilityFailure("arena write out of bounds".to_string()))?;
        buf[offset..end].copy_from_slice(data);
        Ok(())
    }

    pub fn read(&self, handle: ArenaHandle) -> Result<Vec<u8>> {
        let inner = self.inner.lock();
        if handle.generation != inner.generation {
            return Err(ServiceError::CapabilityFailure(
                "stale arena handle (arena was reset)".to_string(),
            ));
        }
        inner
            .buffers
            .get(handle.index)
            .map(|b| b.to_vec())
            .ok_or_else(|| ServiceError::CapabilityFailure("invalid arena handle".to_string()))
    }

    /// Drop every allocation at once. Outstanding handles become stale.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.buffers.clear();
        inner.allocated_bytes = 0;
        inner.generation += 1;
    }

    pub fn allocated_bytes(&self) -> usize {
        self.inner.lock().allocated_bytes
    }
}

impl Default for SessionArena {
    fn default() -> Self {
        Self::new()
    }
}

/// Service surface handed to modules.
pub trait AllocationService: Send + Sync {
    fn alloc(&self, session: &Session, len: usize) -> ArenaHandle;
    fn write(&self, session: &Session, handle: ArenaHandle, offset: usize, data: &[u8])
        -> Result<()>;
    fn read(&self, session: &Session, handle: ArenaHandle) -> Result<Vec<u8>>;
    fn allocated_bytes(&self, session: &Session) -> usize;
}

/// Server-side implementation: delegates to the calling session's arena.
pub struct ArenaAllocationService;

impl AllocationService for ArenaAllocationService {
    fn alloc(&self, session: &Session, len: usize) -> ArenaHandle {
        session.arena().alloc(len)
    }

    fn write(
        &self,
        session: &Session,
        handle: ArenaHandle,
        offset: usize,
        data: &[u8],
    ) -> Result<()> {
        session.arena().write(handle, offset, data)
    }

    fn read(&self, session: &Session, handle: ArenaHandle) -> Result<Vec<u8>> {
        session.arena().read(handle)
    }

    fn allocated_bytes(&self, session: &Session) -> usize {
        session.arena().allocated_bytes()
    }
}

pub fn service() -> Arc<dyn AllocationService> {
    Arc::new(ArenaAllocationService)
}
