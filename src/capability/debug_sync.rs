//! Debug-sync capability
//!
//! Named rendezvous points for deterministic test interleavings. A thread
//! blocks at `wait_at` until another thread calls `signal` for the same
//! point or the timeout elapses. Points are created on first reference and
//! cleared at session end or server shutdown.
//!
//! Disabled in production configs; `wait_at` becomes a no-op then, so
//! instrumented code paths cost nothing outside test runs.

use crate::error::{Result, ServiceError};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct SyncPoint {
    state: Mutex<SyncPointState>,
    cond: Condvar,
}

#[derive(Default)]
struct SyncPointState {
    // Pending signals; each wait_at consumes one.
    signals: u32,
    waiters: u32,
}

impl SyncPoint {
    fn new() -> Self {
        SyncPoint {
            state: Mutex::new(SyncPointState::default()),
            cond: Condvar::new(),
        }
    }
}

pub trait DebugSyncService: Send + Sync {
    /// Block until `signal(name)` or timeout. `TimeoutExceeded` after the
    /// timeout elapses without a signal.
    fn wait_at(&self, name: &str, timeout: Duration) -> Result<()>;

    /// Wake one waiter at the point; if none is waiting yet, the signal is
    /// remembered and consumed by the next `wait_at`.
    fn signal(&self, name: &str);

    /// Drop all points and pending signals. Called at test-session end and
    /// server shutdown.
    fn clear(&self);

    /// Number of threads currently blocked at `name`, for test assertions.
    fn waiter_count(&self, name: &str) -> u32;
}

pub struct SyncPointTable {
    points: Mutex<HashMap<String, Arc<SyncPoint>>>,
    enabled: AtomicBool,
}

impl SyncPointTable {
    pub fn new(enabled: bool) -> Self {
        SyncPointTable {
            points: Mutex::new(HashMap::new()),
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    fn point(&self, name: &str) -> Arc<SyncPoint> {
        self.points
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(SyncPoint::new()))
            .clone()
    }
}

impl DebugSyncService for SyncPointTable {
    fn wait_at(&self, name: &str, timeout: Duration) -> Result<()> {
        if !self.enabled.load(Ordering::Acquire) {
            return Ok(());
        }
        let point = self.point(name);
        let deadline = Instant::now() + timeout;

        let mut state = point.state.lock();
        state.waiters += 1;
        while state.signals == 0 {
            if point.cond.wait_until(&mut state, deadline).timed_out() {
                state.waiters -= 1;
                return Err(ServiceError::TimeoutExceeded {
                    point: name.to_string(),
                    waited_ms: timeout.as_millis() as u64,
                });
            }
        }
        state.signals -= 1;
        state.waiters -= 1;
        Ok(())
    }

    fn signal(&self, name: &str) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }
        let point = self.point(name);
        let mut state = point.state.lock();
        state.signals += 1;
        point.cond.notify_one();
    }

    fn clear(&self) {
        self.points.lock().clear();
    }

    fn waiter_count(&self, name: &str) -> u32 {
        let point = match self.points.lock().get(name) {
            Some(p) => p.clone(),
            None => return 0,
        };
        let count = point.state.lock().waiters;
        count
    }
}

pub fn service(enabled: bool) -> Arc<SyncPointTable> {
    Arc::new(SyncPointTable::new(enabled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_signal_before_wait_is_consumed() {
        let table = SyncPointTable::new(true);
        table.signal("p");
        table
            .wait_at("p", Duration::from_millis(10))
            .expect("pending signal should satisfy the wait");
    }

    #[test]
    fn test_wait_times_out_without_signal() {
        let table = SyncPointTable::new(true);
        let start = Instant::now();
        let err = table.wait_at("nobody", Duration::from_millis(50)).unwrap_err();
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(matches!(err, ServiceError::TimeoutExceeded { .. }));
    }

    #[test]
    fn test_concurrent_signal_wakes_waiter() {
        let table = Arc::new(SyncPointTable::new(true));
        let waiter = {
            let table = table.clone();
            thread::spawn(move || table.wait_at("rendezvous", Duration::from_secs(5)))
        };
        // Let the waiter block, then release it.
        while table.waiter_count("rendezvous") == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        table.signal("rendezvous");
        waiter.join().unwrap().expect("signalled wait should succeed");
    }

    #[test]
    fn test_disabled_table_is_noop() {
        let table = SyncPointTable::new(false);
        table.wait_at("anything", Duration::from_secs(60)).unwrap();
        assert_eq!(table.waiter_count("anything"), 0);
    }

    #[test]
    fn test_clear_drops_pending_signals() {
        let table = SyncPointTable::new(true);
        table.signal("p");
        table.clear();
        assert!(table.wait_at("p", Duration::from_millis(10)).is_err());
    }
}
