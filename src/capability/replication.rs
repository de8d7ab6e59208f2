//! Replication hooks
//!
//! Certification and commit-ordering callbacks invoked around transaction
//! commit. Certification assigns each transaction a ticket from a global
//! counter; a transaction may not report "committed" until every earlier
//! ticket has completed, so all sessions observe one total commit order.
//!
//! A thread waiting for its turn polls the session kill flag between
//! bounded condvar waits; a killed waiter abandons its ticket so later
//! transactions are not wedged behind it.

use crate::error::{Result, ServiceError};
use crate::session::Session;
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

// Bounded slice between kill-flag polls while blocked on ordering.
const ORDER_POLL_SLICE: Duration = Duration::from_millis(100);

/// Write set handed to certification. Keys are engine-defined (row ids,
/// unique key images).
#[derive(Debug, Clone)]
pub struct TxnContext {
    pub txn_id: u64,
    pub write_set: Vec<Vec<u8>>,
}

/// Position in the global commit order. Issued by `certify`, consumed by
/// exactly one of `wait_for_commit_order` + `commit_done`, or `abort`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CommitTicket(pub u64);

pub trait ReplicationService: Send + Sync {
    /// Certify the transaction's write set against concurrently certifying
    /// transactions. Conflict is retriable at the transaction level.
    fn certify(&self, txn: &TxnContext) -> Result<CommitTicket>;

    /// Block until every ticket before `ticket` has completed. Observes the
    /// session kill flag; a killed waiter abandons its ticket and gets
    /// `SessionKilled`.
    fn wait_for_commit_order(&self, session: &Session, ticket: CommitTicket) -> Result<()>;

    /// Mark the ticket complete, releasing its write set and waking waiters.
    fn commit_done(&self, ticket: CommitTicket);

    /// Release a certified-but-uncommitted ticket (rollback path).
    fn abort(&self, ticket: CommitTicket);
}

struct OrderState {
    next_ticket: u64,
    // Every ticket <= watermark has completed (committed or abandoned).
    watermark: u64,
    // Completed tickets beyond the watermark, waiting for the gap to close.
    completed: BTreeSet<u64>,
    // Key -> ticket holding it between certify and commit/abort.
    in_flight: HashMap<Vec<u8>, u64>,
}

pub struct OrderedCommitLog {
    state: Mutex<OrderState>,
    cond: Condvar,
}

impl OrderedCommitLog {
    pub fn new() -> Self {
        OrderedCommitLog {
            state: Mutex::new(OrderState {
                next_ticket: 1,
                watermark: 0,
                completed: BTreeSet::new(),
                in_flight: HashMap::new(),
            }),
            cond: Condvar::new(),
        }
    }

    fn complete_locked(&self, state: &mut OrderState, ticket: u64) {
        state.in_flight.retain(|_, holder| *holder != ticket);
        // A ticket at or below the watermark already counted; inserting it
        // again would leave an entry the drain loop can never remove.
        if ticket > state.watermark {
            state.completed.insert(ticket);
        }
        while state.completed.remove(&(state.watermark + 1)) {
            state.watermark += 1;
        }
        self.cond.notify_all();
    }

    /// Highest ticket whose commit (and all before it) is complete.
    pub fn committed_watermark(&self) -> u64 {
        self.state.lock().watermark
    }

    /// Completed tickets still waiting on an earlier one.
    pub fn pending_completions(&self) -> usize {
        self.state.lock().completed.len()
    }
}

impl Default for OrderedCommitLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplicationService for OrderedCommitLog {
    fn certify(&self, txn: &TxnContext) -> Result<CommitTicket> {
        let mut state = self.state.lock();
        for key in &txn.write_set {
            if state.in_flight.contains_key(key) {
                tracing::debug!(txn = txn.txn_id, "certification conflict");
                return Err(ServiceError::CertificationConflict { txn: txn.txn_id });
            }
        }
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        for key in &txn.write_set {
            state.in_flight.insert(key.clone(), ticket);
        }
        Ok(CommitTicket(ticket))
    }

    fn wait_for_commit_order(&self, session: &Session, ticket: CommitTicket) -> Result<()> {
        let mut state = self.state.lock();
        while state.watermark + 1 != ticket.0 {
            if session.kill_flag().is_set() {
                // Abandon the slot so later tickets can pass.
                self.complete_locked(&mut state, ticket.0);
                return Err(ServiceError::SessionKilled);
            }
            self.cond.wait_for(&mut state, ORDER_POLL_SLICE);
        }
        Ok(())
    }

    fn commit_done(&self, ticket: CommitTicket) {
        let mut state = self.state.lock();
        self.complete_locked(&mut state, ticket.0);
    }

    fn abort(&self, ticket: CommitTicket) {
        let mut state = self.state.lock();
        self.complete_locked(&mut state, ticket.0);
    }
}

pub fn service() -> Arc<dyn ReplicationService> {
    Arc::new(OrderedCommitLog::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionManager;
    use std::thread;

    fn txn(id: u64, keys: &[&[u8]]) -> TxnContext {
        TxnContext {
            txn_id: id,
            write_set: keys.iter().map(|k| k.to_vec()).collect(),
        }
    }

    #[test]
    fn test_certify_assigns_increasing_tickets() {
        let log = OrderedCommitLog::new();
        let t1 = log.certify(&txn(1, &[b"a"])).unwrap();
        let t2 = log.certify(&txn(2, &[b"b"])).unwrap();
        assert!(t1 < t2);
    }

    #[test]
    fn test_conflicting_write_sets_rejected() {
        let log = OrderedCommitLog::new();
        let t1 = log.certify(&txn(1, &[b"k", b"x"])).unwrap();
        let err = log.certify(&txn(2, &[b"k"])).unwrap_err();
        assert!(matches!(err, ServiceError::CertificationConflict { txn: 2 }));
        assert!(err.is_retriable());

        // After commit the key is free again.
        log.commit_done(t1);
        log.certify(&txn(3, &[b"k"])).unwrap();
    }

    #[test]
    fn test_abort_releases_write_set() {
        let log = OrderedCommitLog::new();
        let t1 = log.certify(&txn(1, &[b"k"])).unwrap();
        log.abort(t1);
        log.certify(&txn(2, &[b"k"])).unwrap();
    }

    #[test]
    fn test_out_of_order_commit_waits() {
        let log = Arc::new(OrderedCommitLog::new());
        let mgr = SessionManager::new();

        let t1 = log.certify(&txn(1, &[b"a"])).unwrap();
        let t2 = log.certify(&txn(2, &[b"b"])).unwrap();

        let second = {
            let log = log.clone();
            let session = mgr.create_session();
            thread::spawn(move || {
                log.wait_for_commit_order(&session, t2).unwrap();
                log.commit_done(t2);
            })
        };

        // Ticket 2 cannot complete before ticket 1.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(log.committed_watermark(), 0);

        let session = mgr.create_session();
        log.wait_for_commit_order(&session, t1).unwrap();
        log.commit_done(t1);
        second.join().unwrap();
        assert_eq!(log.committed_watermark(), 2);
    }

    #[test]
    fn test_killed_waiter_does_not_wedge_order() {
        let log = Arc::new(OrderedCommitLog::new());
        let mgr = SessionManager::new();

        let t1 = log.certify(&txn(1, &[b"a"])).unwrap();
        let t2 = log.certify(&txn(2, &[b"b"])).unwrap();

        let killed = mgr.create_session();
        mgr.kill(killed.id()).unwrap();
        // t2's waiter is killed while waiting for t1; it must abandon.
        let err = log.wait_for_commit_order(&killed, t2).unwrap_err();
        assert!(matches!(err, ServiceError::SessionKilled));

        // t1 still commits, and the abandoned t2 does not block the watermark.
        let session = mgr.create_session();
        log.wait_for_commit_order(&session, t1).unwrap();
        log.commit_done(t1);
        assert_eq!(log.committed_watermark(), 2);
    }

    #[test]
    fn test_stale_ticket_completion_leaves_no_residue() {
        let log = Arc::new(OrderedCommitLog::new());
        let mgr = SessionManager::new();

        let t1 = log.certify(&txn(1, &[b"a"])).unwrap();
        let t2 = log.certify(&txn(2, &[b"b"])).unwrap();

        let killed = mgr.create_session();
        mgr.kill(killed.id()).unwrap();
        log.wait_for_commit_order(&killed, t2).unwrap_err();

        let session = mgr.create_session();
        log.wait_for_commit_order(&session, t1).unwrap();
        log.commit_done(t1);
        assert_eq!(log.committed_watermark(), 2);

        // The killed waiter's cleanup path may abort a ticket the watermark
        // already passed; that must not accumulate anything.
        log.abort(t2);
        assert_eq!(log.pending_completions(), 0);

        let t3 = log.certify(&txn(3, &[b"c"])).unwrap();
        let session = mgr.create_session();
        log.wait_for_commit_order(&session, t3).unwrap();
        log.commit_done(t3);
        assert_eq!(log.committed_watermark(), 3);
        assert_eq!(log.pending_completions(), 0);
    }
}
