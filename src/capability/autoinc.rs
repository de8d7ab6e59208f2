//! Auto-increment capability
//!
//! Per-table next-value bookkeeping. Engines reserve contiguous ranges so
//! bulk inserts take the table lock once per batch instead of once per row.

use crate::error::{Result, ServiceError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

pub trait AutoIncrementService: Send + Sync {
    /// Reserve `count` consecutive values for `table`, returning the range.
    fn reserve(&self, table: &str, count: u64) -> Result<Range<u64>>;

    /// Next value that would be handed out, advisory.
    fn peek(&self, table: &str) -> u64;

    /// Raise the counter to at least `floor`. Used after bulk loads that
    /// wrote explicit values. Never lowers the counter.
    fn set_floor(&self, table: &str, floor: u64);
}

pub struct AutoIncrementTable {
    counters: Mutex<HashMap<String, u64>>,
    first_value: u64,
}

impl AutoIncrementTable {
    pub fn new(first_value: u64) -> Self {
        AutoIncrementTable {
            counters: Mutex::new(HashMap::new()),
            first_value,
        }
    }
}

impl AutoIncrementService for AutoIncrementTable {
    fn reserve(&self, table: &str, count: u64) -> Result<Range<u64>> {
        if count == 0 {
            return Err(ServiceError::CapabilityFailure(
                "auto-increment reservation of zero values".to_string(),
            ));
        }
        let mut counters = self.counters.lock();
        let next = counters.entry(table.to_string()).or_insert(self.first_value);
        let start = *next;
        let end = start.checked_add(count).ok_or_else(|| {
            ServiceError::CapabilityFailure(format!("auto-increment exhausted for '{}'", table))
        })?;
        *next = end;
        Ok(start..end)
    }

    fn peek(&self, table: &str) -> u64 {
        self.counters
            .lock()
            .get(table)
            .copied()
            .unwrap_or(self.first_value)
    }

    fn set_floor(&self, table: &str, floor: u64) {
        let mut counters = self.counters.lock();
        let next = counters.entry(table.to_string()).or_insert(self.first_value);
        if floor > *next {
            *next = floor;
        }
    }
}

pub fn service(first_value: u64) -> Arc<dyn AutoIncrementService> {
    Arc::new(AutoIncrementTable::new(first_value))
}
