//! Error-context capability
//!
//! Maps internal numeric condition codes to structured, user-facing errors
//! with stable codes and message templates. Resolution never fails: unknown
//! internal codes fall back to a generic error instead of crashing.

use serde::Serialize;
use std::sync::Arc;

/// Structured user-facing error. `code` and `state` are stable across
/// server versions; `template` may be reworded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserError {
    pub code: u32,
    pub state: &'static str,
    pub template: &'static str,
}

impl UserError {
    /// Render the template with positional `{}` arguments.
    pub fn render(&self, args: &[&str]) -> String {
        let mut out = String::with_capacity(self.template.len() + 16);
        let mut parts = self.template.split("{}");
        if let Some(first) = parts.next() {
            out.push_str(first);
        }
        let mut args = args.iter();
        for part in parts {
            out.push_str(args.next().copied().unwrap_or("?"));
            out.push_str(part);
        }
        out
    }
}

pub trait ErrorContextService: Send + Sync {
    /// Resolve an internal code. Total function; unknown codes map to the
    /// generic fallback.
    fn resolve(&self, internal_code: u32) -> UserError;
}

// Internal condition codes engines report. Stable mapping table.
const ERROR_TABLE: &[(u32, UserError)] = &[
    (1022, UserError { code: 1022, state: "23000", template: "Can't write; duplicate key in table '{}'" }),
    (1205, UserError { code: 1205, state: "HY000", template: "Lock wait timeout exceeded; try restarting transaction" }),
    (1213, UserError { code: 1213, state: "40001", template: "Deadlock found when trying to get lock; try restarting transaction" }),
    (1206, UserError { code: 1206, state: "HY000", template: "The total number of locks exceeds the lock table size" }),
    (1114, UserError { code: 1114, state: "HY000", template: "The table '{}' is full" }),
    (1317, UserError { code: 1317, state: "70100", template: "Query execution was interrupted" }),
    (4025, UserError { code: 4025, state: "40001", template: "Transaction aborted by replication certification; retry" }),
];

const FALLBACK: UserError = UserError {
    code: 1105,
    state: "HY000",
    template: "Unknown error {}",
};

pub struct StaticErrorTable;

impl ErrorContextService for StaticErrorTable {
    fn resolve(&self, internal_code: u32) -> UserError {
        ERROR_TABLE
            .iter()
            .find(|(code, _)| *code == internal_code)
            .map(|(_, err)| err.clone())
            .unwrap_or(FALLBACK)
    }
}

pub fn service() -> Arc<dyn ErrorContextService> {
    Arc::new(StaticErrorTable)
}
