//! Logging capability
//!
//! Pluggable log sink for modules. Modules never write to the server log
//! directly; they emit records through the vtable, and the sink decides
//! where they go. The default sink forwards to `tracing` so module output
//! lands in the server's normal subscriber. Hot-swappable: the registry can
//! publish a replacement sink while modules are loaded.

use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct LogRecord<'a> {
    pub level: LogLevel,
    /// Module that produced the record.
    pub origin: &'a str,
    pub message: &'a str,
}

pub trait LogService: Send + Sync {
    fn log(&self, record: &LogRecord<'_>);

    fn flush(&self) {}
}

/// Default sink: forwards module records into the server's tracing
/// subscriber.
pub struct TracingLogSink;

impl LogService for TracingLogSink {
    fn log(&self, record: &LogRecord<'_>) {
        match record.level {
            LogLevel::Debug => {
                tracing::debug!(module = record.origin, "{}", record.message)
            }
            LogLevel::Info => tracing::info!(module = record.origin, "{}", record.message),
            LogLevel::Warn => tracing::warn!(module = record.origin, "{}", record.message),
            LogLevel::Error => tracing::error!(module = record.origin, "{}", record.message),
        }
    }
}

/// Discarding sink for embedded or test use.
pub struct NullLogSink;

impl LogService for NullLogSink {
    fn log(&self, _record: &LogRecord<'_>) {}
}

/// Capturing sink used by tests to assert on module log output.
pub struct MemoryLogSink {
    records: parking_lot::Mutex<Vec<(LogLevel, String, String)>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        MemoryLogSink {
            records: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<(LogLevel, String, String)> {
        self.records.lock().clone()
    }
}

impl Default for MemoryLogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogService for MemoryLogSink {
    fn log(&self, record: &LogRecord<'_>) {
        self.records.lock().push((
            record.level,
            record.origin.to_string(),
            record.message.to_string(),
        ));
    }
}

pub fn service() -> Arc<dyn LogService> {
    Arc::new(TracingLogSink)
}

/// Initialize the server-side tracing subscriber with env-filter support.
/// Call once from the server binary; library code only emits events.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
