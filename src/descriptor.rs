//! Service descriptors
//!
//! A descriptor is the immutable record a module binds against: interned
//! name, interface version and the capability vtable. The vtable is a
//! tagged enum of trait objects, so a module cannot reach a capability
//! surface except through a descriptor the negotiator accepted.

use crate::capability::alloc::AllocationService;
use crate::capability::autoinc::AutoIncrementService;
use crate::capability::debug_sync::DebugSyncService;
use crate::capability::error_context::ErrorContextService;
use crate::capability::hash::HashService;
use crate::capability::logging::LogService;
use crate::capability::progress::ProgressService;
use crate::capability::replication::ReplicationService;
use crate::capability::timezone::TimezoneService;
use crate::capability::wait_kill::WaitKillService;
use crate::version::InterfaceVersion;
use serde::Serialize;
use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Interned service name. Cheap to clone, stable across server versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceName(Arc<str>);

impl ServiceName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ServiceName {
    fn from(s: &str) -> Self {
        ServiceName(Arc::from(s))
    }
}

impl Borrow<str> for ServiceName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tagged capability interface. One variant per capability domain; minor
/// version bumps extend a trait append-only, major bumps change a variant's
/// contract.
#[derive(Clone)]
pub enum ServiceVtable {
    Allocation(Arc<dyn AllocationService>),
    WaitKill(Arc<dyn WaitKillService>),
    Timezone(Arc<dyn TimezoneService>),
    AutoIncrement(Arc<dyn AutoIncrementService>),
    ErrorContext(Arc<dyn ErrorContextService>),
    Progress(Arc<dyn ProgressService>),
    DebugSync(Arc<dyn DebugSyncService>),
    Hash(Arc<dyn HashService>),
    Replication(Arc<dyn ReplicationService>),
    Logging(Arc<dyn LogService>),
}

impl ServiceVtable {
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceVtable::Allocation(_) => "allocation",
            ServiceVtable::WaitKill(_) => "wait-kill",
            ServiceVtable::Timezone(_) => "timezone",
            ServiceVtable::AutoIncrement(_) => "auto-increment",
            ServiceVtable::ErrorContext(_) => "error-context",
            ServiceVtable::Progress(_) => "progress",
            ServiceVtable::DebugSync(_) => "debug-sync",
            ServiceVtable::Hash(_) => "hash",
            ServiceVtable::Replication(_) => "replication",
            ServiceVtable::Logging(_) => "logging",
        }
    }

    pub fn as_hash(&self) -> Option<&Arc<dyn HashService>> {
        match self {
            ServiceVtable::Hash(svc) => Some(svc),
            _ => None,
        }
    }

    pub fn as_logging(&self) -> Option<&Arc<dyn LogService>> {
        match self {
            ServiceVtable::Logging(svc) => Some(svc),
            _ => None,
        }
    }

    pub fn as_debug_sync(&self) -> Option<&Arc<dyn DebugSyncService>> {
        match self {
            ServiceVtable::DebugSync(svc) => Some(svc),
            _ => None,
        }
    }

    pub fn as_replication(&self) -> Option<&Arc<dyn ReplicationService>> {
        match self {
            ServiceVtable::Replication(svc) => Some(svc),
            _ => None,
        }
    }

    pub fn as_allocation(&self) -> Option<&Arc<dyn AllocationService>> {
        match self {
            ServiceVtable::Allocation(svc) => Some(svc),
            _ => None,
        }
    }

    pub fn as_wait_kill(&self) -> Option<&Arc<dyn WaitKillService>> {
        match self {
            ServiceVtable::WaitKill(svc) => Some(svc),
            _ => None,
        }
    }

    pub fn as_timezone(&self) -> Option<&Arc<dyn TimezoneService>> {
        match self {
            ServiceVtable::Timezone(svc) => Some(svc),
            _ => None,
        }
    }

    pub fn as_auto_increment(&self) -> Option<&Arc<dyn AutoIncrementService>> {
        match self {
            ServiceVtable::AutoIncrement(svc) => Some(svc),
            _ => None,
        }
    }

    pub fn as_error_context(&self) -> Option<&Arc<dyn ErrorContextService>> {
        match self {
            ServiceVtable::ErrorContext(svc) => Some(svc),
            _ => None,
        }
    }

    pub fn as_progress(&self) -> Option<&Arc<dyn ProgressService>> {
        match self {
            ServiceVtable::Progress(svc) => Some(svc),
            _ => None,
        }
    }
}

/// Immutable once published; the registry replaces descriptors wholesale,
/// never mutates one in place. The consumer count is bind bookkeeping, not
/// part of the published contract.
pub struct ServiceDescriptor {
    name: ServiceName,
    version: InterfaceVersion,
    vtable: ServiceVtable,
    consumers: AtomicUsize,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<ServiceName>, version: InterfaceVersion, vtable: ServiceVtable) -> Self {
        ServiceDescriptor {
            name: name.into(),
            version,
            vtable,
            consumers: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &ServiceName {
        &self.name
    }

    pub fn version(&self) -> InterfaceVersion {
        self.version
    }

    pub fn vtable(&self) -> &ServiceVtable {
        &self.vtable
    }

    /// Number of live module bindings holding this descriptor.
    pub fn consumers(&self) -> usize {
        self.consumers.load(Ordering::Acquire)
    }

    pub(crate) fn add_consumer(&self) {
        self.consumers.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn remove_consumer(&self) {
        self.consumers.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn info(&self) -> ServiceInfo {
        ServiceInfo {
            name: self.name.as_str().to_string(),
            version: self.version.to_string(),
            kind: self.vtable.kind(),
            consumers: self.consumers(),
        }
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("kind", &self.vtable.kind())
            .field("consumers", &self.consumers())
            .finish()
    }
}

/// Admin-facing listing entry.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub kind: &'static str,
    pub consumers: usize,
}
