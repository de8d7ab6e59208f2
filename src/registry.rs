//! Service registry
//!
//! Process-wide table of published service descriptors. Populated during
//! server startup, then frozen before the first module load; after that,
//! lookups read an effectively immutable table and never contend. A small
//! designated subset (logging sink, debug-sync state) stays hot-swappable:
//! `swap` publishes a replacement descriptor under a short write lock, and
//! bindings that already hold the old `Arc` keep it until they re-resolve.
//!
//! A name may carry one descriptor per major version, so the server can
//! export a legacy major alongside the current one during migrations.

use crate::descriptor::{ServiceDescriptor, ServiceInfo, ServiceName};
use crate::error::{Result, ServiceError};
use crate::version::InterfaceVersion;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

struct BoundMajor {
    major: u16,
    count: usize,
}

struct RegistryInner {
    // Per name, one descriptor per major version, ascending.
    entries: HashMap<ServiceName, Vec<Arc<ServiceDescriptor>>>,
    hot_swappable: HashSet<ServiceName>,
    frozen: bool,
}

pub struct ServiceRegistry {
    inner: RwLock<RegistryInner>,
    // Major version each name is live-bound at, with binding count.
    bound: Mutex<HashMap<ServiceName, BoundMajor>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        ServiceRegistry {
            inner: RwLock::new(RegistryInner {
                entries: HashMap::new(),
                hot_swappable: HashSet::new(),
                frozen: false,
            }),
            bound: Mutex::new(HashMap::new()),
        }
    }

    /// Publish a descriptor during startup. Replaces a same-major entry
    /// wholesale; fails once the registry is frozen.
    pub fn register(&self, descriptor: ServiceDescriptor) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.frozen {
            return Err(ServiceError::RegistryFrozen(
                descriptor.name().as_str().to_string(),
            ));
        }
        self.publish_locked(&mut inner, Arc::new(descriptor))
    }

    /// Like `register`, and marks the name hot-swappable so `swap` works on
    /// it after the freeze.
    pub fn register_hot_swappable(&self, descriptor: ServiceDescriptor) -> Result<()> {
        let name = descriptor.name().clone();
        let mut inner = self.inner.write();
        if inner.frozen {
            return Err(ServiceError::RegistryFrozen(name.as_str().to_string()));
        }
        self.publish_locked(&mut inner, Arc::new(descriptor))?;
        inner.hot_swappable.insert(name);
        Ok(())
    }

    fn publish_locked(
        &self,
        inner: &mut RegistryInner,
        descriptor: Arc<ServiceDescriptor>,
    ) -> Result<()> {
        self.check_bound_conflict(descriptor.name(), descriptor.version())?;
        let slot = inner.entries.entry(descriptor.name().clone()).or_default();
        match slot.binary_search_by_key(&descriptor.version().major, |d| d.version().major) {
            Ok(i) => slot[i] = descriptor,
            Err(i) => slot.insert(i, descriptor),
        }
        Ok(())
    }

    fn check_bound_conflict(&self, name: &ServiceName, version: InterfaceVersion) -> Result<()> {
        if let Some(bound) = self.bound.lock().get(name) {
            if bound.major != version.major {
                return Err(ServiceError::DuplicateVersionConflict {
                    service: name.as_str().to_string(),
                    bound: InterfaceVersion::new(bound.major, 0),
                    requested: version,
                });
            }
        }
        Ok(())
    }

    /// End of startup: no further `register` calls. Module loading may
    /// begin after this.
    pub fn freeze(&self) {
        let mut inner = self.inner.write();
        inner.frozen = true;
        tracing::info!(services = inner.entries.len(), "service registry frozen");
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.read().frozen
    }

    /// Current descriptor for a name (highest published major).
    pub fn lookup(&self, name: &str) -> Result<Arc<ServiceDescriptor>> {
        let inner = self.inner.read();
        inner
            .entries
            .get(name)
            .and_then(|v| v.last().cloned())
            .ok_or_else(|| ServiceError::UnknownService(name.to_string()))
    }

    /// Descriptor that satisfies `required` per the negotiation rule, or
    /// the precise incompatibility.
    pub fn lookup_version(
        &self,
        name: &str,
        required: InterfaceVersion,
    ) -> Result<Arc<ServiceDescriptor>> {
        let inner = self.inner.read();
        let versions = inner
            .entries
            .get(name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ServiceError::UnknownService(name.to_string()))?;

        match versions.iter().find(|d| d.version().major == required.major) {
            Some(d) if d.version().satisfies(required) => Ok(d.clone()),
            Some(d) => Err(ServiceError::VersionIncompatible {
                service: name.to_string(),
                required,
                provided: d.version(),
            }),
            None => Err(ServiceError::VersionIncompatible {
                service: name.to_string(),
                required,
                provided: versions.last().map(|d| d.version()).unwrap_or(required),
            }),
        }
    }

    /// Hot-swap path for the designated services. Publishes the replacement
    /// atomically; fails on non-swappable names and on major conflicts with
    /// live bindings.
    pub fn swap(&self, descriptor: ServiceDescriptor) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.hot_swappable.contains(descriptor.name()) {
            return Err(ServiceError::NotSwappable(
                descriptor.name().as_str().to_string(),
            ));
        }
        tracing::debug!(service = %descriptor.name(), version = %descriptor.version(), "hot-swapping service");
        self.publish_locked(&mut inner, Arc::new(descriptor))
    }

    /// Admin listing of every published descriptor.
    pub fn list(&self) -> Vec<ServiceInfo> {
        let inner = self.inner.read();
        let mut infos: Vec<ServiceInfo> = inner
            .entries
            .values()
            .flat_map(|v| v.iter().map(|d| d.info()))
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    // Binder bookkeeping: which major each name is live-bound at.

    pub(crate) fn note_binding(&self, name: &ServiceName, major: u16) -> Result<()> {
        let mut bound = self.bound.lock();
        match bound.get_mut(name) {
            Some(entry) if entry.major == major => {
                entry.count += 1;
                Ok(())
            }
            Some(entry) => Err(ServiceError::DuplicateVersionConflict {
                service: name.as_str().to_string(),
                bound: InterfaceVersion::new(entry.major, 0),
                requested: InterfaceVersion::new(major, 0),
            }),
            None => {
                bound.insert(name.clone(), BoundMajor { major, count: 1 });
                Ok(())
            }
        }
    }

    pub(crate) fn release_binding(&self, name: &ServiceName) {
        let mut bound = self.bound.lock();
        if let Some(entry) = bound.get_mut(name) {
            entry.count -= 1;
            if entry.count == 0 {
                bound.remove(name);
            }
        }
    }

    pub(crate) fn bound_major(&self, name: &str) -> Option<u16> {
        self.bound.lock().get(name).map(|b| b.major)
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
