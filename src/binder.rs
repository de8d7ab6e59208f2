//! Module binder
//!
//! Resolves an extension module's declared service requirements against the
//! registry at load time. Binding is all-or-nothing: a module either gets a
//! complete `ModuleBinding` or nothing, and a failed bind leaves no trace.
//! Loads are serialized under a global load lock; they never overlap.

use crate::descriptor::{ServiceDescriptor, ServiceName};
use crate::error::{Result, ServiceError};
use crate::registry::ServiceRegistry;
use crate::version::InterfaceVersion;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What a module was compiled against: its name plus one (service, version)
/// pair per export symbol the loader found in it.
#[derive(Debug, Clone)]
pub struct ModuleDeclaration {
    name: String,
    requirements: Vec<(ServiceName, InterfaceVersion)>,
}

impl ModuleDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        ModuleDeclaration {
            name: name.into(),
            requirements: Vec::new(),
        }
    }

    pub fn requires(mut self, service: &str, version: InterfaceVersion) -> Self {
        self.requirements.push((ServiceName::from(service), version));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requirements(&self) -> &[(ServiceName, InterfaceVersion)] {
        &self.requirements
    }
}

/// The bound set of call handles for one loaded module. Owned exclusively
/// by that module; dropping it (module unload) releases the consumer counts.
pub struct ModuleBinding {
    module: String,
    services: HashMap<ServiceName, Arc<ServiceDescriptor>>,
    registry: Arc<ServiceRegistry>,
}

impl ModuleBinding {
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Resolved descriptor for a bound service. The handle stays valid even
    /// if the registry hot-swaps the service afterwards; re-bind to pick up
    /// a replacement.
    pub fn get(&self, service: &str) -> Option<&Arc<ServiceDescriptor>> {
        self.services.get(service)
    }

    pub fn service_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(|n| n.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ModuleBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleBinding")
            .field("module", &self.module)
            .field("services", &self.service_names())
            .finish()
    }
}

impl Drop for ModuleBinding {
    fn drop(&mut self) {
        for (name, descriptor) in &self.services {
            descriptor.remove_consumer();
            self.registry.release_binding(name);
        }
        tracing::debug!(module = %self.module, "module binding released");
    }
}

pub struct ModuleBinder {
    registry: Arc<ServiceRegistry>,
    load_lock: Mutex<()>,
}

impl ModuleBinder {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        ModuleBinder {
            registry,
            load_lock: Mutex::new(()),
        }
    }

    /// Bind a module's declaration. On any failure the module must not be
    /// loaded; the error carries every name that failed when there are
    /// several, or the precise cause when there is one.
    pub fn bind(&self, declaration: &ModuleDeclaration) -> Result<ModuleBinding> {
        let _load_guard = self.load_lock.lock();

        let mut resolved: HashMap<ServiceName, Arc<ServiceDescriptor>> = HashMap::new();
        let mut errors: Vec<ServiceError> = Vec::new();

        for (name, required) in &declaration.requirements {
            // A repeated name binds once, but every repetition must be
            // satisfied by the descriptor the first occurrence resolved.
            if let Some(existing) = resolved.get(name) {
                if !existing.version().satisfies(*required) {
                    errors.push(ServiceError::VersionIncompatible {
                        service: name.as_str().to_string(),
                        required: *required,
                        provided: existing.version(),
                    });
                }
                continue;
            }
            match self.resolve_one(name, *required) {
                Ok(descriptor) => {
                    resolved.insert(name.clone(), descriptor);
                }
                Err(e) => errors.push(e),
            }
        }

        if !errors.is_empty() {
            tracing::warn!(
                module = declaration.name,
                failures = errors.len(),
                "module bind rejected"
            );
            return Err(if errors.len() == 1 {
                errors.remove(0)
            } else {
                ServiceError::ServiceBindFailure {
                    module: declaration.name.clone(),
                    failures: errors.iter().map(|e| e.to_string()).collect(),
                }
            });
        }

        // All requirements resolved; commit the binding. The load lock is
        // held, so the live-binding table cannot change underneath us and
        // note_binding cannot fail after resolve_one accepted each name.
        for (name, descriptor) in &resolved {
            self.registry
                .note_binding(name, descriptor.version().major)?;
            descriptor.add_consumer();
        }

        tracing::info!(
            module = declaration.name,
            services = resolved.len(),
            "module bound"
        );
        Ok(ModuleBinding {
            module: declaration.name.clone(),
            services: resolved,
            registry: self.registry.clone(),
        })
    }

    fn resolve_one(
        &self,
        name: &ServiceName,
        required: InterfaceVersion,
    ) -> Result<Arc<ServiceDescriptor>> {
        // A second module may not bind a major different from what live
        // modules already hold, even if the registry could satisfy it.
        if let Some(bound) = self.registry.bound_major(name.as_str()) {
            if bound != required.major {
                return Err(ServiceError::DuplicateVersionConflict {
                    service: name.as_str().to_string(),
                    bound: InterfaceVersion::new(bound, 0),
                    requested: required,
                });
            }
        }
        self.registry.lookup_version(name.as_str(), required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::hash;
    use crate::descriptor::ServiceVtable;

    fn registry_with(entries: &[(&str, InterfaceVersion)]) -> Arc<ServiceRegistry> {
        let registry = Arc::new(ServiceRegistry::new());
        for (name, version) in entries {
            registry
                .register(ServiceDescriptor::new(
                    *name,
                    *version,
                    ServiceVtable::Hash(hash::sha256_service()),
                ))
                .unwrap();
        }
        registry.freeze();
        registry
    }

    #[test]
    fn test_successful_bind_counts_consumers() {
        let registry = registry_with(&[("hash_sha256", InterfaceVersion::new(1, 1))]);
        let binder = ModuleBinder::new(registry.clone());

        let binding = binder
            .bind(&ModuleDeclaration::new("engine_a").requires("hash_sha256", InterfaceVersion::new(1, 0)))
            .unwrap();

        assert_eq!(binding.module(), "engine_a");
        let desc = binding.get("hash_sha256").unwrap();
        assert_eq!(desc.consumers(), 1);
        assert!(desc.vtable().as_hash().is_some());

        drop(binding);
        assert_eq!(registry.lookup("hash_sha256").unwrap().consumers(), 0);
    }

    #[test]
    fn test_unknown_service_aborts_bind() {
        let registry = registry_with(&[("hash_sha256", InterfaceVersion::new(1, 0))]);
        let binder = ModuleBinder::new(registry);

        let err = binder
            .bind(&ModuleDeclaration::new("m").requires("no_such", InterfaceVersion::new(1, 0)))
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnknownService(_)));
    }

    #[test]
    fn test_partial_failure_leaves_no_trace() {
        let registry = registry_with(&[("hash_sha256", InterfaceVersion::new(1, 0))]);
        let binder = ModuleBinder::new(registry.clone());

        let err = binder
            .bind(
                &ModuleDeclaration::new("m")
                    .requires("hash_sha256", InterfaceVersion::new(1, 0))
                    .requires("alloc", InterfaceVersion::new(1, 0))
                    .requires("timezone", InterfaceVersion::new(1, 0)),
            )
            .unwrap_err();

        match err {
            ServiceError::ServiceBindFailure { module, failures } => {
                assert_eq!(module, "m");
                assert_eq!(failures.len(), 2);
            }
            other => panic!("expected ServiceBindFailure, got {other:?}"),
        }
        // The resolvable requirement must not have been committed.
        assert_eq!(registry.lookup("hash_sha256").unwrap().consumers(), 0);
    }

    #[test]
    fn test_major_mismatch_is_version_incompatible() {
        let registry = registry_with(&[("hash_sha256", InterfaceVersion::new(1, 1))]);
        let binder = ModuleBinder::new(registry);

        let err = binder
            .bind(&ModuleDeclaration::new("m").requires("hash_sha256", InterfaceVersion::new(2, 0)))
            .unwrap_err();
        assert!(matches!(err, ServiceError::VersionIncompatible { .. }));
    }

    #[test]
    fn test_conflicting_majors_across_modules() {
        // Registry exports both majors; policy still forbids two live
        // modules holding different majors of one capability.
        let registry = Arc::new(ServiceRegistry::new());
        for version in [InterfaceVersion::new(1, 0), InterfaceVersion::new(2, 0)] {
            registry
                .register(ServiceDescriptor::new(
                    "alloc",
                    version,
                    ServiceVtable::Allocation(crate::capability::alloc::service()),
                ))
                .unwrap();
        }
        registry.freeze();
        let binder = ModuleBinder::new(registry);

        let first = binder
            .bind(&ModuleDeclaration::new("engine_a").requires("alloc", InterfaceVersion::new(1, 0)))
            .unwrap();
        let err = binder
            .bind(&ModuleDeclaration::new("engine_b").requires("alloc", InterfaceVersion::new(2, 0)))
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateVersionConflict { .. }));

        // Once the first module unloads, the other major becomes bindable.
        drop(first);
        binder
            .bind(&ModuleDeclaration::new("engine_b").requires("alloc", InterfaceVersion::new(2, 0)))
            .unwrap();
    }

    #[test]
    fn test_duplicate_requirement_binds_once() {
        let registry = registry_with(&[("hash_sha256", InterfaceVersion::new(1, 0))]);
        let binder = ModuleBinder::new(registry.clone());

        let binding = binder
            .bind(
                &ModuleDeclaration::new("m")
                    .requires("hash_sha256", InterfaceVersion::new(1, 0))
                    .requires("hash_sha256", InterfaceVersion::new(1, 0)),
            )
            .unwrap();
        assert_eq!(binding.get("hash_sha256").unwrap().consumers(), 1);
    }

    #[test]
    fn test_repeated_name_with_unsatisfiable_version_rejected() {
        let registry = registry_with(&[("hash_sha256", InterfaceVersion::new(1, 0))]);
        let binder = ModuleBinder::new(registry.clone());

        // The 1.0 occurrence resolves, but the repeated 2.0 requirement
        // cannot be met by the same descriptor; the whole bind must fail.
        let err = binder
            .bind(
                &ModuleDeclaration::new("m")
                    .requires("hash_sha256", InterfaceVersion::new(1, 0))
                    .requires("hash_sha256", InterfaceVersion::new(2, 0)),
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::VersionIncompatible { .. }));
        assert_eq!(registry.lookup("hash_sha256").unwrap().consumers(), 0);
    }

    #[test]
    fn test_repeated_name_with_compatible_minor_binds() {
        let registry = registry_with(&[("hash_sha256", InterfaceVersion::new(1, 2))]);
        let binder = ModuleBinder::new(registry);

        let binding = binder
            .bind(
                &ModuleDeclaration::new("m")
                    .requires("hash_sha256", InterfaceVersion::new(1, 0))
                    .requires("hash_sha256", InterfaceVersion::new(1, 2)),
            )
            .unwrap();
        assert_eq!(binding.get("hash_sha256").unwrap().consumers(), 1);
    }
}
