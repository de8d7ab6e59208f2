//! RookDB service-export layer
//!
//! Versioned, named capabilities the server publishes to dynamically loaded
//! extension modules. The registry is populated and frozen during startup;
//! the binder resolves each module's declared requirements against it and
//! hands out complete bindings or nothing. Version negotiation follows the
//! append-only rule: equal major, server minor at least the required minor.

pub mod binder;
pub mod capability;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod mmap;
pub mod registry;
pub mod session;
pub mod version;

pub use binder::{ModuleBinder, ModuleBinding, ModuleDeclaration};
pub use config::ServicesConfig;
pub use descriptor::{ServiceDescriptor, ServiceName, ServiceVtable};
pub use error::{Result, ServiceError};
pub use registry::ServiceRegistry;
pub use session::{Session, SessionManager};
pub use version::InterfaceVersion;

use std::sync::Arc;

/// Everything a running server needs from this layer: registry, binder and
/// session table, wired together and frozen ready for module loads.
pub struct ServiceHost {
    registry: Arc<ServiceRegistry>,
    binder: ModuleBinder,
    sessions: SessionManager,
}

impl ServiceHost {
    /// Startup path: publish the built-in capabilities under `config`,
    /// freeze the registry and return the host.
    pub fn bootstrap(mut config: ServicesConfig) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(ServiceRegistry::new());
        capability::register_builtin_services(&registry, &config)?;
        registry.freeze();
        Ok(ServiceHost {
            binder: ModuleBinder::new(registry.clone()),
            registry,
            sessions: SessionManager::new(),
        })
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn binder(&self) -> &ModuleBinder {
        &self.binder
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Load-time entry point used by the dynamic loader.
    pub fn load_module(&self, declaration: &ModuleDeclaration) -> Result<ModuleBinding> {
        self.binder.bind(declaration)
    }
}
