//! Capability implementations
//!
//! One module per capability domain. Each exposes a trait (the vtable
//! contract), the server-side implementation, and a `service()` constructor
//! used by `register_builtin_services` at startup.

pub mod alloc;
pub mod autoinc;
pub mod debug_sync;
pub mod error_context;
pub mod hash;
pub mod logging;
pub mod progress;
pub mod replication;
pub mod timezone;
pub mod wait_kill;

use crate::config::ServicesConfig;
use crate::descriptor::{ServiceDescriptor, ServiceVtable};
use crate::error::Result;
use crate::registry::ServiceRegistry;
use crate::version::InterfaceVersion;

// Fixed service names, the module-visible export convention.
pub const SVC_ALLOC: &str = "alloc";
pub const SVC_WAIT_KILL: &str = "thd_wait";
pub const SVC_TIMEZONE: &str = "timezone";
pub const SVC_AUTO_INCREMENT: &str = "auto_increment";
pub const SVC_ERROR_CONTEXT: &str = "error_context";
pub const SVC_PROGRESS: &str = "progress_report";
pub const SVC_DEBUG_SYNC: &str = "debug_sync";
pub const SVC_HASH_SHA256: &str = "hash_sha256";
pub const SVC_HASH_XXH3: &str = "hash_xxh3";
pub const SVC_REPLICATION: &str = "replication";
pub const SVC_LOGGER: &str = "logger";

// Current interface version per capability. Minor bumps when a trait gains
// methods with defaults; major bumps on any breaking contract change.
pub const ALLOC_VERSION: InterfaceVersion = InterfaceVersion::new(1, 0);
pub const WAIT_KILL_VERSION: InterfaceVersion = InterfaceVersion::new(1, 1);
pub const TIMEZONE_VERSION: InterfaceVersion = InterfaceVersion::new(1, 0);
pub const AUTO_INCREMENT_VERSION: InterfaceVersion = InterfaceVersion::new(1, 0);
pub const ERROR_CONTEXT_VERSION: InterfaceVersion = InterfaceVersion::new(1, 0);
pub const PROGRESS_VERSION: InterfaceVersion = InterfaceVersion::new(1, 0);
pub const DEBUG_SYNC_VERSION: InterfaceVersion = InterfaceVersion::new(1, 0);
pub const HASH_VERSION: InterfaceVersion = InterfaceVersion::new(1, 1);
pub const REPLICATION_VERSION: InterfaceVersion = InterfaceVersion::new(1, 0);
pub const LOGGER_VERSION: InterfaceVersion = InterfaceVersion::new(1, 0);

/// Publish every built-in capability to the registry. Called once during
/// server startup, before `freeze` and before any module load.
pub fn register_builtin_services(
    registry: &ServiceRegistry,
    config: &ServicesConfig,
) -> Result<()> {
    registry.register(ServiceDescriptor::new(
        SVC_ALLOC,
        ALLOC_VERSION,
        ServiceVtable::Allocation(alloc::service()),
    ))?;
    registry.register(ServiceDescriptor::new(
        SVC_WAIT_KILL,
        WAIT_KILL_VERSION,
        ServiceVtable::WaitKill(wait_kill::service()),
    ))?;
    registry.register(ServiceDescriptor::new(
        SVC_TIMEZONE,
        TIMEZONE_VERSION,
        ServiceVtable::Timezone(timezone::service()),
    ))?;
    registry.register(ServiceDescriptor::new(
        SVC_AUTO_INCREMENT,
        AUTO_INCREMENT_VERSION,
        ServiceVtable::AutoIncrement(autoinc::service(config.auto_increment_first_value)),
    ))?;
    registry.register(ServiceDescriptor::new(
        SVC_ERROR_CONTEXT,
        ERROR_CONTEXT_VERSION,
        ServiceVtable::ErrorContext(error_context::service()),
    ))?;
    registry.register(ServiceDescriptor::new(
        SVC_PROGRESS,
        PROGRESS_VERSION,
        ServiceVtable::Progress(progress::service()),
    ))?;
    registry.register(ServiceDescriptor::new(
        SVC_HASH_SHA256,
        HASH_VERSION,
        ServiceVtable::Hash(hash::sha256_service()),
    ))?;
    registry.register(ServiceDescriptor::new(
        SVC_HASH_XXH3,
        HASH_VERSION,
        ServiceVtable::Hash(hash::xxh3_service()),
    ))?;
    registry.register(ServiceDescriptor::new(
        SVC_REPLICATION,
        REPLICATION_VERSION,
        ServiceVtable::Replication(replication::service()),
    ))?;

    // Hot-swappable pair: logging sink and debug-sync state.
    registry.register_hot_swappable(ServiceDescriptor::new(
        SVC_LOGGER,
        LOGGER_VERSION,
        ServiceVtable::Logging(logging::service()),
    ))?;
    registry.register_hot_swappable(ServiceDescriptor::new(
        SVC_DEBUG_SYNC,
        DEBUG_SYNC_VERSION,
        ServiceVtable::DebugSync(debug_sync::service(config.debug_sync_enabled)),
    ))?;

    tracing::info!("built-in services registered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_builtins_registered() {
        let registry = ServiceRegistry::new();
        register_builtin_services(&registry, &ServicesConfig::default()).unwrap();

        for name in [
            SVC_ALLOC,
            SVC_WAIT_KILL,
            SVC_TIMEZONE,
            SVC_AUTO_INCREMENT,
            SVC_ERROR_CONTEXT,
            SVC_PROGRESS,
            SVC_DEBUG_SYNC,
            SVC_HASH_SHA256,
            SVC_HASH_XXH3,
            SVC_REPLICATION,
            SVC_LOGGER,
        ] {
            registry.lookup(name).unwrap_or_else(|_| panic!("{} missing", name));
        }
        assert_eq!(registry.list().len(), 11);
    }

    #[test]
    fn test_production_config_disables_debug_sync() {
        let registry = ServiceRegistry::new();
        let mut config = ServicesConfig {
            environment: crate::config::Environment::Production,
            ..Default::default()
        };
        config.validate().unwrap();
        register_builtin_services(&registry, &config).unwrap();

        let desc = registry.lookup(SVC_DEBUG_SYNC).unwrap();
        let sync = desc.vtable().as_debug_sync().unwrap();
        // Disabled table: waits return immediately instead of blocking.
        sync.wait_at("anything", std::time::Duration::from_secs(30)).unwrap();
    }
}
