use crate::version::InterfaceVersion;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Version incompatible for '{service}': module requires {required}, server provides {provided}")]
    VersionIncompatible {
        service: String,
        required: InterfaceVersion,
        provided: InterfaceVersion,
    },

    #[error("Duplicate version conflict for '{service}': already bound at {bound}, requested {requested}")]
    DuplicateVersionConflict {
        service: String,
        bound: InterfaceVersion,
        requested: InterfaceVersion,
    },

    #[error("Module '{module}' failed to bind: {}", .failures.join(", "))]
    ServiceBindFailure {
        module: String,
        failures: Vec<String>,
    },

    #[error("Timeout at sync point '{point}' after {waited_ms}ms")]
    TimeoutExceeded { point: String, waited_ms: u64 },

    #[error("Certification conflict for transaction {txn}")]
    CertificationConflict { txn: u64 },

    #[error("Session killed")]
    SessionKilled,

    #[error("Unknown session: {0}")]
    UnknownSession(u64),

    #[error("Registry is frozen, cannot register '{0}'")]
    RegistryFrozen(String),

    #[error("Service '{0}' is not hot-swappable")]
    NotSwappable(String),

    #[error("Capability call failed: {0}")]
    CapabilityFailure(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ServiceError {
    /// True for failures the calling session may retry after backing off.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ServiceError::CertificationConflict { .. } | ServiceError::TimeoutExceeded { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
