//! Service-layer configuration
//!
//! Environment-based configuration with validation and sensible defaults.
//! Secrets never live here; this covers only the knobs of the export layer.

use crate::error::{Result, ServiceError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl std::str::FromStr for Environment {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ServiceError::ConfigError(format!(
                "Invalid environment: {}",
                s
            ))),
        }
    }
}

/// Complete configuration of the service-export layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub environment: Environment,

    /// Allow `debug_sync` waits. Forced off in production.
    pub debug_sync_enabled: bool,

    /// First value handed out by auto-increment counters.
    pub auto_increment_first_value: u64,

    /// Default tracing filter when RUST_LOG is unset.
    pub log_filter: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        ServicesConfig {
            environment: Environment::Development,
            debug_sync_enabled: true,
            auto_increment_first_value: 1,
            log_filter: "rookdb_services=info".to_string(),
        }
    }
}

impl ServicesConfig {
    /// Build from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = ServicesConfig::default();

        if let Ok(env) = std::env::var("ROOKDB_ENV") {
            config.environment = env.parse()?;
        }
        if let Ok(v) = std::env::var("ROOKDB_DEBUG_SYNC") {
            config.debug_sync_enabled = v == "1" || v.eq_ignore_ascii_case("on");
        }
        if let Ok(v) = std::env::var("ROOKDB_AUTOINC_FIRST") {
            config.auto_increment_first_value = v
                .parse()
                .map_err(|_| ServiceError::ConfigError(format!("Invalid ROOKDB_AUTOINC_FIRST: {}", v)))?;
        }
        if let Ok(v) = std::env::var("ROOKDB_LOG") {
            config.log_filter = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&mut self) -> Result<()> {
        if self.auto_increment_first_value == 0 {
            return Err(ServiceError::ConfigError(
                "auto_increment_first_value must be at least 1".to_string(),
            ));
        }
        // Debug-sync is a test facility; never active in production.
        if self.environment == Environment::Production && self.debug_sync_enabled {
            tracing::warn!("debug_sync disabled: not available in production");
            self.debug_sync_enabled = false;
        }
        Ok(())
    }
}
