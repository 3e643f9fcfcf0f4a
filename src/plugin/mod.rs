//! Plugin System Module
//!
//! Collector plugins, the registry that indexes them, and the lifecycle
//! manager that drives them through their state machine.
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use devcollect::plugin::{builtin, PluginRegistry};
//!
//! # async fn run() -> devcollect::plugin::PluginResult<()> {
//! let registry = PluginRegistry::new();
//! registry.register(Arc::new(builtin::tcp_probe_plugin())).await?;
//! assert!(registry.is_enabled("tcp"));
//! # Ok(())
//! # }
//! ```

pub mod traits;
pub mod error;
pub mod state;
pub mod statistics;
pub mod cache;
pub mod base;
pub mod registry;
pub mod lifecycle;
pub mod notification;
pub mod compatibility;
pub mod builtin;

#[cfg(test)]
pub mod tests;

pub use traits::{
    AvailableMetric, CollectorPlugin, ConfigValidationResult, ConnectionTestResult, HealthStatus,
    PluginDescriptor, PluginHealthStatus,
};
pub use error::{PluginError, PluginResult};
pub use state::{PluginState, RegistryStatus};
pub use statistics::PluginStatistics;
pub use cache::{CacheKey, ResultCache};
pub use base::{CollectorDriver, ManagedCollector};

pub use registry::{PluginInfo, PluginRegistry};
pub use lifecycle::{HealthCheckResult, LifecycleConfig, PluginLifecycleManager};
pub use notification::{LifecycleListener, ListenerSet, RegistryListener};
pub use compatibility::{api_version, VersionCompatibilityChecker};
