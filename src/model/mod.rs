//! Collection Data Model
//!
//! Value types shared by plugins, the collector engine and the task scheduler.

pub mod device;
pub mod metric;
pub mod context;
pub mod result;
pub mod collector_config;

pub use device::Device;
pub use metric::{MetricConfig, DataTransform, ThresholdConfig, ComparisonOperator};
pub use context::{CollectionContext, VariableBag};
pub use result::{CollectionResult, CollectionStatus, error_codes};
pub use collector_config::{
    CollectorConfig, ConnectionConfig, PerformanceConfig, SecurityConfig, RetryConfig,
    RetryStrategy, CacheConfig, MonitoringConfig, LoggingConfig,
};
