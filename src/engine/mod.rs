//! Collector Engine Module
//!
//! Executes collections through the plugin registry and hands the outcome to
//! pluggable sinks. The engine owns no storage of its own: persisted metric
//! values go to a [`DataSink`], per-attempt log entries to a [`LogSink`], and
//! device ids are resolved through a [`DeviceDirectory`].

pub mod error;
pub mod record;
pub mod sink;
pub mod directory;
pub mod statistics;
pub mod collector;

pub use error::{EngineError, EngineResult};
pub use record::{coerce_numeric, retention_days, CollectionData, CollectionLogEntry};
pub use sink::{DataSink, LogSink, MemoryDataSink, MemoryLogSink};
pub use directory::{DeviceDirectory, MemoryDeviceDirectory};
pub use statistics::{EngineStatistics, EngineStatisticsSnapshot, PluginExecutionStats};
pub use collector::{
    CleanupReport, CollectionDataStatistics, CollectorEngine, EngineConfig, EngineHealth, EngineReport,
    PluginSummary,
};
