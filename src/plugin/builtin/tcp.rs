//! TCP reachability probe.
//!
//! Measures TCP connect latency to `device.address` on the port named by the
//! metric's `port` parameter, falling back to the device port.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::model::{error_codes, CollectionContext, CollectionResult, CollectorConfig, Device, MetricConfig};
use crate::plugin::base::{CollectorDriver, ManagedCollector};
use crate::plugin::compatibility::api_version;
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::traits::{AvailableMetric, ConfigValidationResult, ConnectionTestResult, PluginDescriptor};

pub const PLUGIN_TYPE: &str = "tcp";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

pub struct TcpProbeDriver {
    connect_timeout: RwLock<Duration>,
}

impl Default for TcpProbeDriver {
    fn default() -> Self {
        Self { connect_timeout: RwLock::new(DEFAULT_CONNECT_TIMEOUT) }
    }
}

impl TcpProbeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_timeout(&self) -> Duration {
        *self.connect_timeout.read()
    }

    fn target(device: &Device, metric: Option<&MetricConfig>) -> PluginResult<String> {
        let port = metric
            .and_then(|m| m.parameter_u64("port"))
            .and_then(|p| u16::try_from(p).ok())
            .or(device.port)
            .ok_or_else(|| PluginError::missing_endpoint(device.id))?;
        Ok(format!("{}:{}", device.address, port))
    }

    /// Connect once, returning the latency on success
    async fn probe(&self, target: &str, limit: Duration) -> Result<Duration, ProbeFailure> {
        let start = Instant::now();
        match timeout(limit, TcpStream::connect(target)).await {
            Ok(Ok(_stream)) => Ok(start.elapsed()),
            Ok(Err(e)) => Err(ProbeFailure::Refused(e.to_string())),
            Err(_) => Err(ProbeFailure::TimedOut),
        }
    }

    fn limit_for(&self, metric: &MetricConfig) -> Duration {
        metric
            .parameter_u64("connectTimeoutMs")
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.connect_timeout())
    }
}

enum ProbeFailure {
    Refused(String),
    TimedOut,
}

#[async_trait]
impl CollectorDriver for TcpProbeDriver {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new(PLUGIN_TYPE, "TCP Probe", env!("CARGO_PKG_VERSION"), api_version())
            .with_description("Measures TCP connect latency and reachability")
            .with_device_types(["*"])
            .with_protocols([PLUGIN_TYPE])
            .with_metric_types(["latency", "reachability"])
            .with_priority(10)
    }

    async fn on_initialize(&self, config: &CollectorConfig) -> PluginResult<()> {
        let millis = config.connection_config.connect_timeout;
        if millis == 0 {
            return Err(PluginError::configuration_error("connectTimeout must be greater than zero"));
        }
        *self.connect_timeout.write() = Duration::from_millis(millis);
        Ok(())
    }

    async fn do_collect(
        &self,
        device: &Device,
        metric: &MetricConfig,
        _context: &CollectionContext,
    ) -> PluginResult<CollectionResult> {
        let target = Self::target(device, Some(metric))?;
        let limit = self.limit_for(metric);

        let result = match self.probe(&target, limit).await {
            Ok(latency) => {
                let ms = latency.as_secs_f64() * 1000.0;
                debug!("TCP probe to {} succeeded in {:.2}ms", target, ms);
                CollectionResult::success(HashMap::new())
                    .with_metric("reachable", Value::from(true))
                    .with_metric("latencyMs", Value::from(ms))
            }
            Err(ProbeFailure::Refused(reason)) => {
                warn!("TCP probe to {} failed: {}", target, reason);
                CollectionResult::failure(error_codes::CONNECTION_FAILED, format!("Connection to {} failed: {}", target, reason))
                    .with_metric("reachable", Value::from(false))
            }
            Err(ProbeFailure::TimedOut) => {
                warn!("TCP probe to {} timed out after {:?}", target, limit);
                CollectionResult::timeout().with_metric("reachable", Value::from(false))
            }
        };
        Ok(result)
    }

    async fn do_test_connection(&self, device: &Device, _context: &CollectionContext) -> PluginResult<ConnectionTestResult> {
        let target = Self::target(device, None)?;
        let limit = self.connect_timeout();
        Ok(match self.probe(&target, limit).await {
            Ok(latency) => ConnectionTestResult::success(format!("Connected to {}", target), latency.as_millis() as u64),
            Err(ProbeFailure::Refused(reason)) => ConnectionTestResult::failure(error_codes::CONNECTION_FAILED, reason),
            Err(ProbeFailure::TimedOut) => ConnectionTestResult::failure(error_codes::TIMEOUT, format!("Timed out after {:?}", limit)),
        })
    }

    async fn do_discover_metrics(&self, _device: &Device, _context: &CollectionContext) -> PluginResult<Vec<AvailableMetric>> {
        Ok(vec![
            AvailableMetric::new("tcp_latency", "latency", "TCP connect latency").with_unit("ms"),
            AvailableMetric::new("tcp_reachable", "reachability", "Whether the port accepts connections"),
        ])
    }

    fn do_validate_config(&self, metric: &MetricConfig) -> ConfigValidationResult {
        match metric.parameters.get("port") {
            None => ConfigValidationResult::success("Configuration is valid")
                .with_warning("No port parameter; the device port will be used"),
            Some(port) => match port.as_u64().map(u16::try_from) {
                Some(Ok(_)) => ConfigValidationResult::success("Configuration is valid"),
                _ => ConfigValidationResult::failure(format!("Invalid port: {}", port)),
            },
        }
    }

    fn extend_config_template(&self, template: &mut HashMap<String, Value>) {
        template.insert("port".to_string(), Value::Null);
        template.insert("connectTimeoutMs".to_string(), Value::from(DEFAULT_CONNECT_TIMEOUT.as_millis() as u64));
    }
}

pub type TcpProbePlugin = ManagedCollector<TcpProbeDriver>;

pub fn tcp_probe_plugin() -> TcpProbePlugin {
    ManagedCollector::new(TcpProbeDriver::new())
}
