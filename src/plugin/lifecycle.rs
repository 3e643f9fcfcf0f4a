//! Plugin Lifecycle Manager
//!
//! Drives each registered plugin type through the [`PluginState`] machine:
//!
//! ```text
//! Created -> Initializing -> Initialized -> Starting -> Started -> Running
//! Running/Started -> Stopping -> Stopped -> Starting (restart) | Destroying -> (removed)
//! any -> Error
//! ```
//!
//! Transitions for one type are serialized by a per-type async lock; different
//! types transition independently. When the registry drops or replaces an
//! instance its type falls back to `Created`; [`PluginLifecycleManager::replace_plugin`]
//! swaps an instance and brings the new one back to where the old one was. A background ticker polls plugin health on
//! a small dedicated worker budget and only logs what it finds.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::error::{PluginError, PluginResult};
use super::notification::{LifecycleListener, ListenerSet, RegistryListener};
use super::registry::PluginRegistry;
use super::state::PluginState;
use super::traits::{CollectorPlugin, HealthStatus};
use crate::model::CollectorConfig;

/// Lifecycle manager settings
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleConfig {
    pub health_check_interval: Duration,
    pub health_check_workers: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(60),
            health_check_workers: 2,
        }
    }
}

impl LifecycleConfig {
    pub fn validate(&self) -> PluginResult<()> {
        if self.health_check_interval.is_zero() {
            return Err(PluginError::configuration_error("health check interval must be greater than zero"));
        }
        if self.health_check_workers == 0 {
            return Err(PluginError::configuration_error("health check workers must be at least 1"));
        }
        Ok(())
    }
}

/// Outcome of probing one plugin's health
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResult {
    pub plugin_type: String,
    pub healthy: bool,
    pub status: HealthStatus,
    pub message: String,
    /// Milliseconds
    pub response_time: u64,
    pub check_time: DateTime<Utc>,
    pub details: HashMap<String, Value>,
}

/// Forgets the state of a type whose instance left the registry
struct RegistryStateReset {
    states: Arc<DashMap<String, PluginState>>,
}

impl RegistryListener for RegistryStateReset {
    fn on_unregistered(&self, plugin_type: &str) -> PluginResult<()> {
        if let Some((_, state)) = self.states.remove(plugin_type) {
            debug!("Plugin {} left the registry while {}, back to {}", plugin_type, state, PluginState::Created);
        }
        Ok(())
    }
}

struct HealthTicker {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct PluginLifecycleManager {
    registry: Arc<PluginRegistry>,
    states: Arc<DashMap<String, PluginState>>,
    configs: DashMap<String, CollectorConfig>,
    locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    listeners: ListenerSet<dyn LifecycleListener>,
    config: LifecycleConfig,
    health_workers: Arc<Semaphore>,
    ticker: Mutex<Option<HealthTicker>>,
}

impl PluginLifecycleManager {
    pub fn new(registry: Arc<PluginRegistry>, config: LifecycleConfig) -> Self {
        let workers = config.health_check_workers.max(1);
        let states = Arc::new(DashMap::new());
        registry.add_listener(Arc::new(RegistryStateReset { states: Arc::clone(&states) }));
        Self {
            registry,
            states,
            configs: DashMap::new(),
            locks: DashMap::new(),
            listeners: ListenerSet::new(),
            config,
            health_workers: Arc::new(Semaphore::new(workers)),
            ticker: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn add_listener(&self, listener: Arc<dyn LifecycleListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn LifecycleListener>) -> bool {
        self.listeners.remove(listener)
    }

    /// Current state; types never seen by the manager are `Created`
    pub fn get_plugin_state(&self, plugin_type: &str) -> PluginState {
        self.states
            .get(plugin_type)
            .map(|state| *state)
            .unwrap_or(PluginState::Created)
    }

    pub fn get_all_plugin_states(&self) -> HashMap<String, PluginState> {
        self.states
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn get_plugin_config(&self, plugin_type: &str) -> Option<CollectorConfig> {
        self.configs.get(plugin_type).map(|config| config.clone())
    }

    pub fn is_plugin_ready(&self, plugin_type: &str) -> bool {
        self.get_plugin_state(plugin_type) == PluginState::Running
    }

    /// Poll until the plugin is running or the timeout elapses
    pub async fn wait_for_plugin_ready(&self, plugin_type: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.is_plugin_ready(plugin_type) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    fn lock_for(&self, plugin_type: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(plugin_type.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn set_state(&self, plugin_type: &str, next: PluginState) {
        let old = self
            .states
            .insert(plugin_type.to_string(), next)
            .unwrap_or(PluginState::Created);
        debug!("Plugin {} state {} -> {}", plugin_type, old, next);
        self.listeners
            .notify("state changed", |l| l.on_state_changed(plugin_type, old, next));
    }

    fn transition(&self, plugin_type: &str, next: PluginState) -> PluginResult<()> {
        let current = self.get_plugin_state(plugin_type);
        if !current.can_transition_to(next) {
            return Err(PluginError::invalid_transition(plugin_type, format!("move to {}", next), current));
        }
        self.set_state(plugin_type, next);
        Ok(())
    }

    fn fail(&self, plugin_type: &str, error: &PluginError) {
        error!("Plugin {} entered error state: {}", plugin_type, error);
        self.set_state(plugin_type, PluginState::Error);
        self.listeners.notify("error", |l| l.on_error(plugin_type, error));
    }

    fn require(&self, plugin_type: &str, operation: &str, allowed: &[PluginState]) -> PluginResult<()> {
        let current = self.get_plugin_state(plugin_type);
        if allowed.contains(&current) {
            Ok(())
        } else {
            Err(PluginError::invalid_transition(plugin_type, operation, current))
        }
    }

    /// Initialize a `Created` plugin with the given configuration
    pub async fn initialize_plugin(&self, plugin_type: &str, config: CollectorConfig) -> PluginResult<()> {
        let lock = self.lock_for(plugin_type);
        let _guard = lock.lock().await;
        self.initialize_locked(plugin_type, config, false).await
    }

    /// `adopt` accepts an instance its owner already initialized
    async fn initialize_locked(&self, plugin_type: &str, config: CollectorConfig, adopt: bool) -> PluginResult<()> {
        let plugin = self
            .registry
            .get(plugin_type)
            .ok_or_else(|| PluginError::plugin_not_found(plugin_type))?;
        self.require(plugin_type, "initialize", &[PluginState::Created])?;

        self.transition(plugin_type, PluginState::Initializing)?;
        self.configs.insert(plugin_type.to_string(), config.clone());

        let outcome = match plugin.initialize(config).await {
            Err(PluginError::AlreadyInitialized { .. }) if adopt => Ok(()),
            other => other,
        };
        match outcome {
            Ok(()) => {
                self.transition(plugin_type, PluginState::Initialized)?;
                info!("Plugin {} initialized", plugin_type);
                self.listeners.notify("initialized", |l| l.on_initialized(plugin_type));
                Ok(())
            }
            Err(e) => {
                self.fail(plugin_type, &e);
                Err(e)
            }
        }
    }

    /// Start an `Initialized` or `Stopped` plugin
    pub async fn start_plugin(&self, plugin_type: &str) -> PluginResult<()> {
        let lock = self.lock_for(plugin_type);
        let _guard = lock.lock().await;
        self.start_locked(plugin_type)
    }

    fn start_locked(&self, plugin_type: &str) -> PluginResult<()> {
        if !self.registry.is_registered(plugin_type) {
            return Err(PluginError::plugin_not_found(plugin_type));
        }
        self.require(plugin_type, "start", &[PluginState::Initialized, PluginState::Stopped])?;

        self.transition(plugin_type, PluginState::Starting)?;
        self.transition(plugin_type, PluginState::Started)?;
        self.transition(plugin_type, PluginState::Running)?;
        info!("Plugin {} started", plugin_type);
        self.listeners.notify("started", |l| l.on_started(plugin_type));
        Ok(())
    }

    /// Stop a running plugin; a no-op for plugins that are not running
    pub async fn stop_plugin(&self, plugin_type: &str) -> PluginResult<()> {
        let lock = self.lock_for(plugin_type);
        let _guard = lock.lock().await;
        self.stop_locked(plugin_type)
    }

    fn stop_locked(&self, plugin_type: &str) -> PluginResult<()> {
        let current = self.get_plugin_state(plugin_type);
        if !current.is_active() {
            warn!("Plugin {} is {}, nothing to stop", plugin_type, current);
            return Ok(());
        }

        self.transition(plugin_type, PluginState::Stopping)?;
        self.transition(plugin_type, PluginState::Stopped)?;
        info!("Plugin {} stopped", plugin_type);
        self.listeners.notify("stopped", |l| l.on_stopped(plugin_type));
        Ok(())
    }

    pub async fn restart_plugin(&self, plugin_type: &str) -> PluginResult<()> {
        let lock = self.lock_for(plugin_type);
        let _guard = lock.lock().await;

        if self.get_plugin_state(plugin_type).is_active() {
            self.stop_locked(plugin_type)?;
        }
        self.start_locked(plugin_type)
    }

    /// Register `plugin` in place of the current instance of its type.
    ///
    /// The new instance is initialized with the stored configuration and
    /// started again if the old one was running.
    pub async fn replace_plugin(&self, plugin: Arc<dyn CollectorPlugin>) -> PluginResult<()> {
        let plugin_type = plugin.plugin_type().to_string();
        let lock = self.lock_for(&plugin_type);
        let _guard = lock.lock().await;

        let previous = self.get_plugin_state(&plugin_type);
        self.registry.register(plugin).await?;
        info!("Replaced plugin {} (was {})", plugin_type, previous);

        let was_up = matches!(
            previous,
            PluginState::Initialized
                | PluginState::Starting
                | PluginState::Started
                | PluginState::Running
                | PluginState::Stopping
                | PluginState::Stopped
        );
        if !was_up {
            return Ok(());
        }
        let config = self
            .get_plugin_config(&plugin_type)
            .unwrap_or_else(|| CollectorConfig::for_plugin(plugin_type.as_str()));
        self.initialize_locked(&plugin_type, config, true).await?;
        if matches!(previous, PluginState::Starting | PluginState::Started | PluginState::Running) {
            self.start_locked(&plugin_type)?;
        }
        Ok(())
    }

    /// Stop if needed, destroy the plugin instance and forget its bookkeeping
    pub async fn destroy_plugin(&self, plugin_type: &str) -> PluginResult<()> {
        let lock = self.lock_for(plugin_type);
        let _guard = lock.lock().await;

        let current = self.get_plugin_state(plugin_type);
        if matches!(current, PluginState::Destroying | PluginState::Initializing | PluginState::Starting | PluginState::Stopping) {
            return Err(PluginError::invalid_transition(plugin_type, "destroy", current));
        }
        if current.is_active() {
            self.stop_locked(plugin_type)?;
        }
        self.transition(plugin_type, PluginState::Destroying)?;

        if let Some(plugin) = self.registry.get(plugin_type) {
            if let Err(e) = plugin.destroy().await {
                self.fail(plugin_type, &e);
                return Err(e);
            }
        }

        self.states.remove(plugin_type);
        // the lock entry stays so waiters and new callers share one mutex
        self.configs.remove(plugin_type);
        info!("Plugin {} destroyed", plugin_type);
        Ok(())
    }

    /// Store a new configuration, restarting the plugin if it is running
    pub async fn update_plugin_config(&self, plugin_type: &str, config: CollectorConfig) -> PluginResult<()> {
        if !self.registry.is_registered(plugin_type) {
            return Err(PluginError::plugin_not_found(plugin_type));
        }
        self.configs.insert(plugin_type.to_string(), config);
        info!("Updated configuration for plugin {}", plugin_type);

        if self.get_plugin_state(plugin_type) == PluginState::Running {
            self.restart_plugin(plugin_type).await?;
        }
        Ok(())
    }

    pub async fn perform_health_check(&self, plugin_type: &str) -> PluginResult<HealthCheckResult> {
        let plugin = self
            .registry
            .get(plugin_type)
            .ok_or_else(|| PluginError::plugin_not_found(plugin_type))?;

        let started = Instant::now();
        let status = plugin.health_status().await;
        let statistics = plugin.statistics();

        let mut details = HashMap::new();
        details.insert("state".to_string(), Value::from(self.get_plugin_state(plugin_type).as_str()));
        details.insert("totalCollections".to_string(), Value::from(statistics.total_collections));
        details.insert("successRate".to_string(), Value::from(statistics.success_rate()));
        details.insert("consecutiveFailures".to_string(), Value::from(status.consecutive_failures));

        Ok(HealthCheckResult {
            plugin_type: plugin_type.to_string(),
            healthy: status.is_healthy(),
            status: status.status,
            message: status.message,
            response_time: started.elapsed().as_millis() as u64,
            check_time: Utc::now(),
            details,
        })
    }

    /// Check every registered plugin, bounded by the health worker budget
    pub async fn perform_all_health_checks(&self) -> Vec<HealthCheckResult> {
        let checks = self.registry.get_all_types().into_iter().map(|plugin_type| {
            let workers = Arc::clone(&self.health_workers);
            async move {
                let _permit = workers.acquire_owned().await.ok()?;
                match self.perform_health_check(&plugin_type).await {
                    Ok(result) => Some(result),
                    Err(e) => {
                        warn!("Health check for {} failed: {}", plugin_type, e);
                        None
                    }
                }
            }
        });

        let results: Vec<HealthCheckResult> = join_all(checks).await.into_iter().flatten().collect();
        for result in results.iter().filter(|r| !r.healthy) {
            warn!("Plugin {} is {}: {}", result.plugin_type, result.status, result.message);
        }
        results
    }

    async fn bring_up(&self, plugin_type: &str) -> PluginResult<()> {
        if self.get_plugin_state(plugin_type) == PluginState::Created {
            let config = self
                .get_plugin_config(plugin_type)
                .unwrap_or_else(|| CollectorConfig::for_plugin(plugin_type));
            self.initialize_plugin(plugin_type, config).await?;
        }
        if matches!(self.get_plugin_state(plugin_type), PluginState::Initialized | PluginState::Stopped) {
            self.start_plugin(plugin_type).await?;
        }
        Ok(())
    }

    fn types_by_priority(&self, descending: bool) -> Vec<String> {
        let mut ordered: Vec<(i32, String)> = self
            .registry
            .priorities()
            .into_iter()
            .map(|(plugin_type, priority)| (priority, plugin_type))
            .collect();
        ordered.sort();
        if descending {
            ordered.reverse();
        }
        ordered.into_iter().map(|(_, plugin_type)| plugin_type).collect()
    }

    /// Initialize and start every plugin, lowest priority value first
    pub async fn start_all_plugins_in_order(&self) -> Vec<(String, PluginResult<()>)> {
        let mut results = Vec::new();
        for plugin_type in self.types_by_priority(false) {
            let result = self.bring_up(&plugin_type).await;
            if let Err(e) = &result {
                error!("Failed to start plugin {}: {}", plugin_type, e);
            }
            results.push((plugin_type, result));
        }
        results
    }

    /// Stop every plugin, highest priority value first
    pub async fn stop_all_plugins_in_order(&self) -> Vec<(String, PluginResult<()>)> {
        let mut results = Vec::new();
        for plugin_type in self.types_by_priority(true) {
            let result = self.stop_plugin(&plugin_type).await;
            if let Err(e) = &result {
                error!("Failed to stop plugin {}: {}", plugin_type, e);
            }
            results.push((plugin_type, result));
        }
        results
    }

    /// Start the periodic health checker
    pub fn start(self: &Arc<Self>) {
        let mut ticker = self.ticker.lock();
        if ticker.is_some() {
            debug!("Lifecycle manager already started");
            return;
        }

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let manager: Weak<Self> = Arc::downgrade(self);
        let period = self.config.health_check_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let Some(manager) = manager.upgrade() else { break };
                        manager.perform_all_health_checks().await;
                    }
                }
            }
            debug!("Health check ticker exited");
        });

        *ticker = Some(HealthTicker { shutdown, handle });
        info!("Plugin lifecycle manager started (health checks every {:?})", period);
    }

    /// Stop the health checker and every running plugin
    pub async fn stop(&self) {
        let ticker = self.ticker.lock().take();
        if let Some(ticker) = ticker {
            ticker.shutdown.cancel();
            if tokio::time::timeout(Duration::from_secs(5), ticker.handle).await.is_err() {
                warn!("Health check ticker did not exit in time");
            }
        }
        self.stop_all_plugins_in_order().await;
        info!("Plugin lifecycle manager stopped");
    }

    pub fn is_started(&self) -> bool {
        self.ticker.lock().is_some()
    }
}
