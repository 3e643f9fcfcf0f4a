//! Plugin Registry
//!
//! Concurrent catalog of collector plugins keyed by plugin type. Lookups go
//! through a sharded concurrent map and never wait on registration.
//!
//! Registering a type that already exists swaps the new instance in with a
//! single map insert, then retires the old one (destroy + notifications).
//! Concurrent registrations of the same type are serialized by a per-type
//! lock, so lookups observe either the old or the new instance, never a gap.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;

use super::compatibility::VersionCompatibilityChecker;
use super::error::{PluginError, PluginResult};
use super::notification::{ListenerSet, RegistryListener};
use super::state::RegistryStatus;
use super::traits::CollectorPlugin;

/// Diagnostic view of a registered plugin
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    pub plugin_type: String,
    pub name: String,
    pub version: String,
    pub priority: i32,
    pub status: RegistryStatus,
    pub registered_at: DateTime<Utc>,
    pub last_access_time: DateTime<Utc>,
    pub access_count: u64,
}

struct RegistryEntry {
    plugin: Arc<dyn CollectorPlugin>,
    status: RegistryStatus,
    registered_at: DateTime<Utc>,
    last_access: Mutex<DateTime<Utc>>,
    access_count: AtomicU64,
}

impl RegistryEntry {
    fn new(plugin: Arc<dyn CollectorPlugin>) -> Self {
        let now = Utc::now();
        Self {
            plugin,
            status: RegistryStatus::Registered,
            registered_at: now,
            last_access: Mutex::new(now),
            access_count: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        self.access_count.fetch_add(1, Ordering::Relaxed);
        *self.last_access.lock() = Utc::now();
    }

    fn info(&self, plugin_type: &str) -> PluginInfo {
        let descriptor = self.plugin.descriptor();
        PluginInfo {
            plugin_type: plugin_type.to_string(),
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            priority: descriptor.priority,
            status: self.status,
            registered_at: self.registered_at,
            last_access_time: *self.last_access.lock(),
            access_count: self.access_count.load(Ordering::Relaxed),
        }
    }
}

pub struct PluginRegistry {
    plugins: DashMap<String, RegistryEntry>,
    registration_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    listeners: ListenerSet<dyn RegistryListener>,
    compatibility: VersionCompatibilityChecker,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::with_checker(VersionCompatibilityChecker::default())
    }

    pub fn with_checker(compatibility: VersionCompatibilityChecker) -> Self {
        Self {
            plugins: DashMap::new(),
            registration_locks: DashMap::new(),
            listeners: ListenerSet::new(),
            compatibility,
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn RegistryListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn RegistryListener>) -> bool {
        self.listeners.remove(listener)
    }

    /// Check a plugin declaration.
    ///
    /// Missing type or name and an incompatible API version are errors;
    /// missing version, protocols or metric types only produce warnings,
    /// which are returned.
    pub fn validate(&self, plugin: &dyn CollectorPlugin) -> PluginResult<Vec<String>> {
        let descriptor = plugin.descriptor();
        if descriptor.plugin_type.trim().is_empty() {
            return Err(PluginError::invalid_descriptor(descriptor.plugin_type.clone(), "plugin type must not be empty"));
        }
        if descriptor.name.trim().is_empty() {
            return Err(PluginError::invalid_descriptor(descriptor.plugin_type.clone(), "plugin name must not be empty"));
        }
        self.compatibility.check_plugin_compatibility(descriptor)?;

        let mut warnings = Vec::new();
        if descriptor.version.trim().is_empty() {
            warnings.push(format!("plugin {} declares no version", descriptor.plugin_type));
        }
        if descriptor.supported_protocols.is_empty() {
            warnings.push(format!("plugin {} declares no supported protocols", descriptor.plugin_type));
        }
        if descriptor.supported_metric_types.is_empty() {
            warnings.push(format!("plugin {} declares no supported metric types", descriptor.plugin_type));
        }
        Ok(warnings)
    }

    fn registration_lock(&self, plugin_type: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.registration_locks
            .entry(plugin_type.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Register a plugin, replacing and retiring any existing instance of the same type
    pub async fn register(&self, plugin: Arc<dyn CollectorPlugin>) -> PluginResult<()> {
        let plugin_type = plugin.plugin_type().to_string();
        let warnings = match self.validate(plugin.as_ref()) {
            Ok(warnings) => warnings,
            Err(e) => {
                error!("Rejected plugin registration for '{}': {}", plugin_type, e);
                self.listeners.notify("error", |l| l.on_error(&plugin_type, &e));
                return Err(e);
            }
        };
        for warning in &warnings {
            warn!("{}", warning);
        }

        let lock = self.registration_lock(&plugin_type);
        let _guard = lock.lock().await;

        let descriptor = plugin.descriptor().clone();
        let previous = self.plugins.insert(plugin_type.clone(), RegistryEntry::new(plugin));
        if let Some(previous) = previous {
            info!("Replacing existing plugin {}", plugin_type);
            self.retire(&plugin_type, previous.plugin).await;
        }

        info!("Registered plugin {} ({} {})", plugin_type, descriptor.name, descriptor.version);
        self.listeners.notify("registered", |l| l.on_registered(&plugin_type, &descriptor));
        self.enable(&plugin_type)
    }

    /// Register every plugin, reporting all failures together
    pub async fn register_batch(&self, plugins: Vec<Arc<dyn CollectorPlugin>>) -> PluginResult<()> {
        let mut failed = Vec::new();
        for plugin in plugins {
            let plugin_type = plugin.plugin_type().to_string();
            if let Err(e) = self.register(plugin).await {
                warn!("Batch registration of {} failed: {}", plugin_type, e);
                failed.push(plugin_type);
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(PluginError::batch_registration_failed(failed))
        }
    }

    /// Disable, destroy and remove a plugin
    pub async fn unregister(&self, plugin_type: &str) -> PluginResult<()> {
        let lock = self.registration_lock(plugin_type);
        let _guard = lock.lock().await;

        let plugin = match self.plugins.get_mut(plugin_type) {
            Some(mut entry) => {
                entry.status = RegistryStatus::Unloading;
                entry.plugin.clone()
            }
            None => return Err(PluginError::plugin_not_found(plugin_type)),
        };

        if let Err(e) = plugin.destroy().await {
            error!("Failed to destroy plugin {}: {}", plugin_type, e);
            if let Some(mut entry) = self.plugins.get_mut(plugin_type) {
                entry.status = RegistryStatus::Error;
            }
            self.listeners.notify("error", |l| l.on_error(plugin_type, &e));
            return Err(e);
        }

        self.plugins.remove(plugin_type);
        info!("Unregistered plugin {}", plugin_type);
        self.listeners.notify("disabled", |l| l.on_disabled(plugin_type));
        self.listeners.notify("unregistered", |l| l.on_unregistered(plugin_type));
        Ok(())
    }

    /// Tear down an instance that has already left the map
    async fn retire(&self, plugin_type: &str, plugin: Arc<dyn CollectorPlugin>) {
        self.listeners.notify("disabled", |l| l.on_disabled(plugin_type));
        if let Err(e) = plugin.destroy().await {
            error!("Failed to destroy replaced plugin {}: {}", plugin_type, e);
            self.listeners.notify("error", |l| l.on_error(plugin_type, &e));
        }
        self.listeners.notify("unregistered", |l| l.on_unregistered(plugin_type));
    }

    /// Look up a plugin, recording the access
    pub fn get(&self, plugin_type: &str) -> Option<Arc<dyn CollectorPlugin>> {
        self.plugins.get(plugin_type).map(|entry| {
            entry.touch();
            entry.plugin.clone()
        })
    }

    pub fn get_all(&self) -> Vec<Arc<dyn CollectorPlugin>> {
        self.plugins.iter().map(|entry| entry.plugin.clone()).collect()
    }

    pub fn get_all_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.plugins.iter().map(|entry| entry.key().clone()).collect();
        types.sort();
        types
    }

    pub fn get_for_device_type(&self, device_type: &str) -> Vec<Arc<dyn CollectorPlugin>> {
        self.collect_matching(|entry| entry.plugin.supports(device_type))
    }

    pub fn get_for_protocol(&self, protocol: &str) -> Vec<Arc<dyn CollectorPlugin>> {
        self.collect_matching(|entry| entry.plugin.supports_protocol(protocol))
    }

    /// Enabled plugins supporting the device type, ordered by priority then type
    pub fn get_enabled_for_device_type(&self, device_type: &str) -> Vec<Arc<dyn CollectorPlugin>> {
        self.collect_matching(|entry| entry.status == RegistryStatus::Enabled && entry.plugin.supports(device_type))
    }

    fn collect_matching<F>(&self, predicate: F) -> Vec<Arc<dyn CollectorPlugin>>
    where
        F: Fn(&RegistryEntry) -> bool,
    {
        let mut matching: Vec<Arc<dyn CollectorPlugin>> = self
            .plugins
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.plugin.clone())
            .collect();
        matching.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| a.plugin_type().cmp(b.plugin_type()))
        });
        matching
    }

    pub fn is_registered(&self, plugin_type: &str) -> bool {
        self.plugins.contains_key(plugin_type)
    }

    pub fn is_enabled(&self, plugin_type: &str) -> bool {
        self.status(plugin_type) == Some(RegistryStatus::Enabled)
    }

    pub fn status(&self, plugin_type: &str) -> Option<RegistryStatus> {
        self.plugins.get(plugin_type).map(|entry| entry.status)
    }

    pub fn count(&self) -> usize {
        self.plugins.len()
    }

    pub fn enabled_count(&self) -> usize {
        self.plugins
            .iter()
            .filter(|entry| entry.status == RegistryStatus::Enabled)
            .count()
    }

    pub fn enable(&self, plugin_type: &str) -> PluginResult<()> {
        self.set_status(plugin_type, RegistryStatus::Enabled)?;
        self.listeners.notify("enabled", |l| l.on_enabled(plugin_type));
        Ok(())
    }

    pub fn disable(&self, plugin_type: &str) -> PluginResult<()> {
        self.set_status(plugin_type, RegistryStatus::Disabled)?;
        self.listeners.notify("disabled", |l| l.on_disabled(plugin_type));
        Ok(())
    }

    fn set_status(&self, plugin_type: &str, target: RegistryStatus) -> PluginResult<()> {
        let mut entry = match self.plugins.get_mut(plugin_type) {
            Some(entry) => entry,
            None => {
                warn!("Cannot change status of unknown plugin {} to {}", plugin_type, target);
                return Err(PluginError::plugin_not_found(plugin_type));
            }
        };
        if entry.status == target {
            debug!("Plugin {} already {}", plugin_type, target);
            return Ok(());
        }
        entry.status = target;
        info!("Plugin {} is now {}", plugin_type, target);
        Ok(())
    }

    /// Disable then re-enable a plugin, keeping its registration
    pub fn reload(&self, plugin_type: &str) -> PluginResult<()> {
        if !self.is_registered(plugin_type) {
            return Err(PluginError::plugin_not_found(plugin_type));
        }
        self.disable(plugin_type)?;
        self.enable(plugin_type)?;
        info!("Reloaded plugin {}", plugin_type);
        Ok(())
    }

    pub fn plugin_info(&self, plugin_type: &str) -> Option<PluginInfo> {
        self.plugins.get(plugin_type).map(|entry| entry.info(plugin_type))
    }

    pub fn plugin_infos(&self) -> Vec<PluginInfo> {
        let mut infos: Vec<PluginInfo> = self
            .plugins
            .iter()
            .map(|entry| entry.info(entry.key()))
            .collect();
        infos.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.plugin_type.cmp(&b.plugin_type)));
        infos
    }

    /// Priority of every registered plugin
    pub fn priorities(&self) -> HashMap<String, i32> {
        self.plugins
            .iter()
            .map(|entry| (entry.key().clone(), entry.plugin.priority()))
            .collect()
    }

    /// Unregister every plugin
    pub async fn clear(&self) {
        for plugin_type in self.get_all_types() {
            if let Err(e) = self.unregister(&plugin_type).await {
                warn!("Failed to unregister {} while clearing registry: {}", plugin_type, e);
            }
        }
    }
}
