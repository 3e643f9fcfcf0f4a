use std::collections::HashMap;
use std::env;
use std::fmt::Display;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use anyhow::{Context, Result};
use toml::Value;
use log::{debug, info};
use crate::engine::EngineConfig;
use crate::plugin::LifecycleConfig;
use crate::scheduler::SchedulerConfig;

/// Configuration storage - section_name -> key -> value
pub type Configuration = HashMap<String, HashMap<String, String>>;

/// Configuration manager
pub struct ConfigManager {
    config: Configuration,
    config_file_path: Option<PathBuf>,
    selected_section: Option<String>,
}

impl ConfigManager {
    /// Create a new ConfigManager from a Configuration (primarily for testing)
    pub fn from_config(config: Configuration) -> Self {
        Self {
            config,
            config_file_path: None,
            selected_section: None,
        }
    }

    /// Load configuration using discovery hierarchy
    pub fn load() -> Result<Self> {
        debug!("Starting configuration discovery");

        for path in discover_config_files() {
            debug!("Attempting to load config from: {}", path.display());
            if path.exists() {
                info!("Loading configuration from: {}", path.display());
                return Self::load_from_file(path);
            }
        }

        info!("No configuration file found, using defaults");
        Ok(Self::from_config(Configuration::new()))
    }

    /// Load configuration from explicit file path
    pub fn load_from_file(path: PathBuf) -> Result<Self> {
        debug!("Loading configuration from file: {}", path.display());

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = parse_toml_config(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!("Successfully loaded configuration from: {}", path.display());
        Ok(Self {
            config,
            config_file_path: Some(path),
            selected_section: None,
        })
    }

    pub fn config_file_path(&self) -> Option<&PathBuf> {
        self.config_file_path.as_ref()
    }

    /// Get value from configuration with section fallback
    pub fn get_value(&self, section: &str, key: &str) -> Option<&String> {
        // Priority: selected_section -> specified section -> base
        if let Some(selected) = &self.selected_section {
            if let Some(value) = self.config.get(selected).and_then(|s| s.get(key)) {
                return Some(value);
            }
        }

        if let Some(value) = self.config.get(section).and_then(|s| s.get(key)) {
            return Some(value);
        }

        self.config.get("base").and_then(|s| s.get(key))
    }

    /// Select configuration section for --config-name
    pub fn select_section(&mut self, section: String) {
        debug!("Selecting configuration section: {}", section);
        self.selected_section = Some(section);
    }

    /// Get boolean value with type conversion
    pub fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>> {
        match self.get_value(section, key) {
            Some(value) => match value.to_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(anyhow::anyhow!("Invalid boolean value for {}.{}: {}", section, key, value)),
            },
            None => Ok(None),
        }
    }

    /// Get log level value with type conversion
    pub fn get_log_level(&self, section: &str, key: &str) -> Result<Option<log::LevelFilter>> {
        match self.get_value(section, key) {
            Some(value) => Ok(Some(crate::logging::parse_log_level(value)?)),
            None => Ok(None),
        }
    }

    /// Get path value with type conversion
    pub fn get_path(&self, section: &str, key: &str) -> Option<PathBuf> {
        self.get_value(section, key).map(PathBuf::from)
    }

    /// Parse a value with `FromStr`
    pub fn get_parsed<T>(&self, section: &str, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get_value(section, key) {
            Some(value) => value
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| anyhow::anyhow!("Invalid value for {}.{}: {} ({})", section, key, value, e)),
            None => Ok(None),
        }
    }

    /// Scheduler settings from `[scheduler]`
    pub fn get_scheduler_config(&self) -> Result<SchedulerConfig> {
        let mut config = SchedulerConfig::default();

        if let Some(size) = self.get_parsed::<usize>("scheduler", "thread-pool-size")? {
            config.thread_pool_size = size;
        }
        if let Some(size) = self.get_parsed::<usize>("scheduler", "max-queue-size")? {
            config.max_queue_size = size;
        }
        if let Some(seconds) = self.get_parsed::<u64>("scheduler", "keep-alive-seconds")? {
            config.keep_alive = Duration::from_secs(seconds);
        }
        if let Some(minutes) = self.get_parsed::<u64>("scheduler", "cleanup-interval-minutes")? {
            config.cleanup_interval = Duration::from_secs(minutes * 60);
        }
        if let Some(seconds) = self.get_parsed::<u64>("scheduler", "cron-check-interval-seconds")? {
            config.cron_check_interval = Duration::from_secs(seconds);
        }

        config.validate()
            .with_context(|| "Scheduler configuration validation failed")?;
        Ok(config)
    }

    /// Plugin lifecycle settings from `[lifecycle]`
    pub fn get_lifecycle_config(&self) -> Result<LifecycleConfig> {
        let mut config = LifecycleConfig::default();

        if let Some(seconds) = self.get_parsed::<u64>("lifecycle", "health-check-interval-seconds")? {
            config.health_check_interval = Duration::from_secs(seconds);
        }
        if let Some(workers) = self.get_parsed::<usize>("lifecycle", "health-check-workers")? {
            config.health_check_workers = workers;
        }

        config.validate()
            .with_context(|| "Lifecycle configuration validation failed")?;
        Ok(config)
    }

    /// Collector engine settings from `[engine]`
    pub fn get_engine_config(&self) -> Result<EngineConfig> {
        let mut config = EngineConfig::default();

        if let Some(concurrency) = self.get_parsed::<usize>("engine", "max-concurrency")? {
            config.max_concurrency = concurrency;
        }
        if let Some(minutes) = self.get_parsed::<u64>("engine", "cleanup-interval-minutes")? {
            config.cleanup_interval = Duration::from_secs(minutes * 60);
        }
        if let Some(days) = self.get_parsed::<i64>("engine", "log-retention-days")? {
            config.log_retention_days = days;
        }

        config.validate()
            .with_context(|| "Engine configuration validation failed")?;
        Ok(config)
    }

    /// The effective typed configuration as TOML
    pub fn export_toml(&self) -> Result<String> {
        let scheduler = self.get_scheduler_config()?;
        let lifecycle = self.get_lifecycle_config()?;
        let engine = self.get_engine_config()?;

        let mut root = toml::Table::new();

        let mut section = toml::Table::new();
        section.insert("thread-pool-size".into(), Value::Integer(scheduler.thread_pool_size as i64));
        section.insert("max-queue-size".into(), Value::Integer(scheduler.max_queue_size as i64));
        section.insert("keep-alive-seconds".into(), Value::Integer(scheduler.keep_alive.as_secs() as i64));
        section.insert("cleanup-interval-minutes".into(), Value::Integer((scheduler.cleanup_interval.as_secs() / 60) as i64));
        section.insert("cron-check-interval-seconds".into(), Value::Integer(scheduler.cron_check_interval.as_secs() as i64));
        root.insert("scheduler".into(), Value::Table(section));

        let mut section = toml::Table::new();
        section.insert("health-check-interval-seconds".into(), Value::Integer(lifecycle.health_check_interval.as_secs() as i64));
        section.insert("health-check-workers".into(), Value::Integer(lifecycle.health_check_workers as i64));
        root.insert("lifecycle".into(), Value::Table(section));

        let mut section = toml::Table::new();
        section.insert("max-concurrency".into(), Value::Integer(engine.max_concurrency as i64));
        section.insert("cleanup-interval-minutes".into(), Value::Integer((engine.cleanup_interval.as_secs() / 60) as i64));
        section.insert("log-retention-days".into(), Value::Integer(engine.log_retention_days));
        root.insert("engine".into(), Value::Table(section));

        if let Some(base) = self.config.get("base") {
            let mut section = toml::Table::new();
            let mut keys: Vec<_> = base.keys().collect();
            keys.sort();
            for key in keys {
                section.insert(key.clone(), Value::String(base[key].clone()));
            }
            root.insert("base".into(), Value::Table(section));
        }

        toml::to_string_pretty(&root).context("Failed to serialize configuration")
    }
}

/// Discover configuration files in order of precedence
fn discover_config_files() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. Environment variable $DEVCOLLECT_CONFIG
    if let Ok(env_path) = env::var("DEVCOLLECT_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    // 2. XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("devcollect").join("config.toml"));
    }

    // 3. Home directory
    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".devcollect.toml"));
    }

    // 4. Project local
    paths.push(PathBuf::from("./.devcollect.toml"));

    debug!("Config discovery paths: {:?}", paths);
    paths
}

/// Parse TOML content to string-based configuration
fn parse_toml_config(content: &str) -> Result<Configuration> {
    let toml_value: Value = content.parse()
        .context("Failed to parse TOML content")?;

    let mut config = Configuration::new();

    if let Value::Table(table) = toml_value {
        flatten_toml_table(&table, String::new(), &mut config);
    }

    debug!("Parsed configuration: {:?}", config);
    Ok(config)
}

/// Recursively flatten TOML tables into section.subsection format
fn flatten_toml_table(table: &toml::Table, prefix: String, config: &mut Configuration) {
    for (key, value) in table {
        let section_name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            Value::Table(subtable) => {
                if subtable.values().all(|v| !matches!(v, Value::Table(_))) {
                    // leaf table
                    let section_map = subtable
                        .iter()
                        .map(|(subkey, subvalue)| (subkey.clone(), toml_value_to_string(subvalue)))
                        .collect();
                    config.insert(section_name, section_map);
                } else {
                    flatten_toml_table(subtable, section_name, config);
                }
            }
            _ => {
                // top-level key outside any table
                let mut section_map = HashMap::new();
                section_map.insert("value".to_string(), toml_value_to_string(value));
                config.insert(section_name, section_map);
            }
        }
    }
}

/// Convert TOML Value to string representation
fn toml_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Datetime(d) => d.to_string(),
        Value::Array(_) | Value::Table(_) => value.to_string(),
    }
}
