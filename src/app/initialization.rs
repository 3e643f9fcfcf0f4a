//! Application initialization and configuration

use std::fs;
use std::path::Path;
use anyhow::{Context, Result};
use log::{debug, info, warn, LevelFilter};
use crate::{cli, config, logging, plugin};

pub fn load_configuration(args: &cli::Args) -> Result<config::ConfigManager> {
    let mut manager = if let Some(config_file) = &args.config_file {
        debug!("Loading configuration from explicit file: {}", config_file.display());
        config::ConfigManager::load_from_file(config_file.clone())?
    } else {
        config::ConfigManager::load()?
    };

    if let Some(section_name) = &args.config_name {
        manager.select_section(section_name.clone());
    }

    Ok(manager)
}

/// Write the effective configuration as TOML
pub fn handle_export_config(config_manager: &config::ConfigManager, export_path: &Path) -> Result<()> {
    info!("Exporting configuration to: {}", export_path.display());

    let content = config_manager.export_toml()?;
    fs::write(export_path, content)
        .with_context(|| format!("Failed to write configuration to {}", export_path.display()))?;

    println!("Configuration exported to: {}", export_path.display());
    Ok(())
}

/// Flags win over `--log-level`, which wins over `base.log-level`
pub fn configure_logging(args: &cli::Args, config: &config::ConfigManager) -> Result<logging::LogConfig> {
    let console_level = if args.debug {
        LevelFilter::Trace
    } else if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Error
    } else if let Some(level) = &args.log_level {
        logging::parse_log_level(level)?
    } else {
        config.get_log_level("base", "log-level")?.unwrap_or(LevelFilter::Info)
    };

    let format = if args.log_format != "text" {
        args.log_format.parse::<logging::LogFormat>().map_err(|e| anyhow::anyhow!(e))?
    } else {
        match config.get_value("base", "log-format") {
            Some(format) => format.parse::<logging::LogFormat>().map_err(|e| anyhow::anyhow!(e))?,
            None => logging::LogFormat::Text,
        }
    };

    let log_file = args.log_file.clone().or_else(|| config.get_path("base", "log-file"));
    let file_level = match &args.log_file_level {
        Some(level) => Some(logging::parse_log_level(level)?),
        None => config.get_log_level("base", "file-log-level")?,
    };

    let (destination, file_level) = match log_file {
        Some(path) => {
            let level = file_level.unwrap_or(console_level);
            debug!("File logging enabled: {} ({:?})", path.display(), level);
            (logging::LogDestination::Both(path), Some(level))
        }
        None => {
            if file_level.is_some() {
                warn!("file-log-level is set but no log file is configured");
            }
            (logging::LogDestination::Console, None)
        }
    };

    Ok(logging::LogConfig {
        console_level,
        file_level,
        format,
        destination,
    })
}

/// Register the shipped plugins and bring them up in priority order
pub async fn initialize_builtin_plugins(lifecycle: &plugin::PluginLifecycleManager) -> Result<()> {
    debug!("Initializing builtin plugins");
    let registry = lifecycle.registry();

    for plugin_type in plugin::builtin::get_builtin_plugins() {
        if let Some(collector) = plugin::builtin::create_builtin_plugin(plugin_type) {
            registry
                .register(collector)
                .await
                .with_context(|| format!("Failed to register {} plugin", plugin_type))?;
        }
    }

    let failed: Vec<String> = lifecycle
        .start_all_plugins_in_order()
        .await
        .into_iter()
        .filter(|(_, result)| result.is_err())
        .map(|(plugin_type, _)| plugin_type)
        .collect();
    if !failed.is_empty() {
        warn!("Plugins failed to start: {}", failed.join(", "));
    }

    info!("Builtin plugins initialized ({} registered)", registry.count());
    Ok(())
}
