use clap::Parser;
use anyhow::Result;
use std::path::PathBuf;
use log::{debug, info};

/// Device Telemetry Collector
#[derive(Parser, Debug)]
#[command(name = "devcollect")]
#[command(about = "Pluggable device telemetry collector: schedules collection tasks and runs them through collector plugins")]
#[command(version)]
pub struct Args {
    /// Task file (YAML or JSON) with devices and task definitions
    #[arg(short = 't', long = "tasks", value_name = "FILE")]
    pub tasks: Option<PathBuf>,

    /// Verbose output (debug level logging)
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (error level logging only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug output (trace level logging)
    #[arg(long)]
    pub debug: bool,

    /// Console log level: error, warn, info, debug, trace, off
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Log format: text or json
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log file path for file output
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log level for file output (independent of console level)
    #[arg(long, value_name = "LEVEL")]
    pub log_file_level: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long = "config", alias = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Configuration section name
    #[arg(long, value_name = "SECTION")]
    pub config_name: Option<String>,

    /// List registered collector plugins and exit
    #[arg(long)]
    pub list_plugins: bool,

    /// Execute every enabled task once and exit
    #[arg(long)]
    pub once: bool,

    /// Write the effective configuration as TOML and exit
    #[arg(long, value_name = "FILE")]
    pub export_config: Option<PathBuf>,

    /// Disable coloured output
    #[arg(long)]
    pub no_color: bool,
}

/// Parse command line arguments
pub fn parse_args() -> Args {
    let args = Args::parse();
    debug!("Parsed CLI arguments: {:?}", args);
    args
}

/// Validate CLI argument combinations
pub fn validate_args(args: &Args) -> Result<()> {
    debug!("Validating CLI argument combinations");

    let log_flags_count = [args.verbose, args.quiet, args.debug, args.log_level.is_some()]
        .iter()
        .filter(|&&flag| flag)
        .count();

    if log_flags_count > 1 {
        return Err(anyhow::anyhow!(
            "Conflicting log level flags: only one of --verbose, --quiet, --debug or --log-level may be specified"
        ));
    }

    match args.log_format.to_lowercase().as_str() {
        "text" | "json" => {}
        _ => return Err(anyhow::anyhow!(
            "Invalid log format '{}'. Valid options: text, json", args.log_format
        )),
    }

    for level in [&args.log_level, &args.log_file_level].into_iter().flatten() {
        crate::logging::parse_log_level(level)?;
    }

    if args.log_file_level.is_some() && args.log_file.is_none() {
        return Err(anyhow::anyhow!(
            "--log-file-level requires --log-file to be specified"
        ));
    }

    if args.once && args.list_plugins {
        return Err(anyhow::anyhow!("--once and --list-plugins cannot be combined"));
    }

    info!("CLI arguments validated successfully");
    Ok(())
}
