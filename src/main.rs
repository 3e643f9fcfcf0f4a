use anyhow::{Context, Result};
use std::process;
use log::{error, info, warn};

use devcollect::app::{self, CollectorService, TaskFile};
use devcollect::config::ConfigManager;
use devcollect::report::{self, Palette};
use devcollect::{cli, logging};

fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("Application panicked: {}", panic_info);
        eprintln!("Panic: {}", panic_info);
    }));

    if let Err(e) = run() {
        error!("Application error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = cli::parse_args();
    cli::validate_args(&args)?;

    let config_manager = app::load_configuration(&args)?;
    let log_config = app::configure_logging(&args, &config_manager)?;
    logging::init_logger(log_config)?;

    if let Some(export_path) = &args.export_config {
        return app::handle_export_config(&config_manager, export_path);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;

    runtime.block_on(run_collector(args, config_manager))
}

async fn run_collector(args: cli::Args, config_manager: ConfigManager) -> Result<()> {
    let tasks = match &args.tasks {
        Some(path) => TaskFile::load(path)?,
        None => {
            warn!("No task file given, starting without tasks");
            TaskFile::default()
        }
    };
    let palette = Palette::from_flag(args.no_color);
    let service = CollectorService::build(&config_manager, tasks).await?;

    if args.list_plugins {
        let lifecycle = service.lifecycle();
        print!(
            "{}",
            report::plugin_report(&lifecycle.registry().plugin_infos(), &lifecycle.get_all_plugin_states(), palette)
        );
        service.shutdown().await;
        return Ok(());
    }

    if args.once {
        let outcomes = service.run_once().await?;
        let engine = service.engine();
        print!(
            "{}",
            report::engine_report(&engine.execution_statistics(), &engine.perform_health_check().await, palette)
        );
        service.shutdown().await;

        let failed = outcomes.iter().filter(|(_, outcome)| outcome.is_err()).count();
        if failed > 0 {
            anyhow::bail!("{} of {} tasks failed", failed, outcomes.len());
        }
        return Ok(());
    }

    service.start().await?;
    info!("Collector running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;

    let scheduler = service.scheduler();
    let tasks = scheduler.task_snapshots();
    let statistics = scheduler.get_statistics();
    service.shutdown().await;

    print!("{}", report::task_report(&tasks, palette));
    print!("{}", report::scheduler_report(&statistics, palette));
    Ok(())
}
