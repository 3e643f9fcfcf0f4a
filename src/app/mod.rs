//! Application orchestration module

pub mod initialization;
pub mod task_file;
pub mod executor;
pub mod service;

pub use initialization::{configure_logging, handle_export_config, initialize_builtin_plugins, load_configuration};
pub use task_file::TaskFile;
pub use executor::EngineTaskExecutor;
pub use service::CollectorService;
