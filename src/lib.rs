pub mod app;
pub mod cli;
pub mod config;
pub mod engine;
pub mod logging;
pub mod model;
pub mod plugin;
pub mod report;
pub mod scheduler;
