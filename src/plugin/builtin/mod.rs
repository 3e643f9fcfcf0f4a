//! Built-in Plugin Implementations

pub mod tcp;

use std::sync::Arc;
use crate::plugin::traits::CollectorPlugin;

pub use tcp::{tcp_probe_plugin, TcpProbeDriver, TcpProbePlugin};

/// Plugin types shipped with the binary
pub fn get_builtin_plugins() -> Vec<&'static str> {
    vec![tcp::PLUGIN_TYPE]
}

/// Create a built-in plugin by type
pub fn create_builtin_plugin(plugin_type: &str) -> Option<Arc<dyn CollectorPlugin>> {
    match plugin_type {
        tcp::PLUGIN_TYPE => Some(Arc::new(tcp_probe_plugin())),
        _ => None,
    }
}
