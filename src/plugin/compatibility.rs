//! Version Compatibility Checker
//!
//! Plugins declare the host API version they were built against (YYYYMMDD).
//! A plugin is accepted when its major version (the year) matches the host's.

use super::error::{PluginError, PluginResult};
use super::traits::PluginDescriptor;

// Generated by build.rs from package.metadata.devcollect.api_version
include!(concat!(env!("OUT_DIR"), "/version_api.rs"));

/// Host plugin API version
pub fn api_version() -> u32 {
    BASE_API_VERSION
}

pub struct VersionCompatibilityChecker {
    api_version: u32,
}

impl Default for VersionCompatibilityChecker {
    fn default() -> Self {
        Self::new(BASE_API_VERSION)
    }
}

impl VersionCompatibilityChecker {
    pub fn new(api_version: u32) -> Self {
        Self { api_version }
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    pub fn is_api_compatible(&self, plugin_api_version: u32) -> bool {
        Self::major_version(self.api_version) == Self::major_version(plugin_api_version)
    }

    /// Major version (year) of a YYYYMMDD version
    pub fn major_version(api_version: u32) -> u32 {
        api_version / 10000
    }

    pub fn check_plugin_compatibility(&self, descriptor: &PluginDescriptor) -> PluginResult<()> {
        if !self.is_api_compatible(descriptor.api_version) {
            return Err(PluginError::api_version_mismatch(
                descriptor.plugin_type.clone(),
                descriptor.api_version,
                self.api_version,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_year_is_compatible() {
        let checker = VersionCompatibilityChecker::new(20250727);
        assert!(checker.is_api_compatible(20250101));
        assert!(checker.is_api_compatible(20251231));
        assert!(!checker.is_api_compatible(20240727));
        assert!(!checker.is_api_compatible(20260101));
    }

    #[test]
    fn test_descriptor_check() {
        let checker = VersionCompatibilityChecker::new(20250727);
        let ok = PluginDescriptor::new("tcp", "TCP", "1.0.0", 20250801);
        let old = PluginDescriptor::new("tcp", "TCP", "1.0.0", 20230101);
        assert!(checker.check_plugin_compatibility(&ok).is_ok());
        assert!(matches!(
            checker.check_plugin_compatibility(&old),
            Err(PluginError::ApiVersionMismatch { plugin_version: 20230101, .. })
        ));
    }

    #[test]
    fn test_build_constant() {
        assert_eq!(api_version(), BASE_API_VERSION);
        assert_eq!(VersionCompatibilityChecker::default().api_version(), BASE_API_VERSION);
        assert!(BASE_API_VERSION > 20200000);
    }
}
