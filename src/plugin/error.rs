//! Plugin Error Types
//!
//! Errors raised by registration, validation and lifecycle operations.
//! Collection failures are not errors; they are reported as failed
//! `CollectionResult`s.

use thiserror::Error;
use super::state::PluginState;

pub type PluginResult<T> = Result<T, PluginError>;

#[derive(Error, Debug, Clone)]
pub enum PluginError {
    /// Descriptor rejected at registration
    #[error("Invalid plugin descriptor '{plugin_type}': {reason}")]
    InvalidDescriptor { plugin_type: String, reason: String },

    /// Plugin built against a different API year
    #[error("Plugin '{plugin_type}' requires API version {plugin_version} but host provides {host_version}")]
    ApiVersionMismatch {
        plugin_type: String,
        plugin_version: u32,
        host_version: u32,
    },

    #[error("Batch registration failed for: {}", failed.join(", "))]
    BatchRegistrationFailed { failed: Vec<String> },

    #[error("Plugin not found: {plugin_type}")]
    PluginNotFound { plugin_type: String },

    #[error("Plugin {plugin_type} failed to initialize: {message}")]
    InitializationFailed { plugin_type: String, message: String },

    #[error("Plugin already initialized: {plugin_type}")]
    AlreadyInitialized { plugin_type: String },

    /// Destroyed instances cannot be reused
    #[error("Plugin destroyed: {plugin_type}")]
    PluginDestroyed { plugin_type: String },

    #[error("Cannot {operation} plugin {plugin_type} in state {state}")]
    InvalidTransition {
        plugin_type: String,
        operation: String,
        state: PluginState,
    },

    /// Device has no address or port the plugin can reach
    #[error("No endpoint configured for device {device_id}")]
    MissingEndpoint { device_id: u64 },

    #[error("Plugin configuration error: {message}")]
    ConfigurationError { message: String },

    /// Driver-level failure while collecting or probing
    #[error("Collection failed: {message}")]
    ExecutionFailed { message: String },

    #[error("Plugin error: {message}")]
    Other { message: String },
}

impl PluginError {
    pub fn invalid_descriptor<T: Into<String>, R: Into<String>>(plugin_type: T, reason: R) -> Self {
        Self::InvalidDescriptor { plugin_type: plugin_type.into(), reason: reason.into() }
    }

    pub fn api_version_mismatch<T: Into<String>>(plugin_type: T, plugin_version: u32, host_version: u32) -> Self {
        Self::ApiVersionMismatch { plugin_type: plugin_type.into(), plugin_version, host_version }
    }

    pub fn batch_registration_failed(failed: Vec<String>) -> Self {
        Self::BatchRegistrationFailed { failed }
    }

    pub fn plugin_not_found<T: Into<String>>(plugin_type: T) -> Self {
        Self::PluginNotFound { plugin_type: plugin_type.into() }
    }

    pub fn initialization_failed<T: Into<String>, M: Into<String>>(plugin_type: T, message: M) -> Self {
        Self::InitializationFailed { plugin_type: plugin_type.into(), message: message.into() }
    }

    pub fn already_initialized<T: Into<String>>(plugin_type: T) -> Self {
        Self::AlreadyInitialized { plugin_type: plugin_type.into() }
    }

    pub fn plugin_destroyed<T: Into<String>>(plugin_type: T) -> Self {
        Self::PluginDestroyed { plugin_type: plugin_type.into() }
    }

    pub fn invalid_transition<T: Into<String>, O: Into<String>>(plugin_type: T, operation: O, state: PluginState) -> Self {
        Self::InvalidTransition { plugin_type: plugin_type.into(), operation: operation.into(), state }
    }

    pub fn missing_endpoint(device_id: u64) -> Self {
        Self::MissingEndpoint { device_id }
    }

    pub fn configuration_error<M: Into<String>>(message: M) -> Self {
        Self::ConfigurationError { message: message.into() }
    }

    pub fn execution_failed<M: Into<String>>(message: M) -> Self {
        Self::ExecutionFailed { message: message.into() }
    }

    pub fn other<M: Into<String>>(message: M) -> Self {
        Self::Other { message: message.into() }
    }

    /// Worth retrying on the next firing
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PluginError::ExecutionFailed { .. })
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            PluginError::ConfigurationError { .. }
                | PluginError::ApiVersionMismatch { .. }
                | PluginError::MissingEndpoint { .. }
        )
    }

    /// Raised synchronously by registration checks
    pub fn is_validation_error(&self) -> bool {
        matches!(self, PluginError::InvalidDescriptor { .. } | PluginError::ApiVersionMismatch { .. })
    }

    pub fn is_lifecycle_error(&self) -> bool {
        matches!(
            self,
            PluginError::InitializationFailed { .. }
                | PluginError::AlreadyInitialized { .. }
                | PluginError::PluginDestroyed { .. }
                | PluginError::PluginNotFound { .. }
                | PluginError::InvalidTransition { .. }
        )
    }
}
