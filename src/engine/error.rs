//! Engine Error Types
//!
//! Failures of the engine's collaborators (data sink, log sink, device
//! directory). Collection failures themselves are reported as failed
//! `CollectionResult`s and never surface here.

use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// Persisting collection data failed
    #[error("Data sink error: {message}")]
    DataSinkFailed { message: String },

    /// Writing a collection log entry failed
    #[error("Log sink error: {message}")]
    LogSinkFailed { message: String },

    /// A device id could not be resolved
    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: u64 },

    /// Device directory lookup failed
    #[error("Device directory error: {message}")]
    DirectoryFailed { message: String },

    /// Invalid engine configuration
    #[error("Engine configuration error: {message}")]
    ConfigurationError { message: String },
}

impl EngineError {
    pub fn data_sink_failed<S: Into<String>>(message: S) -> Self {
        Self::DataSinkFailed { message: message.into() }
    }

    pub fn log_sink_failed<S: Into<String>>(message: S) -> Self {
        Self::LogSinkFailed { message: message.into() }
    }

    pub fn device_not_found(device_id: u64) -> Self {
        Self::DeviceNotFound { device_id }
    }

    pub fn directory_failed<S: Into<String>>(message: S) -> Self {
        Self::DirectoryFailed { message: message.into() }
    }

    pub fn configuration_error<S: Into<String>>(message: S) -> Self {
        Self::ConfigurationError { message: message.into() }
    }

    /// Sink and directory outages may clear up on their own
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::DataSinkFailed { .. } | EngineError::LogSinkFailed { .. } | EngineError::DirectoryFailed { .. }
        )
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(self, EngineError::ConfigurationError { .. })
    }
}
