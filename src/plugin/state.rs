//! Plugin lifecycle and registry states.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a plugin type, owned by the lifecycle manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginState {
    Created,
    Initializing,
    Initialized,
    Starting,
    Started,
    Running,
    Stopping,
    Stopped,
    Destroying,
    Error,
}

impl PluginState {
    /// Whether moving directly from `self` to `next` is a legal transition
    pub fn can_transition_to(self, next: PluginState) -> bool {
        use PluginState::*;
        if next == Error {
            return true;
        }
        matches!(
            (self, next),
            (Created, Initializing)
                | (Initializing, Initialized)
                | (Initialized, Starting)
                | (Starting, Started)
                | (Started, Running)
                | (Started, Stopping)
                | (Running, Stopping)
                | (Stopping, Stopped)
                | (Stopped, Starting)
                | (Created, Destroying)
                | (Initialized, Destroying)
                | (Stopped, Destroying)
                | (Error, Destroying)
        )
    }

    pub fn is_active(self) -> bool {
        matches!(self, PluginState::Running | PluginState::Started)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PluginState::Created => "CREATED",
            PluginState::Initializing => "INITIALIZING",
            PluginState::Initialized => "INITIALIZED",
            PluginState::Starting => "STARTING",
            PluginState::Started => "STARTED",
            PluginState::Running => "RUNNING",
            PluginState::Stopping => "STOPPING",
            PluginState::Stopped => "STOPPED",
            PluginState::Destroying => "DESTROYING",
            PluginState::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for PluginState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration status of a plugin inside the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistryStatus {
    Registered,
    Loading,
    Enabled,
    Unloading,
    Disabled,
    Error,
}

impl std::fmt::Display for RegistryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RegistryStatus::Registered => "REGISTERED",
            RegistryStatus::Loading => "LOADING",
            RegistryStatus::Enabled => "ENABLED",
            RegistryStatus::Unloading => "UNLOADING",
            RegistryStatus::Disabled => "DISABLED",
            RegistryStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}
