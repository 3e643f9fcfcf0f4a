//! Device directory: resolves device ids to descriptors.

use std::sync::Arc;
use async_trait::async_trait;
use dashmap::DashMap;

use super::error::EngineResult;
use crate::model::Device;

#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    async fn get_device(&self, device_id: u64) -> EngineResult<Option<Device>>;
}

#[derive(Debug, Default)]
pub struct MemoryDeviceDirectory {
    devices: DashMap<u64, Device>,
}

impl MemoryDeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: impl IntoIterator<Item = Device>) -> Arc<Self> {
        let directory = Self::new();
        for device in devices {
            directory.insert(device);
        }
        Arc::new(directory)
    }

    pub fn insert(&self, device: Device) -> Option<Device> {
        self.devices.insert(device.id, device)
    }

    pub fn remove(&self, device_id: u64) -> Option<Device> {
        self.devices.remove(&device_id).map(|(_, device)| device)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[async_trait]
impl DeviceDirectory for MemoryDeviceDirectory {
    async fn get_device(&self, device_id: u64) -> EngineResult<Option<Device>> {
        Ok(self.devices.get(&device_id).map(|device| device.clone()))
    }
}
