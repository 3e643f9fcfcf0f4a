//! Device descriptors resolved by the device directory.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

/// A network device that metrics are collected from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: u64,
    pub name: String,
    /// Device type name used for plugin selection (e.g. "router", "server")
    pub device_type: String,
    /// Preferred protocol (e.g. "snmp", "http", "tcp")
    #[serde(default)]
    pub protocol: String,
    /// Host name or IP address
    pub address: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub credentials: HashMap<String, String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl Device {
    pub fn new(id: u64, name: impl Into<String>, device_type: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            device_type: device_type.into(),
            protocol: String::new(),
            address: address.into(),
            port: None,
            credentials: HashMap::new(),
            tags: HashMap::new(),
        }
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// `address:port`, or the bare address when no port is set
    pub fn endpoint(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.address, port),
            None => self.address.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let device = Device::new(1, "core-sw", "switch", "10.0.0.1");
        assert_eq!(device.endpoint(), "10.0.0.1");
        assert_eq!(device.with_port(161).endpoint(), "10.0.0.1:161");
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{"id":7,"name":"edge","deviceType":"router","address":"192.168.1.1","port":22}"#;
        let device: Device = serde_json::from_str(json).unwrap();
        assert_eq!(device.device_type, "router");
        assert_eq!(device.port, Some(22));
        assert!(device.protocol.is_empty());
    }
}
