//! Device configuration
//!
//! Devices are stored as a JSON object mapping device name to its control
//! endpoint. Object order is preserved and defines the device order used to
//! resolve positional references in older schedule files.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use super::error::{DeviceError, DeviceResult};

/// Default control port of an encoder server
pub const DEFAULT_PORT: u16 = 32108;

/// A configured encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Name used in protocol commands
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Optional friendlier name for listings
    pub display_name: Option<String>,
}

impl Device {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Name shown to operators
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEndpoint {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Ordered set of configured devices
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_devices(devices: impl IntoIterator<Item = Device>) -> Self {
        let mut registry = Self::new();
        for device in devices {
            registry.upsert(device);
        }
        registry
    }

    /// Load from a JSON file; a missing file is an empty registry
    pub async fn load(path: impl AsRef<Path>) -> DeviceResult<Self> {
        let path = path.as_ref();
        let json = match tokio::fs::read_to_string(path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "Device config not found, starting empty");
                return Ok(Self::new());
            }
            Err(e) => return Err(DeviceError::io(path.display().to_string(), e)),
        };
        Self::from_json(&json)
    }

    /// Parse the JSON map format
    pub fn from_json(json: &str) -> DeviceResult<Self> {
        if json.trim().is_empty() {
            return Ok(Self::new());
        }
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for (name, value) in map {
            let endpoint: StoredEndpoint = serde_json::from_value(value)?;
            registry.upsert(Device {
                name,
                host: endpoint.host,
                port: endpoint.port,
                display_name: endpoint.display_name,
            });
        }
        Ok(registry)
    }

    /// Serialize to the JSON map format
    pub fn to_json(&self) -> DeviceResult<String> {
        let mut map = serde_json::Map::new();
        for device in &self.devices {
            let endpoint = StoredEndpoint {
                host: device.host.clone(),
                port: device.port,
                display_name: device.display_name.clone(),
            };
            map.insert(device.name.clone(), serde_json::to_value(endpoint)?);
        }
        Ok(serde_json::to_string_pretty(&map)?)
    }

    /// Write the registry to a JSON file
    pub async fn save(&self, path: impl AsRef<Path>) -> DeviceResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DeviceError::io(parent.display().to_string(), e))?;
        }
        tokio::fs::write(path, self.to_json()?)
            .await
            .map_err(|e| DeviceError::io(path.display().to_string(), e))
    }

    pub fn get(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or replace a device; returns true if it was new
    pub fn upsert(&mut self, device: Device) -> bool {
        match self.devices.iter_mut().find(|d| d.name == device.name) {
            Some(existing) => {
                *existing = device;
                false
            }
            None => {
                self.devices.push(device);
                true
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Device> {
        let index = self.devices.iter().position(|d| d.name == name)?;
        Some(self.devices.remove(index))
    }

    /// Device names in configured order
    pub fn names(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.name.clone()).collect()
    }

    pub fn name_set(&self) -> HashSet<String> {
        self.devices.iter().map(|d| d.name.clone()).collect()
    }

    /// Operator-facing name, falling back to the raw id
    pub fn display_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.get(name).map(Device::label).unwrap_or(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Add discovered device names served by `host:port`; returns the new ones
    pub fn merge_discovered(&mut self, names: &[String], host: &str, port: u16) -> Vec<String> {
        let mut added = Vec::new();
        for name in names {
            if !self.contains(name) {
                self.devices.push(Device::new(name.clone(), host, port));
                added.push(name.clone());
            }
        }
        added
    }
}
