//! Cached links with retry-once semantics
//!
//! [`LinkPool`] keeps one [`DeviceLink`] per device, each behind its own async
//! mutex so concurrent commands to one device are serialized while different
//! devices proceed in parallel. Failures never surface as `Err`: after one
//! reconnect-and-retry the caller receives a synthetic `ERROR: ...` response.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::error::DeviceResult;
use super::link::{DeviceLink, LinkSettings};
use super::registry::DeviceRegistry;

/// Prefix of responses synthesized locally instead of received from a device
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Build a synthetic error response
pub fn synthetic_error(reason: impl std::fmt::Display) -> String {
    format!("{ERROR_PREFIX}{reason}")
}

/// Whether a response was synthesized locally
pub fn is_synthetic_error(response: &str) -> bool {
    response.starts_with(ERROR_PREFIX)
}

/// Anything that can deliver a command line to a named device
///
/// Implementations never fail; transport problems are reported in the
/// returned text.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn execute(&self, device: &str, command: &str) -> String;
}

type SharedLink = Arc<Mutex<DeviceLink>>;

/// Lazily populated pool of device links
pub struct LinkPool {
    registry: RwLock<DeviceRegistry>,
    settings: LinkSettings,
    links: Mutex<HashMap<String, SharedLink>>,
}

impl LinkPool {
    pub fn new(registry: DeviceRegistry, settings: LinkSettings) -> Self {
        Self {
            registry: RwLock::new(registry),
            settings,
            links: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// Replace the device configuration, dropping links whose endpoint changed
    ///
    /// Links of removed devices stay cached so a running recording can
    /// still be stopped; they go away with [`LinkPool::close_all`].
    pub async fn update_registry(&self, registry: DeviceRegistry) {
        let mut current = self.registry.write().await;
        let mut links = self.links.lock().await;
        links.retain(|name, _| match (current.get(name), registry.get(name)) {
            (Some(old), Some(new)) => old.address() == new.address(),
            (_, None) => true,
            _ => false,
        });
        *current = registry;
    }

    async fn link_for(&self, device: &str) -> Option<SharedLink> {
        let mut links = self.links.lock().await;
        if let Some(link) = links.get(device) {
            return Some(link.clone());
        }

        let registry = self.registry.read().await;
        let config = registry.get(device)?;
        let link = Arc::new(Mutex::new(DeviceLink::new(config, self.settings)));
        links.insert(device.to_string(), link.clone());
        Some(link)
    }

    /// Close every cached link
    pub async fn close_all(&self) {
        let links: Vec<SharedLink> = self.links.lock().await.drain().map(|(_, l)| l).collect();
        for link in links {
            link.lock().await.close().await;
        }
    }

    /// One-shot command to an address outside the registry, for discovery
    pub async fn query_address(&self, host: &str, port: u16, command: &str) -> DeviceResult<String> {
        let mut link = DeviceLink::to_address(host, format!("{host}:{port}"), self.settings);
        let result = link.send(command).await;
        link.close().await;
        result
    }
}

#[async_trait]
impl CommandTransport for LinkPool {
    async fn execute(&self, device: &str, command: &str) -> String {
        let Some(link) = self.link_for(device).await else {
            tracing::warn!(device = %device, command = %command, "Command for unknown device");
            return synthetic_error(format!("unknown device {device}"));
        };

        let mut link = link.lock().await;
        match link.send(command).await {
            Ok(response) => response,
            Err(first) => {
                tracing::warn!(device = %device, command = %command, error = %first, "Command failed, reconnecting once");
                link.close().await;
                match link.send(command).await {
                    Ok(response) => response,
                    Err(second) => {
                        link.close().await;
                        tracing::error!(device = %device, command = %command, error = %second, "Command failed after reconnect");
                        synthetic_error(second)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::registry::Device;

    #[test]
    fn test_synthetic_error_marker() {
        let text = synthetic_error("connection refused");
        assert_eq!(text, "ERROR: connection refused");
        assert!(is_synthetic_error(&text));
        assert!(!is_synthetic_error("OK"));
    }

    #[tokio::test]
    async fn test_unknown_device_is_synthetic_error() {
        let pool = LinkPool::new(DeviceRegistry::new(), LinkSettings::default());
        let response = pool.execute("ghost", "EncStatus \"ghost\"").await;
        assert!(is_synthetic_error(&response));
        assert!(response.contains("ghost"));
    }

    #[tokio::test]
    async fn test_update_registry_drops_moved_links() {
        let registry = DeviceRegistry::from_devices([Device::new("enc1", "127.0.0.1", 1)]);
        let pool = LinkPool::new(registry, LinkSettings::default());
        assert!(pool.link_for("enc1").await.is_some());

        let moved = DeviceRegistry::from_devices([Device::new("enc1", "127.0.0.1", 2)]);
        pool.update_registry(moved).await;
        assert!(pool.links.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_registry_keeps_removed_device_link() {
        let registry = DeviceRegistry::from_devices([Device::new("enc1", "127.0.0.1", 1)]);
        let pool = LinkPool::new(registry, LinkSettings::default());
        assert!(pool.link_for("enc1").await.is_some());

        pool.update_registry(DeviceRegistry::new()).await;
        assert!(pool.links.lock().await.contains_key("enc1"));
        let other = DeviceRegistry::from_devices([Device::new("enc2", "127.0.0.1", 2)]);
        pool.update_registry(other).await;
        assert!(pool.links.lock().await.contains_key("enc1"));

        let readded = DeviceRegistry::from_devices([Device::new("enc1", "127.0.0.1", 3)]);
        pool.update_registry(readded).await;
        assert!(!pool.links.lock().await.contains_key("enc1"));

        pool.close_all().await;
        assert!(pool.links.lock().await.is_empty());
    }
}
