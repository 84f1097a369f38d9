use std::net::{IpAddr, SocketAddr};

use shared::domain::Device;

/// Name to address table, fixed once the show is loaded.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
}

impl DeviceRegistry {
    /// Later entries with an already-registered name replace the earlier
    /// address but keep its position.
    pub fn new(devices: impl IntoIterator<Item = Device>) -> Self {
        let mut registry = Self::default();
        for device in devices {
            match registry.devices.iter_mut().find(|d| d.name == device.name) {
                Some(existing) => existing.ip = device.ip,
                None => registry.devices.push(device),
            }
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn contains(&self, name: &str) -> bool {
        self.address_of(name).is_some()
    }

    pub fn address_of(&self, name: &str) -> Option<IpAddr> {
        self.devices
            .iter()
            .find(|device| device.name == name)
            .map(|device| device.ip)
    }

    pub fn endpoint(&self, name: &str, port: u16) -> Option<SocketAddr> {
        self.address_of(name).map(|ip| SocketAddr::new(ip, port))
    }

    /// First device registered at `ip`. `None` for addresses outside the table.
    pub fn resolve_sender(&self, ip: IpAddr) -> Option<&str> {
        let ip = ip.to_canonical();
        self.devices
            .iter()
            .find(|device| device.ip == ip)
            .map(|device| device.name.as_str())
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
