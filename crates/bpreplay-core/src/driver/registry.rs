//! Name-keyed collection of device drivers.

use std::collections::BTreeMap;

use tracing::debug;

use super::traits::{DeviceDriver, DriverError};

#[derive(Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, Box<dyn DeviceDriver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, driver: Box<dyn DeviceDriver>) -> Result<(), DriverError> {
        let name = driver.name().to_string();
        if self.drivers.contains_key(&name) {
            return Err(DriverError::DuplicateDevice(name));
        }
        debug!(device = %name, "Registered driver");
        self.drivers.insert(name, driver);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&dyn DeviceDriver, DriverError> {
        self.drivers
            .get(name)
            .map(|d| d.as_ref())
            .ok_or_else(|| DriverError::UnknownDevice(name.to_string()))
    }

    /// Registered device names, sorted.
    pub fn list_known_devices(&self) -> Vec<&str> {
        self.drivers.keys().map(String::as_str).collect()
    }
}
