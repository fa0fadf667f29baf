//! Device driver abstraction.
//!
//! A driver knows how to program and read back one chip family through the
//! programmer. Generated replay scripts exercise the same operations; the
//! decoder itself never calls a driver.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("Device already registered: {0}")]
    DuplicateDevice(String),

    #[error("Image has no {0} payload")]
    MissingPayload(&'static str),

    #[error("Verify failed in {region} at offset 0x{offset:X}")]
    VerifyFailed { region: &'static str, offset: usize },
}

/// Memory regions of a device, each optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceImage {
    pub code: Option<Vec<u8>>,
    pub data: Option<Vec<u8>>,
    pub config: Option<Vec<u8>>,
}

impl DeviceImage {
    pub fn with_code(code: Vec<u8>) -> Self {
        Self {
            code: Some(code),
            ..Default::default()
        }
    }

    /// Regions present, in programming order.
    pub fn regions(&self) -> impl Iterator<Item = (&'static str, &[u8])> {
        [
            ("code", self.code.as_deref()),
            ("data", self.data.as_deref()),
            ("config", self.config.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, bytes)| bytes.map(|b| (name, b)))
    }
}

/// Options shared by program and read operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramOptions {
    /// Run the pin continuity check first.
    pub cont: bool,
    /// Erase before programming; `None` leaves it to the driver.
    pub erase: Option<bool>,
    /// Read back after programming.
    pub verify: bool,
    pub verbose: bool,
}

impl Default for ProgramOptions {
    fn default() -> Self {
        Self {
            cont: true,
            erase: None,
            verify: true,
            verbose: true,
        }
    }
}

/// A chip-family driver.
pub trait DeviceDriver: Send + Sync {
    /// Device name as listed by the registry.
    fn name(&self) -> &str;

    /// Write `image` to the device. `image.code` is required.
    fn program(&self, image: &DeviceImage, opts: &ProgramOptions) -> Result<(), DriverError>;

    /// Read the device contents.
    fn read(&self, opts: &ProgramOptions) -> Result<DeviceImage, DriverError>;
}

/// First offset where `expected` and `actual` differ, if any.
pub fn first_difference(expected: &[u8], actual: &[u8]) -> Option<usize> {
    expected
        .iter()
        .zip(actual)
        .position(|(e, a)| e != a)
        .or_else(|| (expected.len() != actual.len()).then(|| expected.len().min(actual.len())))
}
