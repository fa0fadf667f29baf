//! Device driver layer module.

pub mod mock;
pub mod registry;
pub mod traits;

pub use mock::MockDriver;
pub use registry::DriverRegistry;
pub use traits::{DeviceDriver, DeviceImage, DriverError, ProgramOptions};
