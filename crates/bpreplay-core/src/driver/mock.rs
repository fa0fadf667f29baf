//! Mock device driver for testing.

use std::sync::{Arc, Mutex};

use super::traits::{DeviceDriver, DeviceImage, DriverError, ProgramOptions, first_difference};

/// In-memory device that records what was programmed.
pub struct MockDriver {
    name: String,
    /// Current device contents.
    contents: Arc<Mutex<DeviceImage>>,
    /// Captured program calls.
    programmed: Arc<Mutex<Vec<DeviceImage>>>,
    /// Flip the first code byte on read-back.
    corrupt_readback: Arc<Mutex<bool>>,
}

impl MockDriver {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            contents: Arc::new(Mutex::new(DeviceImage::default())),
            programmed: Arc::new(Mutex::new(Vec::new())),
            corrupt_readback: Arc::new(Mutex::new(false)),
        }
    }

    /// Preload device contents for read tests.
    pub fn with_contents(self, image: DeviceImage) -> Self {
        *self.contents.lock().unwrap() = image;
        self
    }

    /// Get all captured program calls.
    pub fn get_programmed(&self) -> Vec<DeviceImage> {
        self.programmed.lock().unwrap().clone()
    }

    /// Simulate a device that does not hold what was written.
    pub fn set_corrupt_readback(&self, corrupt: bool) {
        *self.corrupt_readback.lock().unwrap() = corrupt;
    }
}

impl DeviceDriver for MockDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn program(&self, image: &DeviceImage, opts: &ProgramOptions) -> Result<(), DriverError> {
        if image.code.is_none() {
            return Err(DriverError::MissingPayload("code"));
        }
        self.programmed.lock().unwrap().push(image.clone());
        *self.contents.lock().unwrap() = image.clone();

        if opts.verify {
            let readback = self.read(opts)?;
            for (region, expected) in image.regions() {
                let actual = match region {
                    "code" => readback.code.as_deref(),
                    "data" => readback.data.as_deref(),
                    _ => readback.config.as_deref(),
                }
                .unwrap_or_default();
                if let Some(offset) = first_difference(expected, actual) {
                    return Err(DriverError::VerifyFailed { region, offset });
                }
            }
        }
        Ok(())
    }

    fn read(&self, _opts: &ProgramOptions) -> Result<DeviceImage, DriverError> {
        let mut image = self.contents.lock().unwrap().clone();
        if *self.corrupt_readback.lock().unwrap() {
            if let Some(first) = image.code.as_mut().and_then(|c| c.first_mut()) {
                *first ^= 0xFF;
            }
        }
        Ok(image)
    }
}
