//! Test utilities and helper functions

use crate::common::mock_interface::MockInterface;
use ois_driver::firmware::{CHECKSUM_WORD_OFFSET, MIN_TRAILER_IMAGE_SIZE, VERSION_WORD_OFFSET};
use ois_driver::{FirmwareLoader, OisConfig, OisDevice};
use std::collections::HashMap;

/// Mock delay implementation for testing
///
/// Sums up all requested delays. When attached to a `MockInterface` each
/// delay is also written to its operations log, so tests can check where in
/// the register traffic a pause happened.
#[derive(Clone, Default)]
pub struct MockDelay {
    total_us: u64,
    interface: Option<MockInterface>,
}

impl MockDelay {
    /// Create a detached delay
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a delay that logs into `interface`
    pub fn attached(interface: &MockInterface) -> Self {
        Self {
            total_us: 0,
            interface: Some(interface.clone()),
        }
    }

    /// Total time requested so far, in microseconds
    #[allow(dead_code)]
    pub fn total_us(&self) -> u64 {
        self.total_us
    }

    fn record(&mut self, us: u32) {
        self.total_us += u64::from(us);
        if let Some(interface) = &self.interface {
            interface.record_delay(us);
        }
    }
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.record(ns.div_ceil(1000));
    }

    fn delay_us(&mut self, us: u32) {
        self.record(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.record(ms * 1000);
    }
}

/// Loader error
#[derive(Debug, Clone, PartialEq)]
pub struct MissingImage;

/// In-memory firmware loader
#[derive(Debug, Default)]
pub struct MemoryLoader {
    images: HashMap<String, Vec<u8>>,
    requests: Vec<String>,
}

impl MemoryLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an image
    pub fn with_image(mut self, name: &str, data: Vec<u8>) -> Self {
        self.images.insert(name.to_string(), data);
        self
    }

    /// Names requested so far, in order
    #[allow(dead_code)]
    pub fn requests(&self) -> &[String] {
        &self.requests
    }
}

impl FirmwareLoader for MemoryLoader {
    type Blob = Vec<u8>;
    type Error = MissingImage;

    fn load(&mut self, name: &str) -> Result<Self::Blob, Self::Error> {
        self.requests.push(name.to_string());
        self.images.get(name).cloned().ok_or(MissingImage)
    }
}

/// Build a DW9781C image carrying `checksum` and `version` in its trailer
#[allow(dead_code)]
pub fn dw9781c_image(checksum: u16, version: u16) -> Vec<u8> {
    let mut image: Vec<u8> = (0..MIN_TRAILER_IMAGE_SIZE).map(|i| (i % 251) as u8).collect();
    image[CHECKSUM_WORD_OFFSET * 2..CHECKSUM_WORD_OFFSET * 2 + 2].copy_from_slice(&checksum.to_be_bytes());
    image[VERSION_WORD_OFFSET * 2..VERSION_WORD_OFFSET * 2 + 2].copy_from_slice(&version.to_be_bytes());
    image
}

/// Create a mock device for testing
/// Returns (device, interface) where interface is a clone that shares state with the device
pub fn create_mock_device(config: OisConfig) -> (OisDevice<MockInterface>, MockInterface) {
    let interface = MockInterface::new();
    let interface_clone = interface.clone();
    let device = OisDevice::new(interface, config);
    (device, interface_clone)
}
