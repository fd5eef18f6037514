//! Per-module configuration
//!
//! An [`OisConfig`] is the caller-owned description of one physical OIS
//! module: which controller it carries, what its firmware images are called,
//! which boot stages are enabled and where the firmware segments land in the
//! controller's address space.
//!
//! ```ignore
//! # use ois_driver::{OisConfig, Opcodes};
//! let config = OisConfig::bm24218("bm24218")
//!     .with_firmware(true)
//!     .with_calibration(true)
//!     .with_opcodes(Opcodes::new(0x0000, 0x1C00));
//! ```

use alloc::string::String;

use crate::Variant;
use crate::transfer::AddressMode;

/// Firmware segment base addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Opcodes {
    /// Base register of the program segment
    pub prog: u16,
    /// Base register of the coefficient segment (unused by single-image chips)
    pub coeff: u16,
}

impl Opcodes {
    /// Create an opcode table
    #[must_use]
    pub const fn new(prog: u16, coeff: u16) -> Self {
        Self { prog, coeff }
    }

    /// Default table for the BM24218 (program RAM at 0x0000, coefficients at 0x1C00)
    pub const BM24218: Self = Self::new(0x0000, 0x1C00);

    /// Default table for the DW9781C (MTP program window at 0x8000)
    pub const DW9781C: Self = Self::new(0x8000, 0x0000);
}

/// Configuration of one OIS module instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OisConfig {
    /// Controller variant
    pub variant: Variant,
    /// Module name; firmware images are `<name>.prog` and `<name>.coeff`
    pub module_name: String,
    /// Download firmware during boot
    pub firmware_enabled: bool,
    /// Write the calibration table during boot
    pub calibration_enabled: bool,
    /// Segment base addresses
    pub opcodes: Opcodes,
    /// How firmware bytes map onto register addresses
    pub transfer_mode: AddressMode,
    /// Fail the boot when leaving download mode fails
    ///
    /// Off by default: the exit-download write has historically been
    /// best-effort and its failure only logged.
    pub strict_complete_download: bool,
    /// Checksum the controller must report after a download
    ///
    /// Only consulted by controllers that compute a checksum without
    /// carrying the expected value in the firmware image (BM24218).
    pub expected_checksum: Option<u32>,
}

impl OisConfig {
    /// Create a configuration for `variant` with all boot stages disabled
    pub fn new(variant: Variant, module_name: impl Into<String>) -> Self {
        let opcodes = match variant {
            Variant::Bm24218 => Opcodes::BM24218,
            Variant::Dw9781c => Opcodes::DW9781C,
        };
        Self {
            variant,
            module_name: module_name.into(),
            firmware_enabled: false,
            calibration_enabled: false,
            opcodes,
            transfer_mode: AddressMode::Increment,
            strict_complete_download: false,
            expected_checksum: None,
        }
    }

    /// Create a BM24218 configuration
    pub fn bm24218(module_name: impl Into<String>) -> Self {
        Self::new(Variant::Bm24218, module_name)
    }

    /// Create a DW9781C configuration
    pub fn dw9781c(module_name: impl Into<String>) -> Self {
        Self::new(Variant::Dw9781c, module_name)
    }

    /// Enable or disable firmware download
    #[must_use]
    pub const fn with_firmware(mut self, enabled: bool) -> Self {
        self.firmware_enabled = enabled;
        self
    }

    /// Enable or disable the calibration table write
    #[must_use]
    pub const fn with_calibration(mut self, enabled: bool) -> Self {
        self.calibration_enabled = enabled;
        self
    }

    /// Override the segment base addresses
    #[must_use]
    pub const fn with_opcodes(mut self, opcodes: Opcodes) -> Self {
        self.opcodes = opcodes;
        self
    }

    /// Select the firmware address mode
    #[must_use]
    pub const fn with_transfer_mode(mut self, mode: AddressMode) -> Self {
        self.transfer_mode = mode;
        self
    }

    /// Treat an exit-download write failure as fatal
    #[must_use]
    pub const fn with_strict_complete_download(mut self, strict: bool) -> Self {
        self.strict_complete_download = strict;
        self
    }

    /// Require a specific post-download checksum
    #[must_use]
    pub const fn with_expected_checksum(mut self, checksum: u32) -> Self {
        self.expected_checksum = Some(checksum);
        self
    }
}

impl Default for OisConfig {
    fn default() -> Self {
        Self::bm24218("bm24218")
    }
}
