//! Firmware images and the firmware context
//!
//! Firmware blobs are loaded by the caller through a [`FirmwareLoader`] and
//! only borrowed by the driver. A blob is released when the loader's `Blob`
//! value is dropped, which happens before the next segment is requested.
//!
//! ## DW9781C image trailer
//!
//! The DW9781C image is an array of 16-bit words. Two trailer words carry the
//! image checksum and version:
//!
//! | Field    | Word offset | Byte offset |
//! |----------|-------------|-------------|
//! | checksum | 10234       | 20468       |
//! | version  | 10235       | 20470       |
//!
//! The words are stored byte-reversed relative to what the controller reports,
//! so each field is read as `u16::from_be_bytes` of the stored pair.

use alloc::format;
use alloc::string::String;

/// Word offset of the image checksum in a DW9781C image
pub const CHECKSUM_WORD_OFFSET: usize = 10234;

/// Word offset of the image version in a DW9781C image
pub const VERSION_WORD_OFFSET: usize = 10235;

/// Smallest DW9781C image that contains both trailer words
pub const MIN_TRAILER_IMAGE_SIZE: usize = (VERSION_WORD_OFFSET + 1) * 2;

/// Driver IC tag recorded in a DW9781C firmware context
pub const DW9781C_DRIVER_IC: u16 = 0x9781;

/// Firmware segment of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Segment {
    /// Program image
    Program,
    /// Coefficient image
    Coefficient,
}

impl Segment {
    /// File name suffix of this segment
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Program => "prog",
            Self::Coefficient => "coeff",
        }
    }

    /// Firmware file name for `module_name`, e.g. `bm24218.prog`
    #[must_use]
    pub fn file_name(self, module_name: &str) -> String {
        format!("{module_name}.{}", self.suffix())
    }
}

/// Source of firmware images
///
/// Implemented by the platform; typically a thin wrapper over the system
/// firmware loader. The returned blob is released when dropped.
pub trait FirmwareLoader {
    /// Loaded image
    type Blob: AsRef<[u8]>;
    /// Loader failure
    type Error: core::fmt::Debug;

    /// Load the image called `name`
    ///
    /// # Errors
    ///
    /// Returns the loader's error if the image does not exist or cannot be read.
    fn load(&mut self, name: &str) -> Result<Self::Blob, Self::Error>;
}

/// Version and checksum extracted from a firmware image
///
/// Created by the pre-flight check and handed to the post-download
/// verification, so both stages compare against the same image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareContext {
    /// Driver IC the image is built for
    pub driver_ic: u16,
    /// Image size in bytes
    pub size: usize,
    /// Image version as reported by the controller
    pub version: u16,
    /// Image checksum as reported by the controller
    pub checksum: u16,
}

impl FirmwareContext {
    /// Extract the trailer of a DW9781C image
    ///
    /// Returns `None` if the image is too short to hold both trailer words.
    #[must_use]
    pub fn parse(image: &[u8]) -> Option<Self> {
        if image.len() < MIN_TRAILER_IMAGE_SIZE {
            return None;
        }
        Some(Self {
            driver_ic: DW9781C_DRIVER_IC,
            size: image.len(),
            version: trailer_word(image, VERSION_WORD_OFFSET)?,
            checksum: trailer_word(image, CHECKSUM_WORD_OFFSET)?,
        })
    }

    /// Whether the controller's programmed version matches this image
    ///
    /// Only the low byte is significant; the high byte carries a vendor tag
    /// that differs between otherwise identical builds.
    #[must_use]
    pub const fn version_matches(&self, device_version: u16) -> bool {
        (device_version & 0xFF) == (self.version & 0xFF)
    }
}

/// Read a trailer word and undo its stored byte order
#[must_use]
pub fn trailer_word(image: &[u8], word_offset: usize) -> Option<u16> {
    let start = word_offset.checked_mul(2)?;
    let bytes = image.get(start..start.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Stored byte pair of a trailer word (inverse of [`trailer_word`])
#[must_use]
pub const fn stored_trailer_bytes(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}
