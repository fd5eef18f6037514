#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

extern crate alloc;

pub mod bus;
pub mod config;
pub mod device;
pub mod firmware;
pub mod interface;
pub mod poll;
pub mod registers;
pub mod sequencer;
pub mod transfer;
pub mod variants;
pub mod verify;

// Re-export main types
pub use bus::{AddressWidth, DataWidth, PostWriteDelay, RegisterBus, RegisterEntry};
pub use config::{OisConfig, Opcodes};
pub use device::OisDevice;
pub use firmware::{FirmwareContext, FirmwareLoader, Segment};
pub use interface::I2cInterface;
pub use poll::StatusPoller;
pub use sequencer::{BootOps, BootSequencer, BootState};
pub use transfer::{AddressMode, TransferPlan};
pub use variants::{Bm24218, Dw9781c};
pub use verify::{ChecksumProbe, Identity, IdentityProbe, Verdict};

/// Supported OIS controller variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Variant {
    /// ROHM BM24218 - separate program and coefficient RAM images
    Bm24218,
    /// Dongwoon DW9781C - single program image flashed to MTP
    Dw9781c,
}

/// Driver errors
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Communication error with the device
    Bus(E),
    /// Argument rejected before touching the bus (short or malformed firmware)
    InvalidArgument,
    /// The transfer staging buffer could not be allocated
    ResourceExhausted,
    /// Status register never reported ready within the poll budget
    Timeout,
    /// Checksum, identity or version did not match
    ///
    /// The boot sequence does not return this; it reports a rejected image
    /// through [`OisDevice::needs_redownload`] instead. Kept for callers that
    /// fold that outcome into a single error code.
    IntegrityMismatch,
    /// Device failed the secondary identity probe and was put into shutdown
    Unrecoverable,
    /// The firmware loader could not provide the requested image
    FirmwareUnavailable,
}

impl<E> From<E> for Error<E> {
    fn from(error: E) -> Self {
        Self::Bus(error)
    }
}

impl<E> Error<E> {
    /// Kernel-style negative error code for this error
    ///
    /// Callers that report a single integer status for the whole boot
    /// sequence can use this instead of matching on the variant.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::Bus(_) => -5, // EIO
            Self::InvalidArgument => -22, // EINVAL
            Self::ResourceExhausted => -12, // ENOMEM
            Self::Timeout => -16, // EBUSY
            Self::IntegrityMismatch => -74, // EBADMSG
            Self::Unrecoverable => -19, // ENODEV
            Self::FirmwareUnavailable => -2, // ENOENT
        }
    }
}

