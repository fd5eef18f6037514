//! Checksum and identity verification
//!
//! Verification never fails a boot by itself. A checksum, version or identity
//! mismatch becomes a [`Verdict`] that the boot sequence folds into its
//! "download needed" decision. Only a bus error, or an identity probe that
//! shows the part is not a controller this driver can recover, is an error.

use crate::Error;
use crate::bus::{DataWidth, PostWriteDelay, RegisterBus, RegisterEntry};

/// Outcome of a verification step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Verdict {
    /// Device content matches the image
    UpToDate,
    /// Device content must be rewritten
    NeedsDownload,
}

impl Verdict {
    /// Verdict of a comparison
    #[must_use]
    pub const fn from_match(matches: bool) -> Self {
        if matches { Self::UpToDate } else { Self::NeedsDownload }
    }

    /// Whether a download is required
    #[must_use]
    pub const fn needs_download(self) -> bool {
        matches!(self, Self::NeedsDownload)
    }

    /// Combine two verdicts; a download is needed if either needs one
    #[must_use]
    pub const fn or(self, other: Self) -> Self {
        Self::from_match(!self.needs_download() && !other.needs_download())
    }
}

/// How to make a controller compute and report its firmware checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumProbe {
    /// Command writes that start the checksum calculation (may be empty)
    pub trigger: &'static [RegisterEntry],
    /// Wait between the trigger and the read, in microseconds
    pub settle_us: u32,
    /// Register holding the result
    pub result: u16,
    /// Width of the trigger and result registers
    pub width: DataWidth,
}

impl ChecksumProbe {
    /// Trigger the calculation and read the result
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if any write or the read fails.
    pub fn read_checksum<I, D>(&self, bus: &mut I, delay: &mut D) -> Result<u32, Error<I::Error>>
    where
        I: RegisterBus,
        D: embedded_hal::delay::DelayNs,
    {
        for entry in self.trigger {
            bus.write_value(entry.address, entry.data, self.width)?;
        }
        if self.settle_us > 0 {
            delay.delay_us(self.settle_us);
        }
        Ok(bus.read_value(self.result, self.width)?)
    }

    /// Compare the device checksum with `expected`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the probe cannot be run.
    pub fn verify<I, D>(&self, bus: &mut I, delay: &mut D, expected: u32) -> Result<Verdict, Error<I::Error>>
    where
        I: RegisterBus,
        D: embedded_hal::delay::DelayNs,
    {
        let actual = self.read_checksum(bus, delay)?;
        let verdict = Verdict::from_match(actual == expected);

        #[cfg(feature = "defmt")]
        if verdict.needs_download() {
            defmt::warn!("checksum mismatch: expected 0x{:04X}, device 0x{:04X}", expected, actual);
        } else {
            defmt::debug!("checksum 0x{:04X} ok", actual);
        }

        Ok(verdict)
    }
}

/// Result of a successful identity probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Identity {
    /// Primary ID matched; the controller runs valid firmware
    Verified,
    /// Primary ID missing but the secondary ID shows an erased controller
    Blank,
}

/// Two-stage chip identification
///
/// The primary ID register is served by firmware, so it reads wrong on a
/// controller whose MTP is blank. The secondary ID comes from hardware and is
/// only reachable after the `release` sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityProbe {
    /// Firmware-served ID register
    pub primary: u16,
    /// Expected primary ID
    pub expected: u32,
    /// Writes (and their pauses) that expose the secondary ID
    pub release: &'static [RegisterEntry],
    /// Pauses after `release` writes
    pub release_delays: &'static [PostWriteDelay],
    /// Hardware ID register
    pub secondary: u16,
    /// Secondary ID of a blank but healthy controller
    pub blank: u32,
    /// Write that parks the controller when identification fails
    pub shutdown: RegisterEntry,
    /// Register width
    pub width: DataWidth,
}

impl IdentityProbe {
    /// Identify the controller
    ///
    /// # Errors
    ///
    /// - [`Error::Bus`] if any access fails.
    /// - [`Error::Unrecoverable`] if neither ID matches. The shutdown write has
    ///   been issued and no further access is made.
    pub fn identify<I, D>(&self, bus: &mut I, delay: &mut D) -> Result<Identity, Error<I::Error>>
    where
        I: RegisterBus,
        D: embedded_hal::delay::DelayNs,
    {
        let primary = bus.read_value(self.primary, self.width)?;
        #[cfg(feature = "defmt")]
        defmt::debug!("primary chip id 0x{:04X}", primary);
        if primary == self.expected {
            return Ok(Identity::Verified);
        }

        bus.write_table(self.release, self.width, self.release_delays, delay)?;
        let secondary = bus.read_value(self.secondary, self.width)?;
        if secondary == self.blank {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "chip id 0x{:04X} invalid, secondary id 0x{:04X} reports blank MTP",
                primary,
                secondary
            );
            return Ok(Identity::Blank);
        }

        #[cfg(feature = "defmt")]
        defmt::error!(
            "secondary chip id 0x{:04X} check failed, entering shutdown",
            secondary
        );
        bus.write_value(self.shutdown.address, self.shutdown.data, self.width)?;
        Err(Error::Unrecoverable)
    }
}
