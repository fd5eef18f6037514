//! Status polling
//!
//! Controllers signal completion of a long command (download exit, servo
//! setup) by a non-zero value in a status register. [`StatusPoller`] sleeps a
//! fixed interval, reads the register and repeats until the value is non-zero
//! or the poll budget runs out.
//!
//! A failed read is not counted against the budget: it aborts the poll at once
//! with the bus error, since a bus fault will not clear itself by waiting.

use crate::Error;
use crate::bus::{DataWidth, RegisterBus};

/// Fixed-cadence status register poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusPoller {
    /// Status register
    pub register: u16,
    /// Status register width
    pub width: DataWidth,
    /// Sleep before each read, in microseconds
    pub interval_us: u32,
    /// Maximum number of reads
    pub max_polls: u32,
}

impl StatusPoller {
    /// Create a poller
    #[must_use]
    pub const fn new(register: u16, width: DataWidth, interval_us: u32, max_polls: u32) -> Self {
        Self {
            register,
            width,
            interval_us,
            max_polls,
        }
    }

    /// Upper bound on the time spent sleeping, in microseconds
    #[must_use]
    pub const fn budget_us(&self) -> u64 {
        self.interval_us as u64 * self.max_polls as u64
    }

    /// Poll until the status register reads non-zero
    ///
    /// Returns the first non-zero status value. No read is issued after it.
    ///
    /// # Errors
    ///
    /// - [`Error::Bus`] if a read fails; polling stops immediately.
    /// - [`Error::Timeout`] if `max_polls` reads all returned zero.
    pub fn wait_ready<I, D>(&self, bus: &mut I, delay: &mut D) -> Result<u32, Error<I::Error>>
    where
        I: RegisterBus,
        D: embedded_hal::delay::DelayNs,
    {
        for _attempt in 0..self.max_polls {
            delay.delay_us(self.interval_us);
            let status = bus.read_value(self.register, self.width)?;
            if status != 0 {
                #[cfg(feature = "defmt")]
                defmt::debug!(
                    "status 0x{:04X} ready (0x{:X}) after {} polls",
                    self.register,
                    status,
                    _attempt + 1
                );
                return Ok(status);
            }
        }

        #[cfg(feature = "defmt")]
        defmt::error!(
            "status 0x{:04X} timeout after {} polls",
            self.register,
            self.max_polls
        );
        Err(Error::Timeout)
    }
}
