//! High-level driver API for an OIS module
//!
//! [`OisDevice`] is the per-module device context: the bus interface, the
//! module configuration and the boot state. It picks the controller driver
//! from [`OisConfig::variant`] and runs the boot sequence on it.

use device_driver::RegisterInterface;
use embedded_hal::delay::DelayNs;

use crate::config::OisConfig;
use crate::firmware::FirmwareLoader;
use crate::sequencer::{BootOps, BootSequencer, BootState};
use crate::variants::{Bm24218, Dw9781c};
use crate::{Error, Variant};

enum Driver<I> {
    Bm24218(Bm24218<I>),
    Dw9781c(Dw9781c<I>),
}

/// Main driver for an OIS module
pub struct OisDevice<I> {
    driver: Driver<I>,
    sequencer: BootSequencer,
}

impl<I> OisDevice<I>
where
    I: RegisterInterface<AddressType = u16>,
{
    /// Create a device for the module described by `config`
    ///
    /// No bus traffic happens until [`run_boot_sequence`](Self::run_boot_sequence).
    pub fn new(interface: I, config: OisConfig) -> Self {
        let driver = match config.variant {
            Variant::Bm24218 => Driver::Bm24218(Bm24218::new(interface, config)),
            Variant::Dw9781c => Driver::Dw9781c(Dw9781c::new(interface, config)),
        };
        Self {
            driver,
            sequencer: BootSequencer::new(),
        }
    }

    /// Module configuration
    pub fn config(&self) -> &OisConfig {
        match &self.driver {
            Driver::Bm24218(driver) => driver.config(),
            Driver::Dw9781c(driver) => driver.config(),
        }
    }

    /// Controller variant
    pub fn variant(&self) -> Variant {
        self.config().variant
    }

    /// Current boot stage
    pub const fn state(&self) -> BootState {
        self.sequencer.state()
    }

    /// Stage that failed during the last boot, if any
    pub const fn failed_stage(&self) -> Option<BootState> {
        self.sequencer.failed_stage()
    }

    /// Whether the last boot left firmware the controller did not accept
    ///
    /// The boot itself still succeeds in that case; the next boot should
    /// download again.
    pub const fn needs_redownload(&self) -> bool {
        self.sequencer.needs_redownload()
    }

    /// Boot the controller
    ///
    /// Runs the full boot sequence for the configured variant: optional
    /// firmware download and calibration, download completion, servo and gyro
    /// setup with the status polls around it, and finally OIS enable.
    ///
    /// # Arguments
    ///
    /// * `loader` - Source of the `<module>.prog` / `<module>.coeff` images
    /// * `delay` - Delay provider implementing `embedded_hal::delay::DelayNs`
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing stage. [`Error::code`] gives the
    /// matching negative error number. A checksum mismatch after a download is
    /// not an error; see [`needs_redownload`](Self::needs_redownload).
    ///
    /// # Example
    ///
    /// ```ignore
    /// let config = OisConfig::bm24218("bm24218").with_firmware(true);
    /// let mut ois = OisDevice::new(I2cInterface::new(i2c, 0x3E), config);
    /// ois.run_boot_sequence(&mut loader, &mut delay)?;
    /// ```
    pub fn run_boot_sequence<L, D>(&mut self, loader: &mut L, delay: &mut D) -> Result<(), Error<I::Error>>
    where
        L: FirmwareLoader,
        D: DelayNs,
    {
        #[cfg(feature = "defmt")]
        defmt::info!("booting {} module {=str}", self.variant(), self.config().module_name.as_str());

        match &mut self.driver {
            Driver::Bm24218(driver) => self.sequencer.run(driver, loader, delay),
            Driver::Dw9781c(driver) => self.sequencer.run(driver, loader, delay),
        }
    }

    /// Consume the driver and return the underlying interface
    pub fn release(self) -> I {
        match self.driver {
            Driver::Bm24218(driver) => driver.release(),
            Driver::Dw9781c(driver) => driver.release(),
        }
    }
}
