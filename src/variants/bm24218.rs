//! ROHM BM24218 OIS controller
//!
//! The BM24218 runs from RAM. Every boot opens the download window, writes
//! the program and coefficient images (when enabled) and the calibration
//! table, closes the window and then programs the servo and gyro settings.
//!
//! Registers are 8 bits wide behind 16-bit addresses.

use device_driver::RegisterInterface;
use embedded_hal::delay::DelayNs;

use crate::Error;
use crate::bus::{DataWidth, PostWriteDelay, RegisterBus, RegisterEntry};
use crate::config::OisConfig;
use crate::firmware::{FirmwareLoader, Segment};
use crate::poll::StatusPoller;
use crate::registers::bm24218::Bm24218Registers;
use crate::sequencer::BootOps;
use crate::transfer::{self, BM24218_MAX_ENTRIES, TransferPlan};
use crate::verify::Verdict;

/// Settle time after entering download mode
pub const START_DOWNLOAD_SETTLE_US: u32 = 200;

/// Settle time after leaving download mode, before the first status poll
pub const POST_DOWNLOAD_SETTLE_US: u32 = 1_000;

/// Closed-loop stabilization mode of `OIS_CTRL`
const OIS_MODE_ON: u8 = 0x02;

/// `OIS_STS` poller: 5 ms cadence, 100 polls
pub const STATUS_POLLER: StatusPoller = StatusPoller::new(0x6024, DataWidth::Byte, 5_000, 100);

/// Gyro calibration table
///
/// Fixed values for the reference module. Per-module calibration is not read
/// from OTP or EEPROM; every module gets these values.
pub const CALIBRATION_TABLE: &[RegisterEntry] = &[
    RegisterEntry::new(0x1DC0, 0x00),
    RegisterEntry::new(0x1DC1, 0x1B),
    RegisterEntry::new(0x1DC2, 0x00),
    RegisterEntry::new(0x1DC3, 0x1C),
    RegisterEntry::new(0x1DC4, 0x01),
    RegisterEntry::new(0x1DC5, 0xEE),
    RegisterEntry::new(0x1DC6, 0x01),
    RegisterEntry::new(0x1DC7, 0xD5),
    RegisterEntry::new(0x1DC8, 0xFF),
    RegisterEntry::new(0x1DC9, 0xF5),
    RegisterEntry::new(0x1DCA, 0x00),
    RegisterEntry::new(0x1DCB, 0xA4),
    RegisterEntry::new(0x1DCC, 0x00),
    RegisterEntry::new(0x1DCD, 0x26),
    RegisterEntry::new(0x1DCE, 0x00),
    RegisterEntry::new(0x1DCF, 0x25),
    RegisterEntry::new(0x1DD0, 0x08),
    RegisterEntry::new(0x1DD1, 0x55),
    RegisterEntry::new(0x1DD2, 0x08),
    RegisterEntry::new(0x1DD3, 0x09),
    RegisterEntry::new(0x1DD4, 0x00),
    RegisterEntry::new(0x1DD5, 0x74),
    RegisterEntry::new(0x1DD6, 0x25),
    RegisterEntry::new(0x1DD7, 0x0F),
    RegisterEntry::new(0x1DD8, 0x29),
    RegisterEntry::new(0x1DD9, 0x68),
    RegisterEntry::new(0x1DDA, 0xC9),
    RegisterEntry::new(0x1DDB, 0x0A),
    RegisterEntry::new(0x1DDC, 0xC9),
    RegisterEntry::new(0x1DDD, 0x0A),
    RegisterEntry::new(0x1DDE, 0x20),
    RegisterEntry::new(0x1DDF, 0x00),
    RegisterEntry::new(0x1DE0, 0x20),
    RegisterEntry::new(0x1DE1, 0x00),
    RegisterEntry::new(0x1DE2, 0x00),
    RegisterEntry::new(0x1DE3, 0x00),
    RegisterEntry::new(0x1DE4, 0x00),
    RegisterEntry::new(0x1DE5, 0x00),
    RegisterEntry::new(0x1DE6, 0x00),
    RegisterEntry::new(0x1DE7, 0x00),
];

/// Servo on and gyro setup, written one register at a time
///
/// `0x602C` selects a gyro register and `0x602D` writes it.
pub const SERVO_GYRO_TABLE: &[RegisterEntry] = &[
    RegisterEntry::new(0x6020, 0x01),
    RegisterEntry::new(0x6023, 0x02),
    RegisterEntry::new(0x602C, 0x76),
    RegisterEntry::new(0x602D, 0x00),
    RegisterEntry::new(0x602C, 0x11),
    RegisterEntry::new(0x602D, 0x01).with_delay(110),
    RegisterEntry::new(0x602C, 0x76),
    RegisterEntry::new(0x602D, 0x01),
    RegisterEntry::new(0x602C, 0x7A),
    RegisterEntry::new(0x602D, 0x02),
    RegisterEntry::new(0x602C, 0x7B),
    RegisterEntry::new(0x602D, 0x02),
    RegisterEntry::new(0x602C, 0x76),
    RegisterEntry::new(0x602D, 0x00),
    RegisterEntry::new(0x602C, 0x4C),
    RegisterEntry::new(0x602D, 0x03),
    RegisterEntry::new(0x602C, 0x13),
    RegisterEntry::new(0x602D, 0x05),
    RegisterEntry::new(0x602C, 0x14),
    RegisterEntry::new(0x602D, 0x1B),
    RegisterEntry::new(0x602C, 0x64),
    RegisterEntry::new(0x602D, 0x60),
    RegisterEntry::new(0x602C, 0x65),
    RegisterEntry::new(0x602D, 0x08),
    RegisterEntry::new(0x602C, 0x4F),
    RegisterEntry::new(0x602D, 0x63),
    RegisterEntry::new(0x602C, 0x4E),
    RegisterEntry::new(0x602D, 0x0C).with_delay(20),
    RegisterEntry::new(0x6023, 0x00),
    RegisterEntry::new(0x6021, 0x7B),
];

/// Pauses owed after specific servo table writes
///
/// The table annotations above are not honoured by the bus; only these are.
/// Writing `0x01` to `0x602D` (gyro reset) needs 110 ms. No table entry
/// writes `0x0E`, so the 20 ms rule never fires for the stock table.
pub const SERVO_GYRO_DELAYS: &[PostWriteDelay] = &[
    PostWriteDelay::new(0x602D, 0x01, 110_000),
    PostWriteDelay::new(0x602D, 0x0E, 20_000),
];

/// BM24218 driver
pub struct Bm24218<I> {
    device: Bm24218Registers<I>,
    config: OisConfig,
}

impl<I> Bm24218<I>
where
    I: RegisterInterface<AddressType = u16>,
{
    /// Create a driver for the module described by `config`
    pub fn new(interface: I, config: OisConfig) -> Self {
        Self {
            device: Bm24218Registers::new(interface),
            config,
        }
    }

    /// Read the checksum the controller computed over the downloaded images
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_firmware_checksum(&mut self) -> Result<u32, Error<I::Error>> {
        let reg = self.device.firmware_checksum().read()?;
        Ok(reg.checksum())
    }

    /// Consume the driver and return the underlying interface
    pub fn release(self) -> I {
        self.device.interface
    }

    fn segment_plan(&self, segment: Segment) -> TransferPlan {
        let base = match segment {
            Segment::Program => self.config.opcodes.prog,
            Segment::Coefficient => self.config.opcodes.coeff,
        };
        TransferPlan::new(base, DataWidth::Byte, BM24218_MAX_ENTRIES).with_mode(self.config.transfer_mode)
    }

    fn download_segment<L>(&mut self, loader: &mut L, segment: Segment) -> Result<usize, Error<I::Error>>
    where
        L: FirmwareLoader,
    {
        let name = segment.file_name(&self.config.module_name);
        let Ok(blob) = loader.load(&name) else {
            #[cfg(feature = "defmt")]
            defmt::error!("failed to locate {=str}", name.as_str());
            return Err(Error::FirmwareUnavailable);
        };

        let plan = self.segment_plan(segment);
        let written = transfer::write_segment(&mut self.device.interface, &plan, blob.as_ref())?;

        #[cfg(feature = "defmt")]
        defmt::debug!("{=str}: {} bytes at 0x{:04X}", name.as_str(), written, plan.base);
        Ok(written)
    }
}

impl<I> BootOps for Bm24218<I>
where
    I: RegisterInterface<AddressType = u16>,
{
    type BusError = I::Error;

    const POST_DOWNLOAD_SETTLE_US: u32 = POST_DOWNLOAD_SETTLE_US;

    fn config(&self) -> &OisConfig {
        &self.config
    }

    fn start_download<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I::Error>> {
        self.device.download_start().write(|w| {
            w.set_start(0x00);
        })?;
        delay.delay_us(START_DOWNLOAD_SETTLE_US);
        Ok(())
    }

    fn download_firmware<L, D>(&mut self, loader: &mut L, _delay: &mut D) -> Result<Verdict, Error<I::Error>>
    where
        L: FirmwareLoader,
        D: DelayNs,
    {
        // Each blob is dropped before the next one is requested
        self.download_segment(loader, Segment::Program)?;
        self.download_segment(loader, Segment::Coefficient)?;

        let checksum = self.read_firmware_checksum()?;
        #[cfg(feature = "defmt")]
        defmt::info!("OIS FW checksum: 0x{:08X}", checksum);

        match self.config.expected_checksum {
            Some(expected) if expected != checksum => {
                #[cfg(feature = "defmt")]
                defmt::error!("OIS FW checksum mismatch: expected 0x{:08X}", expected);
                Ok(Verdict::NeedsDownload)
            }
            _ => Ok(Verdict::UpToDate),
        }
    }

    fn write_calibration(&mut self) -> Result<(), Error<I::Error>> {
        #[cfg(feature = "defmt")]
        defmt::debug!("calibration data write");
        self.device
            .interface
            .write_burst(CALIBRATION_TABLE, DataWidth::Byte)?;
        Ok(())
    }

    fn complete_download<D: DelayNs>(&mut self, _delay: &mut D) -> Result<(), Error<I::Error>> {
        self.device.download_complete().write(|w| {
            w.set_complete(0x00);
        })?;
        Ok(())
    }

    fn poll_status<D: DelayNs>(&mut self, delay: &mut D) -> Result<u32, Error<I::Error>> {
        STATUS_POLLER.wait_ready(&mut self.device.interface, delay)
    }

    fn program_servo_gyro<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I::Error>> {
        self.device.interface.write_table(
            SERVO_GYRO_TABLE,
            DataWidth::Byte,
            SERVO_GYRO_DELAYS,
            delay,
        )?;
        Ok(())
    }

    fn enable_ois(&mut self) -> Result<(), Error<I::Error>> {
        self.device.ois_control().write(|w| {
            w.set_mode(OIS_MODE_ON);
        })?;
        Ok(())
    }
}
