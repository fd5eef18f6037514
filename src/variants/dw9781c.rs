//! Dongwoon DW9781C OIS controller
//!
//! The DW9781C keeps its firmware in on-chip MTP. A boot only rewrites it when
//! the controller fails one of three checks against the image:
//!
//! 1. chip ID (`0x7000` reads `0x9781` while valid firmware runs)
//! 2. MTP checksum (computed on request, compared with the image trailer)
//! 3. firmware version (low byte of `0x7001` against the image trailer)
//!
//! A rewrite erases the program sectors, writes the image through the
//! `0x8000` window and checks the checksum again. If that final check fails
//! the checksum flag page is erased, so the next boot starts a fresh download,
//! and the chip is powered down. The boot itself goes on and reports the
//! rejected image as [`Verdict::NeedsDownload`].
//!
//! All registers are 16 bits wide.

use device_driver::RegisterInterface;
use embedded_hal::delay::DelayNs;

use crate::Error;
use crate::bus::{DataWidth, PostWriteDelay, RegisterBus, RegisterEntry};
use crate::config::OisConfig;
use crate::firmware::{FirmwareContext, FirmwareLoader, Segment};
use crate::poll::StatusPoller;
use crate::registers::dw9781c::Dw9781cRegisters;
use crate::sequencer::BootOps;
use crate::transfer::{self, DW9781C_MAX_ENTRIES, TransferPlan};
use crate::verify::{ChecksumProbe, Identity, IdentityProbe, Verdict};

/// `CHECKSUM_FLAG` value after a verified firmware write
pub const CHECKSUM_FLAG_OK: u16 = 0xCC33;

const CHIP_SHUTDOWN: u16 = 0x0000;
const CHIP_STANDBY: u16 = 0x0001;

const OIS_MODE_ON: u16 = 0x0000;

/// Logic reset settle time
const RESET_SETTLE_US: u32 = 4_000;
/// Gyro start-up time after the DSP is switched on
const DSP_START_US: u32 = 25_000;
/// Power state settle time during recovery
const POWER_SETTLE_US: u32 = 100_000;

const USER_PROTECTION_RELEASE: RegisterEntry = RegisterEntry::new(0xEBF1, 0x56FA);

/// Write sequence that unlocks all protected registers
pub const PROTECTION_RELEASE: &[RegisterEntry] = &[
    RegisterEntry::new(0xFAFA, 0x98AC),
    RegisterEntry::new(0xF053, 0x70BD),
];

/// Pauses after each protection release write
pub const PROTECTION_RELEASE_DELAYS: &[PostWriteDelay] = &[
    PostWriteDelay::new(0xFAFA, 0x98AC, 1_000),
    PostWriteDelay::new(0xF053, 0x70BD, 1_000),
];

/// MTP erase setup (I2C level adjust)
pub const MTP_ERASE_SETUP: &[RegisterEntry] = &[
    RegisterEntry::new(0xD005, 0x0001),
    RegisterEntry::new(0xDD03, 0x0002),
    RegisterEntry::new(0xDD04, 0x0002),
];

/// Erase of the five 4 KiB program sectors
pub const MTP_SECTOR_ERASE: &[RegisterEntry] = &[
    RegisterEntry::new(0xDE03, 0x0000),
    RegisterEntry::new(0xDE04, 0x0002),
    RegisterEntry::new(0xDE03, 0x0008),
    RegisterEntry::new(0xDE04, 0x0002),
    RegisterEntry::new(0xDE03, 0x0010),
    RegisterEntry::new(0xDE04, 0x0002),
    RegisterEntry::new(0xDE03, 0x0018),
    RegisterEntry::new(0xDE04, 0x0002),
    RegisterEntry::new(0xDE03, 0x0020),
    RegisterEntry::new(0xDE04, 0x0002),
];

/// Erase of the 512 byte page holding the checksum flag
pub const CHECKSUM_FLAG_ERASE: &[RegisterEntry] = &[
    RegisterEntry::new(0xDE03, 0x0027),
    RegisterEntry::new(0xDE04, 0x0008),
];

/// Pauses after sector and page erase commands
pub const MTP_ERASE_DELAYS: &[PostWriteDelay] = &[
    PostWriteDelay::new(0xDE04, 0x0002, 10_000),
    PostWriteDelay::new(0xDE04, 0x0008, 10_000),
];

/// Servo on
pub const SERVO_GYRO_TABLE: &[RegisterEntry] = &[RegisterEntry::new(0x7015, 0x0001)];

/// MTP checksum command
pub const CHECKSUM_PROBE: ChecksumProbe = ChecksumProbe {
    trigger: &[RegisterEntry::new(0x7011, 0x2000), RegisterEntry::new(0x7010, 0x8000)],
    settle_us: 10_000,
    result: 0x7005,
    width: DataWidth::Word,
};

/// Chip ID check with the blank-MTP fallback
pub const IDENTITY_PROBE: IdentityProbe = IdentityProbe {
    primary: 0x7000,
    expected: 0x9781,
    release: PROTECTION_RELEASE,
    release_delays: PROTECTION_RELEASE_DELAYS,
    secondary: 0xD060,
    blank: 0x0020,
    shutdown: RegisterEntry::new(0xD000, 0x0000),
    width: DataWidth::Word,
};

/// Chip ID poller: reads non-zero once the DSP runs; 5 ms cadence, 20 polls
pub const STATUS_POLLER: StatusPoller = StatusPoller::new(0x7000, DataWidth::Word, 5_000, 20);

/// Firmware identification read from the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareInfo {
    /// Programmed firmware version
    pub version: u16,
    /// Programmed firmware date code
    pub date: u16,
    /// Firmware type code
    pub fw_type: u16,
}

/// DW9781C driver
pub struct Dw9781c<I> {
    device: Dw9781cRegisters<I>,
    config: OisConfig,
    download_incomplete: bool,
}

impl<I> Dw9781c<I>
where
    I: RegisterInterface<AddressType = u16>,
{
    /// Create a driver for the module described by `config`
    pub fn new(interface: I, config: OisConfig) -> Self {
        Self {
            device: Dw9781cRegisters::new(interface),
            config,
            download_incomplete: false,
        }
    }

    /// Consume the driver and return the underlying interface
    pub fn release(self) -> I {
        self.device.interface
    }

    /// Whether the last ready check found no valid checksum flag
    ///
    /// Set when an earlier firmware download was interrupted or the MTP is
    /// blank.
    pub const fn previous_download_incomplete(&self) -> bool {
        self.download_incomplete
    }

    /// Reset the controller and start the DSP
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn ois_reset<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I::Error>> {
        #[cfg(feature = "defmt")]
        defmt::debug!("ois reset");
        self.device.logic_reset().write(|w| {
            w.set_reset(true);
        })?;
        delay.delay_us(RESET_SETTLE_US);
        self.device.dsp_control().write(|w| {
            w.set_dsp_on(true);
        })?;
        // Servo comes up on by default once the gyro has started
        delay.delay_us(DSP_START_US);
        self.device.interface.write_value(
            USER_PROTECTION_RELEASE.address,
            USER_PROTECTION_RELEASE.data,
            DataWidth::Word,
        )?;
        Ok(())
    }

    /// Check the MTP checksum flag and restart the controller
    ///
    /// With a good flag the DSP is started; otherwise the logic is only reset
    /// and the incomplete download is recorded, see
    /// [`previous_download_incomplete`](Self::previous_download_incomplete).
    /// Neither outcome is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn ready_check<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I::Error>> {
        self.dsp_off()?;
        for entry in PROTECTION_RELEASE {
            self.device
                .interface
                .write_value(entry.address, entry.data, DataWidth::Word)?;
        }

        let flag = self.device.checksum_flag().read()?.flag();
        #[cfg(feature = "defmt")]
        defmt::debug!("checksum flag: 0x{:04X}", flag);

        self.download_incomplete = flag != CHECKSUM_FLAG_OK;
        if self.download_incomplete {
            self.device.logic_reset().write(|w| {
                w.set_reset(true);
            })?;
            delay.delay_us(RESET_SETTLE_US);
            #[cfg(feature = "defmt")]
            defmt::warn!("previous firmware download incomplete");
        } else {
            self.ois_reset(delay)?;
        }
        Ok(())
    }

    /// Read the programmed firmware version, date and type
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_firmware_info(&mut self) -> Result<FirmwareInfo, Error<I::Error>> {
        let version = self.device.fw_version().read()?.version();
        let date = self.device.fw_date().read()?.date();
        let fw_type = self.device.fw_type().read()?.fw_type();
        Ok(FirmwareInfo {
            version,
            date,
            fw_type,
        })
    }

    /// Decide whether the MTP must be rewritten with the image in `context`
    ///
    /// Expects [`ready_check`](Self::ready_check) to have run.
    ///
    /// # Errors
    ///
    /// - [`Error::Unrecoverable`] if the controller fails both identity
    ///   checks. It has been put into shutdown.
    /// - [`Error::Bus`] if communication with the device fails.
    pub fn check_download<D: DelayNs>(
        &mut self,
        context: &FirmwareContext,
        delay: &mut D,
    ) -> Result<Verdict, Error<I::Error>> {
        let info = self.read_firmware_info()?;
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "programmed firmware: version 0x{:04X}, date 0x{:04X}, type 0x{:04X}",
            info.version,
            info.date,
            info.fw_type
        );

        match IDENTITY_PROBE.identify(&mut self.device.interface, delay)? {
            Identity::Blank => Ok(Verdict::NeedsDownload),
            Identity::Verified => {
                let checksum = CHECKSUM_PROBE.verify(
                    &mut self.device.interface,
                    delay,
                    u32::from(context.checksum),
                )?;
                let version = Verdict::from_match(context.version_matches(info.version));
                #[cfg(feature = "defmt")]
                defmt::debug!(
                    "firmware version: device 0x{:04X}, image 0x{:04X}",
                    info.version,
                    context.version
                );
                Ok(checksum.or(version))
            }
        }
    }

    /// Unlock the MTP and erase the program sectors
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn prepare_download<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I::Error>> {
        self.dsp_off()?;
        self.release_protection(delay)?;

        #[cfg(feature = "defmt")]
        defmt::debug!("erasing firmware flash");
        let bus = &mut self.device.interface;
        bus.write_table(MTP_ERASE_SETUP, DataWidth::Word, &[], delay)?;
        bus.write_table(MTP_SECTOR_ERASE, DataWidth::Word, MTP_ERASE_DELAYS, delay)?;
        Ok(())
    }

    /// Write the program image into the MTP window
    ///
    /// # Errors
    ///
    /// Returns the transfer error; the MTP is left partially written.
    pub fn write_firmware(&mut self, image: &[u8]) -> Result<usize, Error<I::Error>> {
        let plan = TransferPlan::new(self.config.opcodes.prog, DataWidth::Word, DW9781C_MAX_ENTRIES)
            .with_mode(self.config.transfer_mode);
        transfer::write_segment(&mut self.device.interface, &plan, image)
    }

    /// Verify the freshly written MTP against `context`
    ///
    /// On a checksum mismatch the checksum flag page is erased and the chip is
    /// put into shutdown, so the next boot downloads again. The mismatch is
    /// returned as [`Verdict::NeedsDownload`].
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn verify_download<D: DelayNs>(
        &mut self,
        context: &FirmwareContext,
        delay: &mut D,
    ) -> Result<Verdict, Error<I::Error>> {
        self.ready_check(delay)?;
        let verdict = CHECKSUM_PROBE.verify(&mut self.device.interface, delay, u32::from(context.checksum))?;
        if !verdict.needs_download() {
            #[cfg(feature = "defmt")]
            defmt::info!("firmware download success, version 0x{:04X}", context.version);
            return Ok(verdict);
        }

        #[cfg(feature = "defmt")]
        defmt::error!("firmware download error, entering shutdown");
        self.set_chip_state(CHIP_SHUTDOWN)?;
        delay.delay_us(POWER_SETTLE_US);
        self.set_chip_state(CHIP_STANDBY)?;
        delay.delay_us(POWER_SETTLE_US);
        self.release_protection(delay)?;
        self.device.interface.write_table(
            CHECKSUM_FLAG_ERASE,
            DataWidth::Word,
            MTP_ERASE_DELAYS,
            delay,
        )?;
        self.set_chip_state(CHIP_SHUTDOWN)?;
        Ok(verdict)
    }

    fn dsp_off(&mut self) -> Result<(), Error<I::Error>> {
        self.device.dsp_control().write(|w| {
            w.set_dsp_on(false);
        })?;
        Ok(())
    }

    fn release_protection<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I::Error>> {
        self.device.interface.write_table(
            PROTECTION_RELEASE,
            DataWidth::Word,
            PROTECTION_RELEASE_DELAYS,
            delay,
        )?;
        Ok(())
    }

    fn set_chip_state(&mut self, state: u16) -> Result<(), Error<I::Error>> {
        self.device.chip_enable().write(|w| {
            w.set_state(state);
        })?;
        Ok(())
    }
}

impl<I> BootOps for Dw9781c<I>
where
    I: RegisterInterface<AddressType = u16>,
{
    type BusError = I::Error;

    fn config(&self) -> &OisConfig {
        &self.config
    }

    fn start_download<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I::Error>> {
        self.ready_check(delay)
    }

    fn download_firmware<L, D>(&mut self, loader: &mut L, delay: &mut D) -> Result<Verdict, Error<I::Error>>
    where
        L: FirmwareLoader,
        D: DelayNs,
    {
        let name = Segment::Program.file_name(&self.config.module_name);
        let Ok(blob) = loader.load(&name) else {
            #[cfg(feature = "defmt")]
            defmt::error!("failed to locate {=str}", name.as_str());
            return Err(Error::FirmwareUnavailable);
        };
        let image = blob.as_ref();

        let Some(context) = FirmwareContext::parse(image) else {
            #[cfg(feature = "defmt")]
            defmt::error!("firmware image too short: {} bytes", image.len());
            return Err(Error::InvalidArgument);
        };

        if !self.check_download(&context, delay)?.needs_download() {
            #[cfg(feature = "defmt")]
            defmt::info!("firmware up to date, skipping download");
            return Ok(Verdict::UpToDate);
        }

        #[cfg(feature = "defmt")]
        defmt::info!(
            "starting flash download: size {}, version 0x{:04X}",
            context.size,
            context.version
        );
        self.prepare_download(delay)?;
        self.write_firmware(image)?;
        self.verify_download(&context, delay)
    }

    fn write_calibration(&mut self) -> Result<(), Error<I::Error>> {
        // Calibration lives in MTP with the firmware
        Ok(())
    }

    fn complete_download<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I::Error>> {
        self.ois_reset(delay)
    }

    fn poll_status<D: DelayNs>(&mut self, delay: &mut D) -> Result<u32, Error<I::Error>> {
        STATUS_POLLER.wait_ready(&mut self.device.interface, delay)
    }

    fn program_servo_gyro<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<I::Error>> {
        self.device
            .interface
            .write_table(SERVO_GYRO_TABLE, DataWidth::Word, &[], delay)?;
        Ok(())
    }

    fn enable_ois(&mut self) -> Result<(), Error<I::Error>> {
        self.device.ois_control().write(|w| {
            w.set_mode(OIS_MODE_ON);
        })?;
        Ok(())
    }
}
