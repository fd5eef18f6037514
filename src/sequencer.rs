//! Boot sequence state machine
//!
//! Both controllers boot through the same stages; only what each stage writes
//! differs. The stages are the methods of [`BootOps`], implemented once per
//! variant, and [`BootSequencer`] walks them in order:
//!
//! ```text
//! Idle -> StartDownload -> [FirmwareDownload] -> [Calibration]
//!      -> CompleteDownload -> PostDownloadPoll -> ServoProgramGyro
//!      -> PostDownloadPoll2 -> EnableOis -> Ready
//! ```
//!
//! Bracketed stages run only when enabled in the [`OisConfig`]. Any failing
//! stage moves the sequencer to [`BootState::Fault`] and its error is returned
//! unchanged. The one exception is `CompleteDownload`, whose failure is only
//! logged unless [`OisConfig::strict_complete_download`] is set.
//!
//! A firmware image the controller does not accept (checksum mismatch after
//! the download) is not a failure. The boot carries on and the outcome is kept
//! in [`BootSequencer::needs_redownload`] for the caller to act on.

use embedded_hal::delay::DelayNs;

use crate::Error;
use crate::config::OisConfig;
use crate::firmware::FirmwareLoader;
use crate::verify::Verdict;

/// Boot sequence stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootState {
    /// Nothing run yet
    Idle,
    /// Entering download mode
    StartDownload,
    /// Writing firmware segments
    FirmwareDownload,
    /// Writing the calibration table
    Calibration,
    /// Leaving download mode
    CompleteDownload,
    /// Waiting for the controller after download
    PostDownloadPoll,
    /// Programming servo and gyro settings
    ServoProgramGyro,
    /// Waiting for the controller after servo setup
    PostDownloadPoll2,
    /// Switching stabilization on
    EnableOis,
    /// Boot finished
    Ready,
    /// A stage failed; see [`BootSequencer::failed_stage`]
    Fault,
}

/// Per-variant implementation of the boot stages
pub trait BootOps {
    /// Bus error of the underlying interface
    type BusError;

    /// Pause between leaving download mode and the first status poll, in microseconds
    const POST_DOWNLOAD_SETTLE_US: u32 = 0;

    /// Module configuration
    fn config(&self) -> &OisConfig;

    /// Enter download mode
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the controller cannot be reached.
    fn start_download<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<Self::BusError>>;

    /// Load and write the firmware segments
    ///
    /// Returns [`Verdict::NeedsDownload`] when the controller does not report
    /// the image as intact afterwards.
    ///
    /// # Errors
    ///
    /// Returns the first loader or transfer error.
    fn download_firmware<L, D>(&mut self, loader: &mut L, delay: &mut D) -> Result<Verdict, Error<Self::BusError>>
    where
        L: FirmwareLoader,
        D: DelayNs;

    /// Write the calibration table
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the burst fails.
    fn write_calibration(&mut self) -> Result<(), Error<Self::BusError>>;

    /// Leave download mode
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the write fails.
    fn complete_download<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<Self::BusError>>;

    /// Wait for the status register to report ready
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] or [`Error::Bus`] from the poller.
    fn poll_status<D: DelayNs>(&mut self, delay: &mut D) -> Result<u32, Error<Self::BusError>>;

    /// Write the servo and gyro setup table
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if a write fails.
    fn program_servo_gyro<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<Self::BusError>>;

    /// Switch stabilization on
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if the write fails.
    fn enable_ois(&mut self) -> Result<(), Error<Self::BusError>>;
}

/// Drives a [`BootOps`] implementation through the boot stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootSequencer {
    state: BootState,
    failed_stage: Option<BootState>,
    firmware_verdict: Verdict,
}

impl Default for BootSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl BootSequencer {
    /// Create an idle sequencer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: BootState::Idle,
            failed_stage: None,
            firmware_verdict: Verdict::UpToDate,
        }
    }

    /// Current stage
    #[must_use]
    pub const fn state(&self) -> BootState {
        self.state
    }

    /// Stage that moved the sequencer to [`BootState::Fault`]
    #[must_use]
    pub const fn failed_stage(&self) -> Option<BootState> {
        self.failed_stage
    }

    /// Whether the last boot left the controller with firmware it did not accept
    ///
    /// Always `false` when the firmware stage is disabled.
    #[must_use]
    pub const fn needs_redownload(&self) -> bool {
        self.firmware_verdict.needs_download()
    }

    /// Run the full boot sequence
    ///
    /// The sequencer can be run again after a fault; it restarts from
    /// [`BootState::Idle`].
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing stage.
    pub fn run<O, L, D>(&mut self, ops: &mut O, loader: &mut L, delay: &mut D) -> Result<(), Error<O::BusError>>
    where
        O: BootOps,
        L: FirmwareLoader,
        D: DelayNs,
    {
        self.state = BootState::Idle;
        self.failed_stage = None;
        self.firmware_verdict = Verdict::UpToDate;

        let firmware_enabled = ops.config().firmware_enabled;
        let calibration_enabled = ops.config().calibration_enabled;
        let strict_complete = ops.config().strict_complete_download;

        self.enter(BootState::StartDownload, ops.start_download(delay))?;

        if firmware_enabled {
            self.firmware_verdict = self.enter(BootState::FirmwareDownload, ops.download_firmware(loader, delay))?;
            if self.firmware_verdict.needs_download() {
                #[cfg(feature = "defmt")]
                defmt::warn!("firmware not accepted by the controller, continuing boot");
            }
        }

        if calibration_enabled {
            self.enter(BootState::Calibration, ops.write_calibration())?;
        }

        self.state = BootState::CompleteDownload;
        match ops.complete_download(delay) {
            Ok(()) => {}
            Err(e) if strict_complete => return Err(self.fail(e)),
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("leaving download mode failed, continuing");
            }
        }

        if O::POST_DOWNLOAD_SETTLE_US > 0 {
            delay.delay_us(O::POST_DOWNLOAD_SETTLE_US);
        }
        self.enter(BootState::PostDownloadPoll, ops.poll_status(delay))?;
        self.enter(BootState::ServoProgramGyro, ops.program_servo_gyro(delay))?;
        self.enter(BootState::PostDownloadPoll2, ops.poll_status(delay))?;
        self.enter(BootState::EnableOis, ops.enable_ois())?;

        self.state = BootState::Ready;
        #[cfg(feature = "defmt")]
        defmt::info!("OIS boot complete");
        Ok(())
    }

    fn enter<T, E>(&mut self, state: BootState, result: Result<T, Error<E>>) -> Result<T, Error<E>> {
        self.state = state;
        result.map_err(|e| self.fail(e))
    }

    fn fail<E>(&mut self, error: Error<E>) -> Error<E> {
        #[cfg(feature = "defmt")]
        defmt::error!("boot failed in {} (code {})", self.state, error.code());
        self.failed_stage = Some(self.state);
        self.state = BootState::Fault;
        error
    }
}
