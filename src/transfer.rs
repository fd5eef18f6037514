//! Firmware transfer engine
//!
//! Writes a firmware segment into the controller as a sequence of burst
//! transactions. Each element of the segment (a byte, or a 16-bit word for
//! word-wide controllers) becomes one [`RegisterEntry`]; entries are grouped
//! into transactions of at most [`TransferPlan::max_entries`].
//!
//! ## Address modes
//!
//! - [`AddressMode::Increment`]: element `i` is written to `base + i`. Used
//!   for RAM windows where every byte has its own register address.
//! - [`AddressMode::Fixed`]: every element is written to `base`. Used for
//!   data ports that advance an internal pointer on each write.
//!
//! A failing transaction aborts the transfer at once. Earlier transactions are
//! not undone; the controller keeps whatever was written before the failure.

use alloc::vec::Vec;

use crate::Error;
use crate::bus::{DataWidth, RegisterBus, RegisterEntry};

/// Largest number of entries the BM24218 accepts in one continuous write
pub const BM24218_MAX_ENTRIES: usize = 200;

/// Largest number of 16-bit entries the DW9781C accepts in one continuous write
pub const DW9781C_MAX_ENTRIES: usize = 64;

/// How firmware elements map onto register addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressMode {
    /// One register per element, starting at the base address
    Increment,
    /// Every element goes to the base address
    Fixed,
}

/// Parameters of one segment transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferPlan {
    /// Register receiving the first element
    pub base: u16,
    /// Address mode
    pub mode: AddressMode,
    /// Element width
    pub width: DataWidth,
    /// Maximum entries per bus transaction
    pub max_entries: usize,
}

impl TransferPlan {
    /// Create an incrementing plan
    #[must_use]
    pub const fn new(base: u16, width: DataWidth, max_entries: usize) -> Self {
        Self {
            base,
            mode: AddressMode::Increment,
            width,
            max_entries,
        }
    }

    /// Use a different address mode
    #[must_use]
    pub const fn with_mode(mut self, mode: AddressMode) -> Self {
        self.mode = mode;
        self
    }

    /// Number of bus transactions needed for a segment of `len` bytes
    #[must_use]
    pub const fn transactions_for(&self, len: usize) -> usize {
        if self.max_entries == 0 {
            return 0;
        }
        (len / self.width.bytes()).div_ceil(self.max_entries)
    }

    /// Register address of element `index`
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub const fn address_of(&self, index: usize) -> u16 {
        match self.mode {
            AddressMode::Increment => self.base.wrapping_add(index as u16),
            AddressMode::Fixed => self.base,
        }
    }

    fn element_value(&self, element: &[u8]) -> u32 {
        // Wide elements go out big-endian, so the wire carries the image bytes unchanged
        match self.width {
            DataWidth::Byte => u32::from(element[0]),
            DataWidth::Word => u32::from(u16::from_be_bytes([element[0], element[1]])),
            DataWidth::DWord => u32::from_be_bytes([element[0], element[1], element[2], element[3]]),
        }
    }
}

/// Write `data` according to `plan`
///
/// Returns the number of bytes written, which is `data.len()` on success.
///
/// # Errors
///
/// - [`Error::InvalidArgument`] if `max_entries` is zero, the segment length
///   is not a multiple of the element width, or an incrementing segment would
///   run past the end of the register space. Nothing is written.
/// - [`Error::ResourceExhausted`] if the staging buffer cannot be allocated.
///   Nothing is written.
/// - [`Error::Bus`] from the first failing transaction; later transactions are
///   not attempted.
pub fn write_segment<I>(bus: &mut I, plan: &TransferPlan, data: &[u8]) -> Result<usize, Error<I::Error>>
where
    I: RegisterBus,
{
    if data.is_empty() {
        return Ok(0);
    }

    let element_size = plan.width.bytes();
    if plan.max_entries == 0 || data.len() % element_size != 0 {
        return Err(Error::InvalidArgument);
    }

    let element_count = data.len() / element_size;
    if plan.mode == AddressMode::Increment && usize::from(plan.base) + element_count > 0x1_0000 {
        return Err(Error::InvalidArgument);
    }

    // One staging buffer per segment, reused by every transaction and
    // dropped on every return path below
    let mut staging: Vec<RegisterEntry> = Vec::new();
    staging
        .try_reserve_exact(plan.max_entries.min(element_count))
        .map_err(|_| Error::ResourceExhausted)?;

    let mut written = 0;
    for (transaction, chunk) in data.chunks(plan.max_entries * element_size).enumerate() {
        staging.clear();
        let first = transaction * plan.max_entries;
        staging.extend(
            chunk
                .chunks_exact(element_size)
                .enumerate()
                .map(|(i, element)| RegisterEntry::new(plan.address_of(first + i), plan.element_value(element))),
        );

        if let Err(e) = bus.write_burst(&staging, plan.width) {
            #[cfg(feature = "defmt")]
            defmt::error!(
                "firmware transaction {} failed at offset {} of {}",
                transaction,
                written,
                data.len()
            );
            return Err(Error::Bus(e));
        }

        #[cfg(feature = "defmt")]
        defmt::trace!(
            "firmware transaction {}: 0x{:04X} + {} entries",
            transaction,
            plan.address_of(first),
            staging.len()
        );

        written += chunk.len();
    }

    Ok(written)
}
