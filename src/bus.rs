//! Register bus client
//!
//! All traffic to an OIS controller goes through [`RegisterBus`], an extension
//! of the `device-driver` [`RegisterInterface`] with 16-bit register addresses.
//! The extension adds the three operations the boot protocol is written in:
//!
//! - [`write_value`](RegisterBus::write_value): one register, one value
//! - [`read_value`](RegisterBus::read_value): one register, one value
//! - [`write_burst`](RegisterBus::write_burst): an ordered list of
//!   [`RegisterEntry`] sent as continuous writes
//!
//! Any type implementing `RegisterInterface<AddressType = u16>` gets
//! [`RegisterBus`] for free, so the [`I2cInterface`](crate::I2cInterface) and
//! test mocks only implement the raw byte transfer.
//!
//! Values are encoded big-endian on the wire, matching the CCI convention both
//! supported controllers use.

use device_driver::RegisterInterface;

/// Maximum number of payload bytes sent in a single `write_register` call
///
/// Bursts whose encoded payload is larger are split at this boundary. The
/// continuation starts at the address of the first entry not yet sent, so the
/// split is invisible to the device.
pub const MAX_BURST_BYTES: usize = 256;

/// Register address width on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressWidth {
    /// 8-bit register addresses
    Byte,
    /// 16-bit register addresses (both supported controllers)
    Word,
}

impl AddressWidth {
    /// Number of address bytes sent before the payload
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
        }
    }
}

/// Register data width on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataWidth {
    /// 8-bit registers
    Byte,
    /// 16-bit registers
    Word,
    /// 32-bit registers
    DWord,
}

impl DataWidth {
    /// Number of payload bytes per register
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
            Self::DWord => 4,
        }
    }

    /// Register size in bits, as passed to `RegisterInterface`
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Byte => 8,
            Self::Word => 16,
            Self::DWord => 32,
        }
    }

    /// Encode `value` big-endian into `out`, returning the number of bytes used
    ///
    /// Bits above the register width are dropped.
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(self, value: u32, out: &mut [u8]) -> usize {
        match self {
            Self::Byte => out[0] = value as u8,
            Self::Word => out[..2].copy_from_slice(&(value as u16).to_be_bytes()),
            Self::DWord => out[..4].copy_from_slice(&value.to_be_bytes()),
        }
        self.bytes()
    }

    /// Decode a big-endian register value
    #[must_use]
    pub fn decode(self, data: &[u8]) -> u32 {
        match self {
            Self::Byte => u32::from(data[0]),
            Self::Word => u32::from(u16::from_be_bytes([data[0], data[1]])),
            Self::DWord => u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
        }
    }
}

/// One `(address, value)` entry of a register transaction
///
/// `delay_us` mirrors the per-entry delay field of vendor register tables. The
/// bus never honours it; sequences that need a pause after a specific write
/// list it in a [`PostWriteDelay`] table instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterEntry {
    /// Register address
    pub address: u16,
    /// Value to write
    pub data: u32,
    /// Vendor table delay annotation in microseconds (informational)
    pub delay_us: u32,
}

impl RegisterEntry {
    /// Create an entry without a delay annotation
    #[must_use]
    pub const fn new(address: u16, data: u32) -> Self {
        Self {
            address,
            data,
            delay_us: 0,
        }
    }

    /// Attach a vendor delay annotation
    #[must_use]
    pub const fn with_delay(self, delay_us: u32) -> Self {
        Self { delay_us, ..self }
    }
}

/// Pause required after writing a specific value to a specific register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PostWriteDelay {
    /// Register address that triggers the pause
    pub address: u16,
    /// Value that triggers the pause
    pub data: u32,
    /// Pause length in microseconds (a minimum, not an exact bound)
    pub delay_us: u32,
}

impl PostWriteDelay {
    /// Create a post-write delay rule
    #[must_use]
    pub const fn new(address: u16, data: u32, delay_us: u32) -> Self {
        Self {
            address,
            data,
            delay_us,
        }
    }

    /// Find the pause owed after writing `entry`, if any
    #[must_use]
    pub fn lookup(table: &[Self], entry: &RegisterEntry) -> Option<u32> {
        table
            .iter()
            .find(|rule| rule.address == entry.address && rule.data == entry.data)
            .map(|rule| rule.delay_us)
    }
}

/// Protocol-level register operations on top of a byte-level interface
pub trait RegisterBus: RegisterInterface<AddressType = u16> {
    /// Write a single register
    ///
    /// # Errors
    ///
    /// Returns the interface error if the transfer fails.
    fn write_value(&mut self, address: u16, value: u32, width: DataWidth) -> Result<(), Self::Error> {
        let mut buffer = [0u8; 4];
        let len = width.encode(value, &mut buffer);
        self.write_register(address, width.bits(), &buffer[..len])
    }

    /// Read a single register
    ///
    /// # Errors
    ///
    /// Returns the interface error if the transfer fails.
    fn read_value(&mut self, address: u16, width: DataWidth) -> Result<u32, Self::Error> {
        let mut buffer = [0u8; 4];
        let len = width.bytes();
        self.read_register(address, width.bits(), &mut buffer[..len])?;
        Ok(width.decode(&buffer[..len]))
    }

    /// Write an ordered list of entries as continuous writes
    ///
    /// Consecutive entries that either share one address or step through
    /// addresses one at a time form a run and are sent as a single write
    /// starting at the run's first address. Any other address pattern is sent
    /// entry by entry. Order is always preserved. An empty list performs no
    /// bus traffic.
    ///
    /// Callers are responsible for keeping `entries` within the transaction
    /// limit of their device; see [`TransferPlan`](crate::TransferPlan).
    ///
    /// # Errors
    ///
    /// Returns the first interface error; later runs are not attempted.
    #[allow(clippy::cast_possible_truncation)]
    fn write_burst(&mut self, entries: &[RegisterEntry], width: DataWidth) -> Result<(), Self::Error> {
        let mut buffer = [0u8; MAX_BURST_BYTES];
        let step = width.bytes();
        let mut start = 0;

        while start < entries.len() {
            let base = entries[start].address;
            let stride = match entries.get(start + 1) {
                Some(next) if next.address == base => Some(0u16),
                Some(next) if next.address == base.wrapping_add(1) => Some(1u16),
                _ => None,
            };

            let mut len = 0;
            let mut end = start;
            while end < entries.len() && len + step <= MAX_BURST_BYTES {
                let offset = (end - start) as u16;
                let in_run = match stride {
                    Some(stride) => entries[end].address == base.wrapping_add(stride.wrapping_mul(offset)),
                    None => end == start,
                };
                if !in_run {
                    break;
                }
                len += width.encode(entries[end].data, &mut buffer[len..len + step]);
                end += 1;
            }

            self.write_register(base, (len * 8) as u32, &buffer[..len])?;
            start = end;
        }

        Ok(())
    }

    /// Write entries one at a time, pausing where `post_write` asks for it
    ///
    /// # Errors
    ///
    /// Returns the first interface error; later entries are not written.
    fn write_table<D>(
        &mut self,
        entries: &[RegisterEntry],
        width: DataWidth,
        post_write: &[PostWriteDelay],
        delay: &mut D,
    ) -> Result<(), Self::Error>
    where
        D: embedded_hal::delay::DelayNs,
    {
        for entry in entries {
            self.write_value(entry.address, entry.data, width)?;
            if let Some(delay_us) = PostWriteDelay::lookup(post_write, entry) {
                delay.delay_us(delay_us);
            }
        }
        Ok(())
    }
}

impl<T> RegisterBus for T where T: RegisterInterface<AddressType = u16> {}
