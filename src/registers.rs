//! Register definitions for the supported OIS controllers
//!
//! Each controller has its own register space, so each gets its own
//! `device-driver` device in a sub-module. Both use 16-bit register addresses
//! and big-endian data on the wire.
//!
//! Only registers the driver reads, or writes as a single named operation, are
//! listed here. Long vendor sequences (calibration, servo setup, MTP erase)
//! live as data tables next to the variant that uses them, and so do the
//! status, checksum and identity registers read by the shared pollers and
//! probes, which address them by number.

/// BM24218 register definitions
///
/// The BM24218 has 8-bit registers. Program and coefficient RAM are written
/// through the download window opened by `DL_START` and closed by
/// `DL_COMPLETE`.
pub mod bm24218 {
    device_driver::create_device!(
        device_name: Bm24218Registers,
        dsl: {
            config {
                type RegisterAddressType = u16;
                type DefaultByteOrder = BE;
            }

            /// OIS_CTRL - OIS Control (0x6020)
            /// 0x01 = servo on, 0x02 = OIS on (closed loop)
            register OisControl {
                const ADDRESS = 0x6020;
                const SIZE_BITS = 8;

                /// Operating mode
                mode: uint = 0..8,
            },

            /// DL_COMPLETE - Download Complete (0xF006)
            register DownloadComplete {
                const ADDRESS = 0xF006;
                const SIZE_BITS = 8;

                /// Write 0x00 to leave download mode
                complete: uint = 0..8,
            },

            /// FW_CHECKSUM - Downloaded Image Checksum (0xF008)
            register FirmwareChecksum {
                const ADDRESS = 0xF008;
                const SIZE_BITS = 32;

                /// Checksum computed by the controller over program and coefficient RAM
                checksum: uint = 0..32,
            },

            /// DL_START - Download Start (0xF010)
            register DownloadStart {
                const ADDRESS = 0xF010;
                const SIZE_BITS = 8;

                /// Write 0x00 to enter download mode
                start: uint = 0..8,
            }
        }
    );
}

/// DW9781C register definitions
///
/// The DW9781C has 16-bit registers. Firmware lives in on-chip MTP and
/// survives power cycles; the driver only rewrites it when the identity,
/// checksum or version checks say so.
pub mod dw9781c {
    device_driver::create_device!(
        device_name: Dw9781cRegisters,
        dsl: {
            config {
                type RegisterAddressType = u16;
                type DefaultByteOrder = BE;
            }

            /// FW_VER - Programmed Firmware Version (0x7001)
            register FwVersion {
                const ADDRESS = 0x7001;
                const SIZE_BITS = 16;

                /// Firmware version (low byte is compared against the image)
                version: uint = 0..16,
            },

            /// FW_DATE - Programmed Firmware Date (0x7002)
            register FwDate {
                const ADDRESS = 0x7002;
                const SIZE_BITS = 16;

                /// Firmware build date code
                date: uint = 0..16,
            },

            /// FW_TYPE - Firmware Type (0x700D)
            register FwType {
                const ADDRESS = 0x700D;
                const SIZE_BITS = 16;

                /// Firmware type code
                fw_type: uint = 0..16,
            },

            /// OIS_CTRL - OIS Control (0x7015)
            /// 0x0000 = OIS on, 0x0001 = servo on, 0x0002 = servo off
            register OisControl {
                const ADDRESS = 0x7015;
                const SIZE_BITS = 16;

                /// Operating mode
                mode: uint = 0..16,
            },

            /// CHECKSUM_FLAG - MTP Checksum Flag (0xA7F9)
            /// Reads 0xCC33 after a verified firmware write
            register ChecksumFlag {
                const ADDRESS = 0xA7F9;
                const SIZE_BITS = 16;

                /// Checksum flag sentinel
                flag: uint = 0..16,
            },

            /// CHIP_EN - Chip Enable (0xD000)
            /// 0x0000 = shutdown, 0x0001 = standby
            register ChipEnable {
                const ADDRESS = 0xD000;
                const SIZE_BITS = 16;

                /// Power state
                state: uint = 0..16,
            },

            /// DSP_CTRL - DSP Control (0xD001)
            register DspControl {
                const ADDRESS = 0xD001;
                const SIZE_BITS = 16;

                /// DSP active mode
                dsp_on: bool = 0,
                reserved_15_1: uint = 1..16,
            },

            /// RESET - Logic Reset (0xD002)
            register LogicReset {
                const ADDRESS = 0xD002;
                const SIZE_BITS = 16;

                /// Reset the controller logic
                reset: bool = 0,
                reserved_15_1: uint = 1..16,
            }
        }
    );
}
