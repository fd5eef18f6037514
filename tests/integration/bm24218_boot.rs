//! End-to-end BM24218 boot sequences

use crate::common::{MemoryLoader, MockDelay, MockError, MockInterface, Operation, create_mock_device};
use ois_driver::variants::bm24218::{CALIBRATION_TABLE, SERVO_GYRO_TABLE};
use ois_driver::{AddressMode, BootState, Error, OisConfig, OisDevice};

const FW_CHECKSUM: u32 = 0xCAFE_F00D;

fn loader() -> MemoryLoader {
    MemoryLoader::new()
        .with_image("bm24218.prog", (0..450).map(|i| (i % 256) as u8).collect())
        .with_image("bm24218.coeff", vec![0x5A; 100])
}

fn ready_device(config: OisConfig) -> (OisDevice<MockInterface>, MockInterface) {
    let (ois, interface) = create_mock_device(config);
    interface.set_register(0x6024, 0x01);
    interface.set_register(0xF008, FW_CHECKSUM);
    (ois, interface)
}

fn write(address: u16, data: &[u8]) -> Operation {
    Operation::WriteRegister {
        address,
        data: data.to_vec(),
    }
}

/// Register traffic of the servo table with its gyro reset pauses
fn servo_operations() -> Vec<Operation> {
    let mut ops = Vec::new();
    for entry in SERVO_GYRO_TABLE {
        ops.push(write(entry.address, &[entry.data as u8]));
        if entry.address == 0x602D && entry.data == 0x01 {
            ops.push(Operation::Delay { us: 110_000 });
        }
    }
    ops
}

fn poll_operations() -> Vec<Operation> {
    vec![
        Operation::Delay { us: 5_000 },
        Operation::ReadRegister {
            address: 0x6024,
            value: 0x01,
        },
    ]
}

#[test]
fn test_full_boot_with_firmware_and_calibration() {
    let config = OisConfig::bm24218("bm24218")
        .with_firmware(true)
        .with_calibration(true);
    let (mut ois, interface) = ready_device(config);
    let mut loader = loader();
    let mut delay = MockDelay::attached(&interface);

    ois.run_boot_sequence(&mut loader, &mut delay).unwrap();

    let calibration: Vec<u8> = CALIBRATION_TABLE.iter().map(|e| e.data as u8).collect();
    let mut expected = vec![
        write(0xF010, &[0x00]),
        Operation::Delay { us: 200 },
        write(0x0000, &(0..200).map(|i| i as u8).collect::<Vec<_>>()),
        write(0x00C8, &(200..400).map(|i| (i % 256) as u8).collect::<Vec<_>>()),
        write(0x0190, &(400..450).map(|i| (i % 256) as u8).collect::<Vec<_>>()),
        write(0x1C00, &[0x5A; 100]),
        Operation::ReadRegister {
            address: 0xF008,
            value: FW_CHECKSUM,
        },
        write(0x1DC0, &calibration),
        write(0xF006, &[0x00]),
        Operation::Delay { us: 1_000 },
    ];
    expected.extend(poll_operations());
    expected.extend(servo_operations());
    expected.extend(poll_operations());
    expected.push(write(0x6020, &[0x02]));

    assert_eq!(interface.operations(), expected);
    assert_eq!(loader.requests(), ["bm24218.prog", "bm24218.coeff"]);
    assert_eq!(ois.state(), BootState::Ready);
}

#[test]
fn test_boot_without_firmware_or_calibration() {
    let (mut ois, interface) = ready_device(OisConfig::bm24218("bm24218"));
    let mut loader = loader();

    ois.run_boot_sequence(&mut loader, &mut MockDelay::new()).unwrap();

    assert!(loader.requests().is_empty());
    assert!(!interface.wrote_in(0x0000..=0x1DFF));
    assert_eq!(interface.read_count(0xF008), 0);

    let addresses: Vec<u16> = interface.writes().iter().map(|(a, _)| *a).collect();
    assert_eq!(addresses.first(), Some(&0xF010));
    assert_eq!(addresses[1], 0xF006);
    assert_eq!(addresses.last(), Some(&0x6020));
    assert_eq!(addresses.len(), 3 + SERVO_GYRO_TABLE.len());
}

#[test]
fn test_calibration_is_one_burst() {
    let (mut ois, interface) = ready_device(OisConfig::bm24218("bm24218").with_calibration(true));

    ois.run_boot_sequence(&mut loader(), &mut MockDelay::new()).unwrap();

    let bursts = interface.writes_to(0x1DC0);
    assert_eq!(bursts.len(), 1);
    assert_eq!(bursts[0].len(), 40);
    assert_eq!(&bursts[0][..4], &[0x00, 0x1B, 0x00, 0x1C]);
    assert!(!interface.wrote_in(0x0000..=0x1C63));
}

#[test]
fn test_servo_table_pauses_only_after_gyro_reset() {
    let (mut ois, interface) = ready_device(OisConfig::bm24218("bm24218"));
    let mut delay = MockDelay::attached(&interface);

    ois.run_boot_sequence(&mut loader(), &mut delay).unwrap();

    let ops = interface.operations();
    let long_pauses: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, op)| **op == Operation::Delay { us: 110_000 })
        .map(|(i, _)| i)
        .collect();
    assert_eq!(long_pauses.len(), 2);
    for i in long_pauses {
        assert_eq!(ops[i - 1], write(0x602D, &[0x01]));
    }
    assert!(!ops.contains(&Operation::Delay { us: 20_000 }));
}

#[test]
fn test_fixed_address_mode_writes_to_segment_base() {
    let config = OisConfig::bm24218("bm24218")
        .with_firmware(true)
        .with_transfer_mode(AddressMode::Fixed);
    let (mut ois, interface) = ready_device(config);

    ois.run_boot_sequence(&mut loader(), &mut MockDelay::new()).unwrap();

    assert_eq!(interface.writes_to(0x0000).len(), 3);
    assert_eq!(interface.writes_to(0x1C00).len(), 1);
    assert!(interface.writes_to(0x00C8).is_empty());
}

#[test]
fn test_mid_transfer_failure_stops_boot() {
    let (mut ois, interface) = ready_device(OisConfig::bm24218("bm24218").with_firmware(true));
    let mut loader = MemoryLoader::new()
        .with_image("bm24218.prog", vec![0xAA; 1000])
        .with_image("bm24218.coeff", vec![0x55; 10]);
    // Write 0 is the download start; 1..=5 are the five program transactions
    interface.fail_write_number(3);

    let result = ois.run_boot_sequence(&mut loader, &mut MockDelay::new());

    assert!(matches!(result, Err(Error::Bus(MockError::Communication))));
    assert_eq!(ois.failed_stage(), Some(BootState::FirmwareDownload));
    assert_eq!(interface.writes().len(), 3);
    assert_eq!(interface.write_attempts(), 4);
    assert_eq!(loader.requests(), ["bm24218.prog"]);
    assert!(interface.writes_to(0xF006).is_empty());
}

#[test]
fn test_expected_checksum_mismatch() {
    let config = OisConfig::bm24218("bm24218")
        .with_firmware(true)
        .with_expected_checksum(0x1234_5678);
    let (mut ois, interface) = ready_device(config);

    ois.run_boot_sequence(&mut loader(), &mut MockDelay::new()).unwrap();

    // Mismatch is recorded for the caller; the window is still closed and OIS enabled
    assert!(ois.needs_redownload());
    assert_eq!(ois.state(), BootState::Ready);
    assert_eq!(ois.failed_stage(), None);
    assert_eq!(interface.writes_to(0xF006), vec![vec![0x00]]);
    assert_eq!(interface.writes_to(0x6020).last(), Some(&vec![0x02]));
}

#[test]
fn test_expected_checksum_match() {
    let config = OisConfig::bm24218("bm24218")
        .with_firmware(true)
        .with_expected_checksum(FW_CHECKSUM);
    let (mut ois, _interface) = ready_device(config);

    ois.run_boot_sequence(&mut loader(), &mut MockDelay::new()).unwrap();
    assert_eq!(ois.state(), BootState::Ready);
    assert!(!ois.needs_redownload());
}

#[test]
fn test_complete_download_failure_is_ignored_by_default() {
    let (mut ois, interface) = ready_device(OisConfig::bm24218("bm24218"));
    interface.fail_writes_to(0xF006);

    ois.run_boot_sequence(&mut loader(), &mut MockDelay::new()).unwrap();

    assert_eq!(ois.state(), BootState::Ready);
    assert_eq!(interface.writes_to(0x6020).last(), Some(&vec![0x02]));
}

#[test]
fn test_complete_download_failure_is_fatal_when_strict() {
    let (mut ois, interface) = ready_device(OisConfig::bm24218("bm24218").with_strict_complete_download(true));
    interface.fail_writes_to(0xF006);

    let result = ois.run_boot_sequence(&mut loader(), &mut MockDelay::new());

    assert!(matches!(result, Err(Error::Bus(MockError::Communication))));
    assert_eq!(ois.failed_stage(), Some(BootState::CompleteDownload));
    assert_eq!(interface.read_count(0x6024), 0);
}

#[test]
fn test_release_returns_interface() {
    let (ois, _) = ready_device(OisConfig::bm24218("bm24218"));
    let interface = ois.release();
    assert_eq!(interface.get_register(0x6024), 0x01);
}
