//! Tests for firmware transfer chunking and addressing

use crate::common::{MockError, MockInterface};
use ois_driver::transfer::{BM24218_MAX_ENTRIES, DW9781C_MAX_ENTRIES, write_segment};
use ois_driver::{AddressMode, DataWidth, Error, TransferPlan};

fn firmware(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

#[test]
fn test_transaction_count_is_ceiling_of_length_over_limit() {
    let plan = TransferPlan::new(0x0000, DataWidth::Byte, BM24218_MAX_ENTRIES);

    for len in [1, 199, 200, 201, 399, 400, 401, 1000, 7168] {
        let mut bus = MockInterface::new();
        let written = write_segment(&mut bus, &plan, &firmware(len)).unwrap();

        assert_eq!(written, len);
        assert_eq!(
            bus.writes().len(),
            len.div_ceil(BM24218_MAX_ENTRIES),
            "transactions for {len} bytes"
        );
        assert_eq!(plan.transactions_for(len), len.div_ceil(BM24218_MAX_ENTRIES));
    }
}

#[test]
fn test_every_byte_lands_at_base_plus_offset() {
    let mut bus = MockInterface::new();
    let data = firmware(450);
    let plan = TransferPlan::new(0x1C00, DataWidth::Byte, BM24218_MAX_ENTRIES);

    write_segment(&mut bus, &plan, &data).unwrap();

    let writes = bus.writes();
    assert_eq!(
        writes.iter().map(|(a, _)| *a).collect::<Vec<_>>(),
        vec![0x1C00, 0x1C00 + 200, 0x1C00 + 400]
    );
    assert_eq!(writes.iter().map(|(_, d)| d.len()).collect::<Vec<_>>(), vec![200, 200, 50]);

    // Concatenated payloads reproduce the blob in order
    let sent: Vec<u8> = writes.into_iter().flat_map(|(_, d)| d).collect();
    assert_eq!(sent, data);
}

#[test]
fn test_fixed_mode_targets_base_register() {
    let mut bus = MockInterface::new();
    let plan = TransferPlan::new(0x0000, DataWidth::Byte, BM24218_MAX_ENTRIES).with_mode(AddressMode::Fixed);

    write_segment(&mut bus, &plan, &firmware(500)).unwrap();

    let writes = bus.writes();
    assert_eq!(writes.len(), 3);
    assert!(writes.iter().all(|(address, _)| *address == 0x0000));
}

#[test]
fn test_zero_length_blob_performs_no_transactions() {
    let mut bus = MockInterface::new();
    let plan = TransferPlan::new(0x0000, DataWidth::Byte, BM24218_MAX_ENTRIES);

    assert!(matches!(write_segment(&mut bus, &plan, &[]), Ok(0)));
    assert_eq!(bus.write_attempts(), 0);
}

#[test]
fn test_failure_on_third_of_five_transactions_stops_transfer() {
    let mut bus = MockInterface::new();
    bus.fail_write_number(2);
    let plan = TransferPlan::new(0x0000, DataWidth::Byte, BM24218_MAX_ENTRIES);

    let result = write_segment(&mut bus, &plan, &firmware(1000));

    assert!(matches!(result, Err(Error::Bus(MockError::Communication))));
    // Two transactions delivered, the third attempted, the last two never tried
    assert_eq!(bus.writes().len(), 2);
    assert_eq!(bus.write_attempts(), 3);
}

#[test]
fn test_word_transfer_uses_word_limit() {
    let mut bus = MockInterface::new();
    let plan = TransferPlan::new(0x8000, DataWidth::Word, DW9781C_MAX_ENTRIES);

    // 200 words
    write_segment(&mut bus, &plan, &firmware(400)).unwrap();

    let writes = bus.writes();
    assert_eq!(writes.len(), 4);
    assert_eq!(writes[1].0, 0x8000 + 64);
    assert_eq!(writes[3].1.len(), 8 * 2);
}

#[test]
fn test_word_transfer_sends_image_bytes_in_order() {
    let mut bus = MockInterface::new();
    let plan = TransferPlan::new(0x8000, DataWidth::Word, DW9781C_MAX_ENTRIES);
    let data = firmware(300);

    write_segment(&mut bus, &plan, &data).unwrap();

    let sent: Vec<u8> = bus.writes().into_iter().flat_map(|(_, d)| d).collect();
    assert_eq!(sent, data);
}

#[test]
fn test_odd_word_blob_is_rejected_before_bus_traffic() {
    let mut bus = MockInterface::new();
    let plan = TransferPlan::new(0x8000, DataWidth::Word, DW9781C_MAX_ENTRIES);

    assert!(matches!(
        write_segment(&mut bus, &plan, &firmware(129)),
        Err(Error::InvalidArgument)
    ));
    assert_eq!(bus.write_attempts(), 0);
}

#[test]
fn test_zero_entry_limit_is_rejected() {
    let mut bus = MockInterface::new();
    let plan = TransferPlan::new(0x0000, DataWidth::Byte, 0);

    assert!(matches!(
        write_segment(&mut bus, &plan, &firmware(10)),
        Err(Error::InvalidArgument)
    ));
}
