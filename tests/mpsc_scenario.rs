//! Scenarios 2 and 6: MPSC single-producer record framing and wrap-around.

use motorun::mpsc::{Mpsc, ProducerSlot};

#[test]
fn scenario_2_single_producer_three_records_then_a_wrapping_fourth() {
    let producers = vec![ProducerSlot::new()];
    let mut buf = vec![0u8; 64];
    let mpsc = Mpsc::new(&mut buf, &producers);
    let p = mpsc.register(0).unwrap();

    for _ in 0..3 {
        assert!(mpsc.write(&p, &[1u8; 20]));
    }

    let (offset, nbytes) = mpsc.consume();
    assert_eq!(offset, 0);
    assert_eq!(nbytes, 60);

    // A fourth 20-byte write doesn't fit in the remaining 4 bytes before
    // cap=64 and wraps: next-low becomes 20, end becomes 60.
    assert!(mpsc.write(&p, &[2u8; 20]));

    mpsc.release(nbytes);
    let (offset, nbytes) = mpsc.consume();
    assert_eq!(offset, 0);
    assert_eq!(nbytes, 20);
}

#[test]
fn scenario_6_three_ten_byte_records_wrap_at_cap_32() {
    let producers = vec![ProducerSlot::new()];
    let mut buf = vec![0u8; 32];
    let mpsc = Mpsc::new(&mut buf, &producers);
    let p = mpsc.register(0).unwrap();

    assert!(mpsc.write(&p, &[1u8; 10]));
    assert!(mpsc.write(&p, &[2u8; 10]));
    // Third record doesn't fit in the remaining 12 bytes before cap=32, so
    // it wraps to offset 0; `end` becomes 20.
    assert!(mpsc.write(&p, &[3u8; 10]));

    let (offset, nbytes) = mpsc.consume();
    assert_eq!(offset, 0);
    assert_eq!(nbytes, 20);
    mpsc.release(nbytes);

    // written wraps to 0 on exact-cap-of-the-first-segment match; the
    // second consume drains the wrapped record.
    let (offset, nbytes) = mpsc.consume();
    assert_eq!(offset, 0);
    assert_eq!(nbytes, 10);
    assert_eq!(mpsc.drained(offset, nbytes), &[3u8; 10]);
}

#[test]
fn no_record_is_ever_read_before_its_publish() {
    let producers = vec![ProducerSlot::new()];
    let mut buf = vec![0u8; 32];
    let mpsc = Mpsc::new(&mut buf, &producers);
    let p = mpsc.register(0).unwrap();

    let offset = mpsc.acquire(&p, 10).unwrap();
    unsafe { mpsc.reserved_mut(offset, 10) }.copy_from_slice(&[9u8; 10]);
    let (_, nbytes) = mpsc.consume();
    assert_eq!(nbytes, 0, "unpublished record must not be visible");

    mpsc.publish(&p);
    let (_, nbytes) = mpsc.consume();
    assert_eq!(nbytes, 10);
}
