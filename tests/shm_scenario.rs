//! Scenario 5: shared-memory rendezvous. Two `Shm` handles opened against
//! the same name within this process stand in for two processes — the
//! first becomes the creator/writer, the second attaches as a reader; both
//! go through the identical POSIX `shm_open`/`mmap` path Scenario 5
//! describes for two separate processes.

#![cfg(target_os = "linux")]

use motorun::shm::{shm_open, Access};

#[test]
fn creator_writes_four_counters_and_the_second_opener_reads_them_in_order() {
    let name = format!("/motorun-test-{}", std::process::id());

    let mut writer = shm_open(&name, Access::ReadWrite, 4096).unwrap();
    assert!(writer.is_creator());

    let mut reader = shm_open(&name, Access::ReadWrite, 4096).unwrap();
    assert!(!reader.is_creator());

    let counters: [u32; 4] = [1, 2, 3, 4];
    for c in counters {
        let bytes = c.to_le_bytes();
        assert_eq!(writer.write(&bytes), 4);
    }

    for expected in counters {
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf), 4);
        assert_eq!(u32::from_le_bytes(buf), expected);
    }

    drop(writer);
    drop(reader);
    unsafe {
        let cname = std::ffi::CString::new(name).unwrap();
        libc::shm_unlink(cname.as_ptr());
    }
}
