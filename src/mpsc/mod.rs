//! Lock-free multi-producer/single-consumer variable-length record log.
//!
//! `next` packs a 32-bit reservation offset in its low bits, a wrap counter
//! above that, and a "wrap-locked" flag in the top bit. Producers advertise
//! their in-flight offset through a `seen_off` slot so the single consumer
//! can compute a safe drain horizon without a shared lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::{Error, Result};

const OFF_MASK: u64 = 0x0000_0000_FFFF_FFFF;
const WRAP_LOCK_BIT: u64 = 0x8000_0000_0000_0000;
const WRAP_COUNTER: u64 = 0x7FFF_FFFF_0000_0000;
const OFF_MAX: u64 = u64::MAX & !WRAP_LOCK_BIT;

fn wrap_incr(x: u64) -> u64 {
    x.wrapping_add(0x1_0000_0000) & WRAP_COUNTER
}

const BACKOFF_MIN: u32 = 4;
const BACKOFF_MAX: u32 = 128;

#[inline]
fn backoff(spins: &mut u32) {
    for _ in 0..*spins {
        std::hint::spin_loop();
    }
    if *spins < BACKOFF_MAX {
        *spins *= 2;
    }
}

/// One slot of the externally supplied producer table.
#[derive(Default)]
pub struct ProducerSlot {
    seen_off: AtomicU64,
    registered: AtomicBool,
}

impl ProducerSlot {
    pub const fn new() -> Self {
        Self {
            seen_off: AtomicU64::new(OFF_MAX),
            registered: AtomicBool::new(false),
        }
    }
}

/// A registered handle into the producer table. Dropping this without
/// calling [`Mpsc::unregister`] leaves the slot registered — callers that
/// need the slot back must unregister explicitly.
pub struct ProducerHandle {
    pub id: usize,
}

/// A byte arena plus the reservation/drain bookkeeping for the record log.
/// The arena capacity need not be a power of two; wrap is linear, not
/// masked.
pub struct Mpsc<'a> {
    buf: &'a mut [u8],
    cap: u64,
    next: AtomicU64,
    end: AtomicU64,
    written: AtomicU64,
    producers: &'a [ProducerSlot],
}

impl<'a> Mpsc<'a> {
    /// `buf.len()` is the arena capacity `C`; `producers` is the fixed,
    /// externally supplied producer table (no allocation performed here).
    pub fn new(buf: &'a mut [u8], producers: &'a [ProducerSlot]) -> Self {
        let cap = buf.len() as u64;
        Self {
            buf,
            cap,
            next: AtomicU64::new(0),
            end: AtomicU64::new(OFF_MAX),
            written: AtomicU64::new(0),
            producers,
        }
    }

    pub fn register(&self, id: usize) -> Result<ProducerHandle> {
        let slot = self
            .producers
            .get(id)
            .ok_or_else(|| Error::InvalidArgument(format!("producer id {id} out of range")))?;
        slot.seen_off.store(OFF_MAX, Ordering::Relaxed);
        slot.registered.store(true, Ordering::Release);
        Ok(ProducerHandle { id })
    }

    pub fn unregister(&self, handle: ProducerHandle) {
        self.producers[handle.id]
            .registered
            .store(false, Ordering::Relaxed);
    }

    fn stable_next(&self) -> u64 {
        let mut spins = BACKOFF_MIN;
        loop {
            let next = self.next.load(Ordering::Acquire);
            if next & WRAP_LOCK_BIT == 0 {
                return next;
            }
            backoff(&mut spins);
        }
    }

    fn stable_seen(slot: &ProducerSlot) -> u64 {
        let mut spins = BACKOFF_MIN;
        loop {
            let seen = slot.seen_off.load(Ordering::Acquire);
            if seen & WRAP_LOCK_BIT == 0 {
                return seen;
            }
            backoff(&mut spins);
        }
    }

    /// Reserves `len` bytes for `handle`. Returns the offset to write at, or
    /// `None` if the consumer has not drained far enough (the caller should
    /// retry or drop the record — no data already in the ring is lost).
    pub fn acquire(&self, handle: &ProducerHandle, len: usize) -> Option<usize> {
        let slot = &self.producers[handle.id];
        let len = len as u64;

        let mut seen;
        let mut target;
        loop {
            seen = self.stable_next();
            let off = seen & OFF_MASK;

            slot.seen_off.store(off | WRAP_LOCK_BIT, Ordering::Relaxed);

            target = off + len;
            let written = self.written.load(Ordering::Acquire);
            if off < written && target >= written {
                slot.seen_off.store(OFF_MAX, Ordering::Release);
                return None;
            }

            if target >= self.cap {
                let exceeds = target > self.cap;
                target = if exceeds { WRAP_LOCK_BIT | len } else { 0 };
                if (target & OFF_MASK) >= written {
                    slot.seen_off.store(OFF_MAX, Ordering::Release);
                    return None;
                }
                target |= wrap_incr(seen & WRAP_COUNTER);
            } else {
                target |= seen & WRAP_COUNTER;
            }

            match self.next.compare_exchange_weak(
                seen,
                target,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(_) => continue,
            }
        }

        let mut off = seen & OFF_MASK;
        slot.seen_off
            .store((off | WRAP_LOCK_BIT) & !WRAP_LOCK_BIT, Ordering::Relaxed);

        if target & WRAP_LOCK_BIT != 0 {
            self.end.store(off, Ordering::Relaxed);
            self.next
                .store(target & !WRAP_LOCK_BIT, Ordering::Release);
            off = 0;
        }

        Some(off as usize)
    }

    /// Returns the exclusive byte range reserved by a prior [`Mpsc::acquire`]
    /// call for writing. The caller must write exactly `len` bytes (the same
    /// `len` passed to `acquire`) before calling [`Mpsc::publish`].
    ///
    /// # Safety
    /// `offset`/`len` must come from the immediately preceding successful
    /// `acquire` call on this same handle — the protocol guarantees no other
    /// producer's reservation overlaps that range until `publish` is called.
    pub unsafe fn reserved_mut(&self, offset: usize, len: usize) -> &mut [u8] {
        let ptr = self.buf.as_ptr() as *mut u8;
        std::slice::from_raw_parts_mut(ptr.add(offset), len)
    }

    /// Marks the producer's reservation as done; `seen_off` becomes `OFF_MAX`
    /// with release ordering, the write becoming visible to the consumer.
    pub fn publish(&self, handle: &ProducerHandle) {
        self.producers[handle.id]
            .seen_off
            .store(OFF_MAX, Ordering::Release);
    }

    /// `acquire` + memcpy + `publish`. Returns `false` if the reservation
    /// failed (record not written).
    pub fn write(&self, handle: &ProducerHandle, bytes: &[u8]) -> bool {
        match self.acquire(handle, bytes.len()) {
            Some(offset) => {
                unsafe { self.reserved_mut(offset, bytes.len()) }.copy_from_slice(bytes);
                self.publish(handle);
                true
            }
            None => false,
        }
    }

    /// Computes the next contiguous run of bytes safe to drain. Returns
    /// `(offset, nbytes)`; `nbytes == 0` means nothing is ready.
    pub fn consume(&self) -> (usize, usize) {
        loop {
            let written = self.written.load(Ordering::Acquire);
            let next = self.stable_next() & OFF_MASK;
            if written == next {
                return (written as usize, 0);
            }

            let mut ready = OFF_MAX;
            for slot in self.producers {
                if !slot.registered.load(Ordering::Relaxed) {
                    continue;
                }
                let seen = Self::stable_seen(slot);
                if seen >= written && seen < ready {
                    ready = seen;
                }
            }

            if next < written {
                let end = match self.end.load(Ordering::Relaxed) {
                    OFF_MAX => self.cap,
                    e => e,
                };
                if ready == OFF_MAX && written == end {
                    self.end.store(OFF_MAX, Ordering::Relaxed);
                    self.written.store(0, Ordering::Release);
                    continue;
                }
                ready = ready.min(end);
            } else {
                ready = ready.min(next);
            }

            return (written as usize, (ready - written) as usize);
        }
    }

    /// Reads the bytes reserved by [`Mpsc::consume`] for the sole consumer.
    pub fn drained(&self, offset: usize, len: usize) -> &[u8] {
        &self.buf[offset..offset + len]
    }

    /// Advances `written` by `nbytes`, wrapping to 0 on exact-capacity match.
    pub fn release(&self, nbytes: usize) {
        let written = self.written.load(Ordering::Relaxed);
        let advanced = written + nbytes as u64;
        let next_written = if advanced == self.cap { 0 } else { advanced };
        self.written.store(next_written, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn producer_table(n: usize) -> Vec<ProducerSlot> {
        (0..n).map(|_| ProducerSlot::new()).collect()
    }

    #[test]
    fn single_producer_three_records_drain_contiguously() {
        let producers = producer_table(1);
        let mut buf = vec![0u8; 64];
        let mpsc = Mpsc::new(&mut buf, &producers);
        let p = mpsc.register(0).unwrap();

        for _ in 0..3 {
            assert!(mpsc.write(&p, &[7u8; 20]));
        }

        let (offset, nbytes) = mpsc.consume();
        assert_eq!(offset, 0);
        assert_eq!(nbytes, 60);
        mpsc.release(nbytes);

        // A fourth write of 20 bytes does not fit in the remaining 4 bytes
        // (64 - 60) and wraps.
        assert!(mpsc.write(&p, &[9u8; 20]));
    }

    #[test]
    fn wrap_with_end_marker_drains_both_halves() {
        let producers = producer_table(1);
        let mut buf = vec![0u8; 32];
        let mpsc = Mpsc::new(&mut buf, &producers);
        let p = mpsc.register(0).unwrap();

        assert!(mpsc.write(&p, &[1u8; 10]));
        assert!(mpsc.write(&p, &[2u8; 10]));
        // Third 10-byte record doesn't fit in the remaining 12 bytes before
        // cap=32, so it wraps to offset 0; `end` becomes 20.
        assert!(mpsc.write(&p, &[3u8; 10]));

        let (offset, nbytes) = mpsc.consume();
        assert_eq!(offset, 0);
        assert_eq!(nbytes, 20);
        mpsc.release(nbytes);

        let (offset, nbytes) = mpsc.consume();
        assert_eq!(offset, 0);
        assert_eq!(nbytes, 10);
    }

    #[test]
    fn acquire_fails_when_consumer_is_behind() {
        let producers = producer_table(1);
        let mut buf = vec![0u8; 16];
        let mpsc = Mpsc::new(&mut buf, &producers);
        let p = mpsc.register(0).unwrap();

        assert!(mpsc.write(&p, &[1u8; 16]));
        // Consumer hasn't drained anything; the ring is full.
        assert!(mpsc.acquire(&p, 1).is_none());
    }

    #[test]
    fn no_record_ever_read_before_publish() {
        let producers = producer_table(1);
        let mut buf = vec![0u8; 32];
        let mpsc = Mpsc::new(&mut buf, &producers);
        let p = mpsc.register(0).unwrap();

        let offset = mpsc.acquire(&p, 10).unwrap();
        unsafe { mpsc.reserved_mut(offset, 10) }.copy_from_slice(&[5u8; 10]);
        // Not published yet.
        let (_, nbytes) = mpsc.consume();
        assert_eq!(nbytes, 0);

        mpsc.publish(&p);
        let (_, nbytes) = mpsc.consume();
        assert_eq!(nbytes, 10);
    }

    #[test]
    fn multiple_producers_preserve_per_producer_order() {
        use std::sync::Arc;
        use std::thread;

        let producers: Arc<Vec<ProducerSlot>> = Arc::new(producer_table(4));
        // The arena must outlive every thread; leak it for the test's
        // duration rather than fighting Mpsc's borrowed-buffer lifetime.
        let buf: &'static mut [u8] = vec![0u8; 4096].leak();
        let mpsc: Arc<Mpsc<'static>> = Arc::new(Mpsc::new(buf, producers.leak()));

        let mut handles = Vec::new();
        for pid in 0..4u8 {
            let mpsc = Arc::clone(&mpsc);
            handles.push(thread::spawn(move || {
                let handle = mpsc.register(pid as usize).unwrap();
                for seq in 0..50u8 {
                    loop {
                        if mpsc.write(&handle, &[pid, seq]) {
                            break;
                        }
                        thread::yield_now();
                    }
                }
                mpsc.unregister(handle);
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let mut seen_seq = [0u8; 4];
        let mut drained = 0usize;
        // Drain until all 4*50 two-byte records have been seen.
        while drained < 4 * 50 {
            let (offset, nbytes) = mpsc.consume();
            if nbytes == 0 {
                break;
            }
            let bytes = mpsc.drained(offset, nbytes).to_vec();
            mpsc.release(nbytes);
            for rec in bytes.chunks(2) {
                let (pid, seq) = (rec[0], rec[1]);
                assert_eq!(seq, seen_seq[pid as usize]);
                seen_seq[pid as usize] += 1;
                drained += 1;
            }
        }
        assert_eq!(seen_seq, [50, 50, 50, 50]);
    }
}
