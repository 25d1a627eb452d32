//! Monotonic and wall-clock timebases.
//!
//! The scheduler and FOC core only ever consume monotonic time; the wall
//! clock is exposed for host-side timestamping (e.g. log entries meant to be
//! correlated with external events).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Nanoseconds since an arbitrary fixed epoch, nondecreasing for the life of
/// the process.
pub fn mono_ns() -> u64 {
    epoch().elapsed().as_nanos() as u64
}

pub fn mono_us() -> u64 {
    mono_ns() / 1_000
}

pub fn mono_ms() -> u64 {
    mono_ns() / 1_000_000
}

pub fn mono_s() -> u64 {
    mono_ns() / 1_000_000_000
}

/// Nanoseconds since the Unix epoch. `SystemTime` can in principle step
/// backwards under NTP correction; we clamp against the last observed value
/// so callers still see a nondecreasing sequence.
pub fn real_ns() -> u64 {
    static LAST: AtomicU64 = AtomicU64::new(0);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    let mut last = LAST.load(Ordering::Relaxed);
    loop {
        if now <= last {
            return last;
        }
        match LAST.compare_exchange_weak(last, now, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return now,
            Err(observed) => last = observed,
        }
    }
}

pub fn real_us() -> u64 {
    real_ns() / 1_000
}

pub fn real_ms() -> u64 {
    real_ns() / 1_000_000
}

pub fn real_s() -> u64 {
    real_ns() / 1_000_000_000
}
