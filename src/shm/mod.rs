//! Shared-memory rendezvous: an [`SpscCore`] placed at the head of a named
//! OS mapping, first-opener-is-creator. Two processes running this crate
//! open the same name; whichever gets there first creates and initializes
//! the ring, the other attaches to it.
//!
//! The embedded `SpscCore` relies on the mapping's two openers agreeing on
//! its in-memory layout, which only holds because both sides are the same
//! Rust binary — this is a local-rendezvous mechanism, not a
//! cross-language/cross-build wire format.

pub mod backend;

use std::mem::size_of;

use backend::{PlatformShm, ShmBackend};

use crate::error::{Error, Result};
use crate::spsc::{Policy, SpscCore};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// A named mapping carrying one `SpscCore` header followed by its
/// `ring_cap`-byte data buffer.
pub struct Shm<B: ShmBackend = PlatformShm> {
    backend: B,
    ring_cap: usize,
}

impl<B: ShmBackend> Shm<B> {
    /// `ring_cap` MUST be a power of two (the data region's size, not the
    /// total mapping size — the `SpscCore` header is added on top).
    pub fn open(name: &str, access: Access, ring_cap: usize) -> Result<Self> {
        let header = size_of::<SpscCore>();
        let total = header
            .checked_add(ring_cap)
            .ok_or_else(|| Error::InvalidArgument("shm size overflow".into()))?;

        let mut backend = B::open_or_create(name, access, total)?;
        if backend.is_creator() {
            let core = SpscCore::new(ring_cap, Policy::Reject)?;
            unsafe {
                (backend.as_mut_ptr() as *mut SpscCore).write(core);
            }
        }

        Ok(Self { backend, ring_cap })
    }

    fn core(&self) -> *mut SpscCore {
        self.backend.as_ptr() as *mut SpscCore
    }

    fn data_buf(&mut self) -> &mut [u8] {
        let header = size_of::<SpscCore>();
        let ring_cap = self.ring_cap;
        unsafe {
            std::slice::from_raw_parts_mut(self.backend.as_mut_ptr().add(header), ring_cap)
        }
    }

    /// Pushes `src` into the ring, applying its `Reject` overflow policy.
    /// Returns the number of bytes actually written.
    pub fn write(&mut self, src: &[u8]) -> usize {
        let core = self.core();
        let buf = self.data_buf();
        unsafe { (*core).push_into(buf, src) }
    }

    /// Pops up to `dst.len()` bytes out of the ring. Returns the number of
    /// bytes actually read.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let core = self.core();
        let buf = self.data_buf();
        unsafe { (*core).pop_from(buf, dst) }
    }

    pub fn is_creator(&self) -> bool {
        self.backend.is_creator()
    }
}

/// Opens (or creates) the platform's native shared-memory backend under
/// `name`.
pub fn shm_open(name: &str, access: Access, ring_cap: usize) -> Result<Shm<PlatformShm>> {
    Shm::open(name, access, ring_cap)
}
