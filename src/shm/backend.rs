//! Platform-specific named shared-memory mapping.

use super::Access;
use crate::error::{Error, Result};

/// Opens (or creates) a named mapping and exposes it as a raw byte region.
/// First opener of a given name becomes the creator; everyone else attaches
/// to the existing mapping.
pub trait ShmBackend: Sized {
    fn open_or_create(name: &str, access: Access, cap: usize) -> Result<Self>;
    fn as_ptr(&self) -> *const u8;
    fn as_mut_ptr(&mut self) -> *mut u8;
    fn len(&self) -> usize;
    fn is_creator(&self) -> bool;
}

#[cfg(target_os = "linux")]
mod posix {
    use std::ffi::CString;

    use super::{Access, Error, Result, ShmBackend};

    pub struct PosixShm {
        fd: libc::c_int,
        base: *mut u8,
        len: usize,
        is_creator: bool,
    }

    impl ShmBackend for PosixShm {
        fn open_or_create(name: &str, access: Access, cap: usize) -> Result<Self> {
            let cname = CString::new(name)
                .map_err(|e| Error::InvalidArgument(format!("invalid shm name: {e}")))?;

            let mut is_creator = false;
            let mut fd = unsafe { libc::shm_open(cname.as_ptr(), libc::O_RDWR, 0o666) };
            if fd == -1 {
                fd = unsafe {
                    libc::shm_open(cname.as_ptr(), libc::O_CREAT | libc::O_RDWR, 0o666)
                };
                if fd == -1 {
                    return Err(Error::Access(std::io::Error::last_os_error()));
                }
                is_creator = true;
                if unsafe { libc::ftruncate(fd, cap as libc::off_t) } == -1 {
                    let err = std::io::Error::last_os_error();
                    unsafe { libc::close(fd) };
                    return Err(Error::Access(err));
                }
            }

            let prot = match access {
                Access::ReadOnly => libc::PROT_READ,
                Access::ReadWrite => libc::PROT_READ | libc::PROT_WRITE,
            };
            let base = unsafe {
                libc::mmap(
                    std::ptr::null_mut(),
                    cap,
                    prot,
                    libc::MAP_SHARED,
                    fd,
                    0,
                )
            };
            if base == libc::MAP_FAILED {
                let err = std::io::Error::last_os_error();
                unsafe { libc::close(fd) };
                return Err(Error::Access(err));
            }

            Ok(Self {
                fd,
                base: base as *mut u8,
                len: cap,
                is_creator,
            })
        }

        fn as_ptr(&self) -> *const u8 {
            self.base
        }

        fn as_mut_ptr(&mut self) -> *mut u8 {
            self.base
        }

        fn len(&self) -> usize {
            self.len
        }

        fn is_creator(&self) -> bool {
            self.is_creator
        }
    }

    impl Drop for PosixShm {
        /// Unmaps and closes the descriptor. Never unlinks the name — a
        /// non-creator has no business destroying a mapping other
        /// processes may still hold open, and the creator leaving it
        /// behind is the documented, ephemeral-but-not-auto-removed
        /// contract this module carries.
        fn drop(&mut self) {
            unsafe {
                libc::munmap(self.base as *mut libc::c_void, self.len);
                libc::close(self.fd);
            }
        }
    }

    // Safety: the mapping is backed by shared memory the kernel
    // synchronizes access to; the bytes inside are coordinated through
    // the embedded `SpscCore`'s atomics, not through `&PosixShm` aliasing.
    unsafe impl Send for PosixShm {}
}

#[cfg(target_os = "linux")]
pub use posix::PosixShm as PlatformShm;

#[cfg(target_os = "windows")]
mod windows_backend {
    use std::ffi::CString;

    use super::{Access, Error, Result, ShmBackend};

    type HandleT = *mut std::ffi::c_void;

    extern "system" {
        fn OpenFileMappingA(access: u32, inherit: i32, name: *const i8) -> HandleT;
        fn CreateFileMappingA(
            file: HandleT,
            attrs: *mut std::ffi::c_void,
            protect: u32,
            size_high: u32,
            size_low: u32,
            name: *const i8,
        ) -> HandleT;
        fn MapViewOfFile(
            mapping: HandleT,
            access: u32,
            offset_high: u32,
            offset_low: u32,
            size: usize,
        ) -> *mut std::ffi::c_void;
        fn UnmapViewOfFile(addr: *mut std::ffi::c_void) -> i32;
        fn CloseHandle(handle: HandleT) -> i32;
    }

    const FILE_MAP_ALL_ACCESS: u32 = 0xF001F;
    const PAGE_READONLY: u32 = 0x02;
    const PAGE_READWRITE: u32 = 0x04;
    const INVALID_HANDLE_VALUE: HandleT = -1isize as HandleT;

    /// Untested on this Linux-hosted build; mirrors the original's
    /// `OpenFileMapping`-then-`CreateFileMapping` fallback.
    pub struct WindowsShm {
        handle: HandleT,
        base: *mut u8,
        len: usize,
        is_creator: bool,
    }

    impl ShmBackend for WindowsShm {
        fn open_or_create(name: &str, access: Access, cap: usize) -> Result<Self> {
            let cname = CString::new(name)
                .map_err(|e| Error::InvalidArgument(format!("invalid shm name: {e}")))?;

            let mut is_creator = false;
            let mut handle = unsafe { OpenFileMappingA(FILE_MAP_ALL_ACCESS, 0, cname.as_ptr()) };
            if handle.is_null() {
                // Windows has no WRITEONLY page protection; it collapses
                // into READWRITE, matching `Access::ReadWrite` already
                // doing the same on this side.
                let protect = match access {
                    Access::ReadOnly => PAGE_READONLY,
                    Access::ReadWrite => PAGE_READWRITE,
                };
                handle = unsafe {
                    CreateFileMappingA(
                        INVALID_HANDLE_VALUE,
                        std::ptr::null_mut(),
                        protect,
                        0,
                        cap as u32,
                        cname.as_ptr(),
                    )
                };
                if handle.is_null() {
                    return Err(Error::Create(std::io::Error::last_os_error()));
                }
                is_creator = true;
            }

            let base = unsafe { MapViewOfFile(handle, FILE_MAP_ALL_ACCESS, 0, 0, cap) };
            if base.is_null() {
                let err = std::io::Error::last_os_error();
                unsafe { CloseHandle(handle) };
                return Err(Error::Access(err));
            }

            Ok(Self {
                handle,
                base: base as *mut u8,
                len: cap,
                is_creator,
            })
        }

        fn as_ptr(&self) -> *const u8 {
            self.base
        }

        fn as_mut_ptr(&mut self) -> *mut u8 {
            self.base
        }

        fn len(&self) -> usize {
            self.len
        }

        fn is_creator(&self) -> bool {
            self.is_creator
        }
    }

    impl Drop for WindowsShm {
        fn drop(&mut self) {
            unsafe {
                UnmapViewOfFile(self.base as *mut std::ffi::c_void);
                CloseHandle(self.handle);
            }
        }
    }

    unsafe impl Send for WindowsShm {}
}

#[cfg(target_os = "windows")]
pub use windows_backend::WindowsShm as PlatformShm;
