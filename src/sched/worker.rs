//! CPU affinity binding for a scheduler's dedicated thread.
//!
//! `cpu_id < 0` disables pinning entirely. Anything else is forwarded to the
//! platform's native affinity call; a failure is logged and otherwise
//! ignored, matching the original behavior of warning rather than aborting.

pub trait Affinity {
    fn bind_current_thread(cpu_id: i32);
}

#[cfg(target_os = "linux")]
pub struct PlatformAffinity;

#[cfg(target_os = "linux")]
impl Affinity for PlatformAffinity {
    fn bind_current_thread(cpu_id: i32) {
        if cpu_id < 0 {
            return;
        }
        unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_ZERO(&mut set);
            libc::CPU_SET(cpu_id as usize, &mut set);
            let ret = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
            if ret != 0 {
                log::warn!(
                    "failed to bind scheduler thread to cpu {cpu_id}: {}",
                    std::io::Error::last_os_error()
                );
            } else {
                log::debug!("scheduler thread bound to cpu {cpu_id}");
            }
        }
    }
}

#[cfg(target_os = "windows")]
pub struct PlatformAffinity;

#[cfg(target_os = "windows")]
impl Affinity for PlatformAffinity {
    fn bind_current_thread(cpu_id: i32) {
        if cpu_id < 0 {
            return;
        }
        // Untested on this Linux-hosted build; mirrors
        // SetThreadAffinityMask(GetCurrentThread(), 1 << cpu_id).
        extern "system" {
            fn GetCurrentThread() -> *mut std::ffi::c_void;
            fn SetThreadAffinityMask(thread: *mut std::ffi::c_void, mask: usize) -> usize;
        }
        unsafe {
            let mask = 1usize << cpu_id;
            let handle = GetCurrentThread();
            if SetThreadAffinityMask(handle, mask) == 0 {
                log::warn!("failed to bind scheduler thread to cpu {cpu_id}");
            } else {
                log::debug!("scheduler thread bound to cpu {cpu_id}");
            }
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
pub struct PlatformAffinity;

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
impl Affinity for PlatformAffinity {
    fn bind_current_thread(_cpu_id: i32) {
        log::debug!("cpu affinity binding is not supported on this platform");
    }
}
