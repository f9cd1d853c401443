//! Linux futex-based lane parking
//!
//! Futex word semantics:
//! - 0 = no wake pending
//! - 1 = wake pending
//!
//! `park()` consumes a pending token, otherwise FUTEX_WAITs while the word is
//! 0. `unpark()` sets the word to 1 and only issues FUTEX_WAKE on the 0 → 1
//! transition, since a consumer can only be asleep on a 0 word.

use super::LaneParking;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

const EMPTY: u32 = 0;
const NOTIFIED: u32 = 1;

pub struct FutexParking {
    word: AtomicU32,
}

impl FutexParking {
    pub fn new() -> Self {
        Self { word: AtomicU32::new(EMPTY) }
    }
}

impl Default for FutexParking {
    fn default() -> Self {
        Self::new()
    }
}

impl LaneParking for FutexParking {
    fn park(&self, timeout: Option<Duration>) -> bool {
        if self.word.swap(EMPTY, Ordering::AcqRel) == NOTIFIED {
            return true;
        }

        let timespec = timeout.map(|d| libc::timespec {
            tv_sec: d.as_secs() as _,
            tv_nsec: d.subsec_nanos() as _,
        });
        let timespec_ptr = match &timespec {
            Some(ts) => ts as *const libc::timespec,
            None => std::ptr::null(),
        };

        // Returns early with EAGAIN if the word is no longer EMPTY, with
        // ETIMEDOUT on timeout, EINTR on signals. All of those re-check below.
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.word.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                EMPTY,
                timespec_ptr,
                std::ptr::null::<u32>(),
                0u32,
            );
        }

        self.word.swap(EMPTY, Ordering::AcqRel) == NOTIFIED
    }

    fn unpark(&self) {
        if self.word.swap(NOTIFIED, Ordering::AcqRel) == NOTIFIED {
            return;
        }
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.word.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                1i32,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }
}
