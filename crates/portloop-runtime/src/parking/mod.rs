//! Delivery thread parking
//!
//! Each lane has exactly one consumer, so parking is a single-waiter token:
//! `unpark()` leaves a wake pending if the consumer is not asleep yet, and the
//! next `park()` consumes it without sleeping. This closes the window between
//! "queue looked empty / lane looked paused" and "went to sleep".

use std::time::Duration;

/// Single-consumer sleep/wake primitive.
pub trait LaneParking: Send + Sync {
    /// Sleep until unparked or `timeout` elapses.
    ///
    /// Returns `true` if a wake token was consumed. Callers re-check their
    /// condition either way.
    fn park(&self, timeout: Option<Duration>) -> bool;

    /// Leave a wake token and wake the consumer if it is asleep.
    ///
    /// Tokens do not accumulate: several unparks before one park are one wake.
    fn unpark(&self);
}

pub mod fallback;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexParking as PlatformParking;
    } else {
        pub use fallback::CondvarParking as PlatformParking;
    }
}
