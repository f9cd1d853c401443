//! Condvar-based lane parking
//!
//! Portable implementation used where futex is unavailable.

use super::LaneParking;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

pub struct CondvarParking {
    /// true = wake pending
    notified: Mutex<bool>,
    condvar: Condvar,
}

impl CondvarParking {
    pub fn new() -> Self {
        Self {
            notified: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }
}

impl Default for CondvarParking {
    fn default() -> Self {
        Self::new()
    }
}

impl LaneParking for CondvarParking {
    fn park(&self, timeout: Option<Duration>) -> bool {
        let guard = self.notified.lock().unwrap_or_else(PoisonError::into_inner);
        let mut guard = match timeout {
            None => self
                .condvar
                .wait_while(guard, |notified| !*notified)
                .unwrap_or_else(PoisonError::into_inner),
            Some(t) => {
                self.condvar
                    .wait_timeout_while(guard, t, |notified| !*notified)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
        };
        std::mem::replace(&mut *guard, false)
    }

    fn unpark(&self) {
        let mut guard = self.notified.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = true;
        drop(guard);
        self.condvar.notify_one();
    }
}
