//! Lane: one bounded queue plus the thread that drains it.
//!
//! ```text
//!  producer (native)            lane thread
//!  ─────────────────            ───────────
//!  push(item)                   loop:
//!    force_push ──► [queue] ──►   stop?   → exit
//!    unpark                       paused? → park
//!                                 pop     → deliver(item)
//!                                 empty   → park
//! ```
//!
//! The queue is a fixed-capacity `ArrayQueue`; `force_push` replaces the
//! oldest element when full, so the producer never waits.
//!
//! The pause flag lives under a mutex that the consumer also holds while it
//! pops. Once `pause()` returns, no further item leaves the queue until
//! `resume()`; the item already handed to the callback finishes normally.

use crossbeam_queue::ArrayQueue;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use portloop_core::{log_debug, log_error, log_trace, PortError, PortResult};

use crate::parking::{LaneParking, PlatformParking};

/// Lifecycle of one queue + thread pair as seen from its looper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneState {
    NotStarted,
    Running,
    Paused,
    Stopped,
}

/// Point-in-time counters for one lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneStats {
    /// Items waiting in the queue
    pub pending: usize,
    /// Items handed to the listener
    pub delivered: u64,
    /// Items discarded by drop-oldest overflow
    pub evicted: u64,
}

struct LaneShared<T> {
    queue: ArrayQueue<T>,
    parking: PlatformParking,
    paused: Mutex<bool>,
    stop: AtomicBool,
    delivered: AtomicU64,
    evicted: AtomicU64,
}

impl<T> LaneShared<T> {
    fn paused(&self) -> MutexGuard<'_, bool> {
        self.paused.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A running queue + delivery thread.
///
/// Dropping a lane stops it.
pub struct Lane<T> {
    name: String,
    shared: Arc<LaneShared<T>>,
    thread: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Lane<T> {
    /// Spawn the delivery thread. `deliver` runs on that thread for every
    /// dequeued item, one at a time.
    pub fn spawn<F>(
        name: String,
        capacity: usize,
        stack_size: Option<usize>,
        start_paused: bool,
        deliver: F,
    ) -> PortResult<Self>
    where
        F: FnMut(T) + Send + 'static,
    {
        if capacity == 0 {
            return Err(PortError::InvalidConfig("queue_capacity must be at least 1"));
        }
        let shared = Arc::new(LaneShared {
            queue: ArrayQueue::new(capacity),
            parking: PlatformParking::new(),
            paused: Mutex::new(start_paused),
            stop: AtomicBool::new(false),
            delivered: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        });

        let mut builder = thread::Builder::new().name(name.clone());
        if let Some(bytes) = stack_size {
            builder = builder.stack_size(bytes);
        }

        let worker_shared = Arc::clone(&shared);
        let thread = builder
            .spawn(move || delivery_loop(worker_shared, deliver))
            .map_err(|e| PortError::WorkerSpawn(format!("{}: {}", name, e)))?;

        log_debug!("lane {} started (capacity {})", name, capacity);
        Ok(Self { name, shared, thread: Some(thread) })
    }
}

impl<T> Lane<T> {
    /// Append `item`, evicting the oldest pending item if the queue is full.
    /// Never blocks.
    pub fn push(&self, item: T) {
        if self.shared.stop.load(Ordering::Acquire) {
            return;
        }
        if self.shared.queue.force_push(item).is_some() {
            let evicted = self.shared.evicted.fetch_add(1, Ordering::Relaxed) + 1;
            log_trace!("lane {} full, evicted oldest ({} total)", self.name, evicted);
        }
        self.shared.parking.unpark();
    }

    pub fn pause(&self) {
        *self.shared.paused() = true;
    }

    pub fn resume(&self) {
        *self.shared.paused() = false;
        self.shared.parking.unpark();
    }

    pub fn is_paused(&self) -> bool {
        *self.shared.paused()
    }

    pub fn state(&self) -> LaneState {
        if self.thread.is_none() {
            LaneState::Stopped
        } else if self.is_paused() {
            LaneState::Paused
        } else {
            LaneState::Running
        }
    }

    pub fn stats(&self) -> LaneStats {
        LaneStats {
            pending: self.shared.queue.len(),
            delivered: self.shared.delivered.load(Ordering::Relaxed),
            evicted: self.shared.evicted.load(Ordering::Relaxed),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signal the thread to exit and wait for it.
    ///
    /// The thread finishes the callback it is in, then exits without
    /// draining what is left. When called from the lane's own thread (a
    /// listener unregistering itself) the join is skipped and the thread
    /// exits once the callback returns. Calling this twice is a no-op.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.shared.stop.store(true, Ordering::Release);
        self.shared.parking.unpark();

        if thread.thread().id() == thread::current().id() {
            log_debug!("lane {} stopped from its own callback, detaching", self.name);
            return;
        }
        if thread.join().is_err() {
            log_error!("lane {} thread panicked", self.name);
        }
        log_debug!("lane {} stopped", self.name);
    }
}

impl<T> Drop for Lane<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn delivery_loop<T, F>(shared: Arc<LaneShared<T>>, mut deliver: F)
where
    F: FnMut(T),
{
    loop {
        if shared.stop.load(Ordering::Acquire) {
            break;
        }

        let next = {
            let paused = shared.paused();
            if *paused {
                None
            } else {
                shared.queue.pop()
            }
        };

        match next {
            Some(item) => {
                if panic::catch_unwind(AssertUnwindSafe(|| deliver(item))).is_err() {
                    log_error!("listener callback panicked, continuing with next item");
                }
                shared.delivered.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                shared.parking.park(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    fn recording_lane(
        capacity: usize,
        start_paused: bool,
    ) -> (Lane<u32>, mpsc::Receiver<u32>) {
        let (tx, rx) = mpsc::channel();
        let lane = Lane::spawn("test-lane".into(), capacity, None, start_paused, move |v| {
            let _ = tx.send(v);
        })
        .unwrap();
        (lane, rx)
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    #[test]
    fn test_fifo_delivery() {
        let (lane, rx) = recording_lane(64, false);
        for i in 0..50 {
            lane.push(i);
        }
        let got: Vec<u32> = (0..50)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(got, (0..50).collect::<Vec<_>>());
        assert!(wait_until(|| lane.stats().delivered == 50));
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let (lane, rx) = recording_lane(4, true);
        for i in 1..=5 {
            lane.push(i);
        }
        let stats = lane.stats();
        assert_eq!(stats.pending, 4);
        assert_eq!(stats.evicted, 1);

        lane.resume();
        let got: Vec<u32> = (0..4)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(got, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_paused_lane_holds_items() {
        let (lane, rx) = recording_lane(16, false);
        lane.pause();
        assert_eq!(lane.state(), LaneState::Paused);
        lane.push(7);
        lane.push(8);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(lane.stats().pending, 2);

        lane.resume();
        assert_eq!(lane.state(), LaneState::Running);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 8);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut lane, _rx) = recording_lane(8, false);
        lane.stop();
        assert_eq!(lane.state(), LaneState::Stopped);
        lane.stop();
        assert_eq!(lane.state(), LaneState::Stopped);
        // Late push after stop is dropped.
        lane.push(1);
        assert_eq!(lane.stats().pending, 0);
    }

    #[test]
    fn test_stop_wakes_paused_thread() {
        let (mut lane, _rx) = recording_lane(8, true);
        lane.push(1);
        let start = Instant::now();
        lane.stop();
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_panicking_callback_does_not_kill_lane() {
        let (tx, rx) = mpsc::channel();
        let lane = Lane::spawn("panicky".into(), 8, None, false, move |v: u32| {
            if v == 1 {
                panic!("boom");
            }
            let _ = tx.send(v);
        })
        .unwrap();
        lane.push(1);
        lane.push(2);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 2);
        assert_eq!(lane.state(), LaneState::Running);
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let res = Lane::spawn("zero".into(), 0, None, false, |_: u8| {});
        assert!(matches!(res, Err(PortError::InvalidConfig(_))));
    }

    #[test]
    fn test_thread_is_named() {
        let (tx, rx) = mpsc::channel();
        let lane = Lane::spawn("portloop-data-9".into(), 2, None, false, move |_: u8| {
            let _ = tx.send(thread::current().name().map(str::to_owned));
        })
        .unwrap();
        lane.push(0);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap().as_deref(),
            Some("portloop-data-9")
        );
        assert_eq!(lane.name(), "portloop-data-9");
        assert_eq!(lane.capacity(), 2);
    }
}
