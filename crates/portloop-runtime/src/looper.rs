//! Per-handle delivery engine.
//!
//! A `Looper` owns up to three lanes for one handle:
//!
//! | Lane       | Item          | Callback                       | Pausable |
//! |------------|---------------|--------------------------------|----------|
//! | data       | `Vec<u8>`     | `DataListener::on_data`        | yes      |
//! | data-error | `i32`         | `DataListener::on_data_error`  | no       |
//! | event      | `LineEvent`   | `EventListener::on_event`      | no       |
//!
//! Only the data lane can be paused. Line events are paused at the native
//! producer by the dispatcher; the event lane itself keeps draining.
//!
//! Line filtering keeps two words: the applied mask and the last filtered
//! state. Each raw bitmask `r` produces `LineEvent(last, r & mask)` and then
//! becomes the new `last`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use portloop_core::{
    log_debug, log_trace, DataListener, EventListener, Handle, LineEvent, LineMask, PortResult,
};

use crate::config::LooperConfig;
use crate::lane::{Lane, LaneState, LaneStats};

enum Slot<T> {
    NotStarted,
    Running(Lane<T>),
    Stopped,
}

impl<T> Slot<T> {
    fn lane(&self) -> Option<&Lane<T>> {
        match self {
            Slot::Running(lane) => Some(lane),
            _ => None,
        }
    }

    fn state(&self) -> LaneState {
        match self {
            Slot::NotStarted => LaneState::NotStarted,
            Slot::Running(lane) => lane.state(),
            Slot::Stopped => LaneState::Stopped,
        }
    }

    /// Install a freshly spawned lane. If one is already running the new lane
    /// is handed back for the caller to drop once the slot lock is released.
    fn install(&mut self, lane: Lane<T>) -> Option<Lane<T>> {
        if self.lane().is_some() {
            return Some(lane);
        }
        *self = Slot::Running(lane);
        None
    }

    /// Move a running lane out, leaving `Stopped`. The caller stops it after
    /// releasing the slot lock so producers are not held up by the join.
    fn take_running(&mut self) -> Option<Lane<T>> {
        match std::mem::replace(self, Slot::Stopped) {
            Slot::Running(lane) => Some(lane),
            other => {
                *self = other;
                None
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Looper {
    handle: Handle,
    config: LooperConfig,
    data: Mutex<Slot<Vec<u8>>>,
    data_error: Mutex<Slot<i32>>,
    event: Mutex<Slot<LineEvent>>,
    /// Requested pause state of the data lane; survives lane restarts.
    /// Guarded by the `data` slot lock for writes.
    data_paused: Mutex<bool>,
    line_mask: AtomicU32,
    line_state: AtomicU32,
}

impl Looper {
    pub fn new(handle: Handle, config: LooperConfig) -> Self {
        let mask = config.line_mask.bits();
        log_debug!("looper created for handle {}", handle);
        Self {
            handle,
            config,
            data: Mutex::new(Slot::NotStarted),
            data_error: Mutex::new(Slot::NotStarted),
            event: Mutex::new(Slot::NotStarted),
            data_paused: Mutex::new(false),
            line_mask: AtomicU32::new(mask),
            line_state: AtomicU32::new(0),
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    fn lane_name(&self, queue: &str) -> String {
        format!("{}-{}-{}", self.config.thread_name_prefix, queue, self.handle)
    }

    fn spawn_lane<T, F>(&self, queue: &str, paused: bool, deliver: F) -> PortResult<Lane<T>>
    where
        T: Send + 'static,
        F: FnMut(T) + Send + 'static,
    {
        Lane::spawn(
            self.lane_name(queue),
            self.config.queue_capacity,
            self.config.stack_size,
            paused,
            deliver,
        )
    }

    // ── Data path ────────────────────────────────────────────────────

    /// Start the data and data-error lanes, both delivering to `listener`.
    ///
    /// All-or-nothing: if the second lane cannot be spawned the first is
    /// stopped again. A lane that is already running is left as it is.
    /// Threads are spawned without holding the slot locks; producers only
    /// wait for the install itself.
    pub fn start_data(&self, listener: Arc<dyn DataListener>) -> PortResult<()> {
        let need_data = lock(&self.data).lane().is_none();
        let need_errors = lock(&self.data_error).lane().is_none();

        let data_lane = if need_data {
            let l = Arc::clone(&listener);
            Some(self.spawn_lane("data", self.is_paused(), move |bytes: Vec<u8>| {
                l.on_data(&bytes)
            })?)
        } else {
            None
        };

        // On error, `data_lane` drops here and its thread is stopped.
        let error_lane = if need_errors {
            let l = Arc::clone(&listener);
            Some(self.spawn_lane("data-error", false, move |code: i32| l.on_data_error(code))?)
        } else {
            None
        };

        if let Some(lane) = data_lane {
            let spare = {
                let mut data = lock(&self.data);
                // Pause state may have changed while the thread was spawning.
                if *lock(&self.data_paused) {
                    lane.pause();
                } else {
                    lane.resume();
                }
                data.install(lane)
            };
            drop(spare);
        }
        if let Some(lane) = error_lane {
            let spare = lock(&self.data_error).install(lane);
            drop(spare);
        }
        Ok(())
    }

    /// Stop the data and data-error lanes. No-op for lanes not running.
    pub fn stop_data(&self) {
        let data = lock(&self.data).take_running();
        let errors = lock(&self.data_error).take_running();
        if let Some(mut lane) = data {
            lane.stop();
        }
        if let Some(mut lane) = errors {
            lane.stop();
        }
    }

    /// Hold data delivery after the item in flight. Items keep queueing.
    pub fn pause(&self) {
        let data = lock(&self.data);
        *lock(&self.data_paused) = true;
        if let Some(lane) = data.lane() {
            lane.pause();
        }
        log_debug!("looper {} data delivery paused", self.handle);
    }

    pub fn resume(&self) {
        let data = lock(&self.data);
        *lock(&self.data_paused) = false;
        if let Some(lane) = data.lane() {
            lane.resume();
        }
        log_debug!("looper {} data delivery resumed", self.handle);
    }

    pub fn is_paused(&self) -> bool {
        *lock(&self.data_paused)
    }

    pub fn push_data(&self, bytes: Vec<u8>) {
        match lock(&self.data).lane() {
            Some(lane) => lane.push(bytes),
            None => log_trace!("handle {}: no data lane, dropped {} bytes", self.handle, bytes.len()),
        }
    }

    pub fn push_data_error(&self, code: i32) {
        match lock(&self.data_error).lane() {
            Some(lane) => lane.push(code),
            None => log_trace!("handle {}: no data-error lane, dropped code {}", self.handle, code),
        }
    }

    // ── Event path ───────────────────────────────────────────────────

    pub fn start_events(&self, listener: Arc<dyn EventListener>) -> PortResult<()> {
        if lock(&self.event).lane().is_some() {
            return Ok(());
        }
        let lane = self.spawn_lane("event", false, move |ev: LineEvent| listener.on_event(ev))?;
        let spare = lock(&self.event).install(lane);
        drop(spare);
        Ok(())
    }

    pub fn stop_events(&self) {
        let lane = lock(&self.event).take_running();
        if let Some(mut lane) = lane {
            lane.stop();
        }
    }

    /// Filter `raw` through the current mask and queue the resulting event.
    ///
    /// Runs under the event slot lock, so concurrent pushes still form one
    /// consistent previous → current chain.
    pub fn push_line_event(&self, raw: u32) {
        let event = lock(&self.event);
        let Some(lane) = event.lane() else {
            log_trace!("handle {}: no event lane, dropped raw line state {:#x}", self.handle, raw);
            return;
        };
        let current = raw & self.line_mask.load(Ordering::Acquire);
        let previous = self.line_state.swap(current, Ordering::AcqRel);
        lane.push(LineEvent::new(
            LineMask::from_bits_truncate(previous),
            LineMask::from_bits_truncate(current),
        ));
    }

    /// Seed the last filtered state from a status snapshot.
    pub fn seed_line_state(&self, status: LineMask) {
        let filtered = status.bits() & self.line_mask.load(Ordering::Acquire);
        self.line_state.store(filtered, Ordering::Release);
    }

    /// Applies to events computed after this call.
    pub fn set_line_mask(&self, mask: LineMask) {
        self.line_mask.store(mask.bits(), Ordering::Release);
    }

    pub fn line_mask(&self) -> LineMask {
        LineMask::from_bits_truncate(self.line_mask.load(Ordering::Acquire))
    }

    pub fn last_line_state(&self) -> LineMask {
        LineMask::from_bits_truncate(self.line_state.load(Ordering::Acquire))
    }

    // ── Introspection ────────────────────────────────────────────────

    pub fn data_state(&self) -> LaneState {
        lock(&self.data).state()
    }

    pub fn data_error_state(&self) -> LaneState {
        lock(&self.data_error).state()
    }

    pub fn event_state(&self) -> LaneState {
        lock(&self.event).state()
    }

    pub fn data_stats(&self) -> Option<LaneStats> {
        lock(&self.data).lane().map(Lane::stats)
    }

    pub fn data_error_stats(&self) -> Option<LaneStats> {
        lock(&self.data_error).lane().map(Lane::stats)
    }

    pub fn event_stats(&self) -> Option<LaneStats> {
        lock(&self.event).lane().map(Lane::stats)
    }

    /// True when no lane is running.
    pub fn is_idle(&self) -> bool {
        lock(&self.data).lane().is_none()
            && lock(&self.data_error).lane().is_none()
            && lock(&self.event).lane().is_none()
    }

    pub fn stop_all(&self) {
        self.stop_data();
        self.stop_events();
    }
}

impl Drop for Looper {
    fn drop(&mut self) {
        self.stop_all();
        log_debug!("looper for handle {} dropped", self.handle);
    }
}

impl std::fmt::Debug for Looper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Looper")
            .field("handle", &self.handle)
            .field("data", &self.data_state())
            .field("data_error", &self.data_error_state())
            .field("event", &self.event_state())
            .field("line_mask", &self.line_mask())
            .finish()
    }
}
