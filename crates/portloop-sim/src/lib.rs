//! `SimNative` — in-memory `NativeIo` implementation.
//!
//! Stands in for a real port driver. Each handle gets a simulated port with
//! a data worker flag, an event worker flag, an event pause flag and the
//! current modem line state. Tests and demos drive it from the outside:
//!
//!   - `inject_data` / `inject_read_error` push through the sink only while
//!     the data worker runs, like a blocked `read()` returning.
//!   - `set_lines` updates the line state and, while the event worker runs
//!     unpaused, pushes the raw bitmask, like a modem-status wait returning.
//!   - `fail_on(op, code)` makes every call of `op` fail until cleared.
//!
//! Every control call is recorded in a call log so tests can assert ordering.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use portloop_core::{
    log_trace, CompletionSink, Handle, LineMask, LineStatus, NativeError, NativeIo, NativeOp,
    NativeResult,
};

/// Error code reported for calls on a handle the sim has never seen.
pub const ENODEV: i32 = 19;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimPort {
    pub data_active: bool,
    pub event_active: bool,
    pub events_paused: bool,
    pub lines: LineMask,
}

pub struct SimNative {
    sink: Arc<dyn CompletionSink>,
    ports: Mutex<HashMap<Handle, SimPort>>,
    fail_points: Mutex<HashMap<NativeOp, i32>>,
    calls: Mutex<Vec<(NativeOp, Handle)>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimNative {
    pub fn new(sink: Arc<dyn CompletionSink>) -> Self {
        Self {
            sink,
            ports: Mutex::new(HashMap::new()),
            fail_points: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Simulate a successful open. Replaces any earlier port for `handle`.
    pub fn open(&self, handle: Handle, lines: LineMask) {
        lock(&self.ports).insert(handle, SimPort { lines, ..SimPort::default() });
    }

    /// Simulate close. Workers stop producing.
    pub fn close(&self, handle: Handle) -> bool {
        lock(&self.ports).remove(&handle).is_some()
    }

    pub fn port(&self, handle: Handle) -> Option<SimPort> {
        lock(&self.ports).get(&handle).copied()
    }

    // ── Fail points ──────────────────────────────────────────────────

    pub fn fail_on(&self, op: NativeOp, code: i32) {
        lock(&self.fail_points).insert(op, code);
    }

    pub fn clear_fail(&self, op: NativeOp) {
        lock(&self.fail_points).remove(&op);
    }

    pub fn clear_all_fails(&self) {
        lock(&self.fail_points).clear();
    }

    // ── Call log ─────────────────────────────────────────────────────

    pub fn calls(&self) -> Vec<(NativeOp, Handle)> {
        lock(&self.calls).clone()
    }

    /// Only the op names, in call order.
    pub fn call_ops(&self) -> Vec<NativeOp> {
        lock(&self.calls).iter().map(|(op, _)| *op).collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    // ── Producer side ────────────────────────────────────────────────

    /// Deliver bytes as if a read completed. Returns false (and drops the
    /// bytes) when the data worker is not running.
    pub fn inject_data(&self, handle: Handle, data: &[u8]) -> bool {
        if !self.port(handle).is_some_and(|p| p.data_active) {
            log_trace!("sim {}: data worker idle, {} bytes discarded", handle, data.len());
            return false;
        }
        self.sink.push_data(handle, data.to_vec());
        true
    }

    pub fn inject_read_error(&self, handle: Handle, code: i32) -> bool {
        if !self.port(handle).is_some_and(|p| p.data_active) {
            return false;
        }
        self.sink.push_data_error(handle, code);
        true
    }

    /// Change the line state. Returns true if a line event was pushed.
    pub fn set_lines(&self, handle: Handle, lines: LineMask) -> bool {
        let emit = {
            let mut ports = lock(&self.ports);
            let Some(port) = ports.get_mut(&handle) else {
                return false;
            };
            port.lines = lines;
            port.event_active && !port.events_paused
        };
        if emit {
            self.sink.push_line_event(handle, lines.bits());
        }
        emit
    }

    /// Push an arbitrary raw bitmask, bypassing the worker flags.
    pub fn push_raw_line_event(&self, handle: Handle, raw: u32) {
        self.sink.push_line_event(handle, raw);
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Log the call, apply the fail point, then run `f` on the port.
    fn control<T>(
        &self,
        op: NativeOp,
        handle: Handle,
        f: impl FnOnce(&mut SimPort) -> T,
    ) -> NativeResult<T> {
        lock(&self.calls).push((op, handle));
        if let Some(code) = lock(&self.fail_points).get(&op).copied() {
            return Err(NativeError::new(code, format!("simulated {} failure", op)));
        }
        let mut ports = lock(&self.ports);
        let port = ports
            .get_mut(&handle)
            .ok_or_else(|| NativeError::new(ENODEV, format!("no simulated port for handle {}", handle)))?;
        Ok(f(port))
    }
}

impl NativeIo for SimNative {
    fn start_data_worker(&self, handle: Handle) -> NativeResult<()> {
        self.control(NativeOp::StartDataWorker, handle, |p| p.data_active = true)
    }

    fn stop_data_worker(&self, handle: Handle) -> NativeResult<()> {
        self.control(NativeOp::StopDataWorker, handle, |p| p.data_active = false)
    }

    fn start_event_worker(&self, handle: Handle) -> NativeResult<()> {
        self.control(NativeOp::StartEventWorker, handle, |p| {
            p.event_active = true;
            p.events_paused = false;
        })
    }

    fn stop_event_worker(&self, handle: Handle) -> NativeResult<()> {
        self.control(NativeOp::StopEventWorker, handle, |p| {
            p.event_active = false;
            p.events_paused = false;
        })
    }

    fn pause_events(&self, handle: Handle) -> NativeResult<()> {
        self.control(NativeOp::PauseEvents, handle, |p| p.events_paused = true)
    }

    fn resume_events(&self, handle: Handle) -> NativeResult<()> {
        self.control(NativeOp::ResumeEvents, handle, |p| p.events_paused = false)
    }

    fn get_line_status(&self, handle: Handle) -> NativeResult<LineStatus> {
        self.control(NativeOp::GetLineStatus, handle, |p| LineStatus::from_mask(p.lines))
    }
}

impl std::fmt::Debug for SimNative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimNative")
            .field("ports", &*lock(&self.ports))
            .field("fail_points", &*lock(&self.fail_points))
            .finish()
    }
}
