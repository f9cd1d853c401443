//! Native I/O layer abstraction.
//!
//! A `NativeIo` owns the blocking reads and the modem-line wait for every
//! open handle. It is driven by the dispatcher through the control calls
//! below and reports what it observes through a [`CompletionSink`].
//!
//! # Implementors
//!
//! - `SimNative` (`portloop-sim`): in-memory port, scriptable line status,
//!   injected bytes and fail points. Used by tests and demos.
//!
//! - Platform backends (termios/TIOCMIWAIT, Win32 `WaitCommEvent`, vendor
//!   D2XX) live outside this workspace and implement the same trait.
//!
//! [`CompletionSink`]: crate::completion::CompletionSink

use core::fmt;

use crate::handle::Handle;
use crate::line::LineStatus;

/// Control call identifiers, used for diagnostics and fail-point selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeOp {
    StartDataWorker,
    StopDataWorker,
    StartEventWorker,
    StopEventWorker,
    PauseEvents,
    ResumeEvents,
    GetLineStatus,
}

impl NativeOp {
    pub const ALL: [NativeOp; 7] = [
        NativeOp::StartDataWorker,
        NativeOp::StopDataWorker,
        NativeOp::StartEventWorker,
        NativeOp::StopEventWorker,
        NativeOp::PauseEvents,
        NativeOp::ResumeEvents,
        NativeOp::GetLineStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NativeOp::StartDataWorker => "start_data_worker",
            NativeOp::StopDataWorker => "stop_data_worker",
            NativeOp::StartEventWorker => "start_event_worker",
            NativeOp::StopEventWorker => "stop_event_worker",
            NativeOp::PauseEvents => "pause_events",
            NativeOp::ResumeEvents => "resume_events",
            NativeOp::GetLineStatus => "get_line_status",
        }
    }
}

impl fmt::Display for NativeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a native control call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    /// Implementation-defined code (errno, Win32 error, vendor status).
    pub code: i32,
    /// Human readable detail.
    pub detail: String,
}

impl NativeError {
    pub fn new(code: i32, detail: impl Into<String>) -> Self {
        Self { code, detail: detail.into() }
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.detail, self.code)
    }
}

impl std::error::Error for NativeError {}

pub type NativeResult<T> = Result<T, NativeError>;

/// Control surface of the native I/O layer.
///
/// **Contract:**
/// - Calls for one handle are serialized by the dispatcher; calls for
///   different handles may arrive concurrently.
/// - After `start_data_worker` succeeds the layer pushes bytes and read
///   errors for that handle until `stop_data_worker` succeeds.
/// - After `start_event_worker` succeeds the layer pushes raw line bitmasks
///   until `stop_event_worker` succeeds, except between `pause_events` and
///   `resume_events`.
/// - None of these calls may invoke listener callbacks directly.
pub trait NativeIo: Send + Sync {
    fn start_data_worker(&self, handle: Handle) -> NativeResult<()>;

    fn stop_data_worker(&self, handle: Handle) -> NativeResult<()>;

    fn start_event_worker(&self, handle: Handle) -> NativeResult<()>;

    fn stop_event_worker(&self, handle: Handle) -> NativeResult<()>;

    /// Stop producing line events without tearing the event worker down.
    fn pause_events(&self, handle: Handle) -> NativeResult<()>;

    fn resume_events(&self, handle: Handle) -> NativeResult<()>;

    /// Current state of CTS, DSR, DCD and RI.
    fn get_line_status(&self, handle: Handle) -> NativeResult<LineStatus>;
}
