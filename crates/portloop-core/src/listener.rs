//! Application callback traits
//!
//! Listeners are registered per handle, at most one of each kind. They are
//! invoked from dedicated delivery threads, one call at a time per queue, so a
//! slow callback only delays its own queue.

use core::fmt;

use crate::line::LineEvent;

/// Receives inbound bytes and read errors for one handle.
///
/// `on_data` and `on_data_error` run on two different delivery threads and
/// may be invoked concurrently with each other.
pub trait DataListener: Send + Sync {
    /// Bytes read by the native layer, in arrival order.
    fn on_data(&self, data: &[u8]);

    /// A read error reported by the native layer while the data worker runs.
    ///
    /// Errors are delivered here, never returned to an API caller.
    fn on_data_error(&self, code: i32);
}

/// Receives filtered modem line changes for one handle.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: LineEvent);
}

/// Which listener slot an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Data,
    Event,
}

impl ListenerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerKind::Data => "data",
            ListenerKind::Event => "event",
        }
    }
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
