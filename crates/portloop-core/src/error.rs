//! Error types for portloop

use core::fmt;

use crate::handle::Handle;
use crate::listener::ListenerKind;
use crate::native::{NativeError, NativeOp};

/// Result type for portloop operations
pub type PortResult<T> = Result<T, PortError>;

/// Errors returned synchronously by registration and control calls.
///
/// Read errors seen while a data worker runs are not here; they are
/// delivered to `DataListener::on_data_error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    /// No HandleInfo exists for this handle
    HandleNotFound(Handle),

    /// The handle is already attached to the registry
    HandleAlreadyAttached(Handle),

    /// The listener is not the one registered on any handle
    ListenerNotRegistered,

    /// A listener of this kind is already registered on the handle
    ListenerAlreadyRegistered { handle: Handle, kind: ListenerKind },

    /// Detach refused while listeners are still registered
    ListenersStillRegistered(Handle),

    /// A native control call failed; local state has been rolled back
    NativeIo { op: NativeOp, source: NativeError },

    /// A delivery thread could not be spawned
    WorkerSpawn(String),

    /// Configuration rejected by `validate()`
    InvalidConfig(&'static str),
}

impl PortError {
    #[inline]
    pub fn native(op: NativeOp, source: NativeError) -> Self {
        PortError::NativeIo { op, source }
    }

    /// True if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PortError::NativeIo { .. } | PortError::WorkerSpawn(_))
    }
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortError::HandleNotFound(h) => write!(f, "handle {} not found", h),
            PortError::HandleAlreadyAttached(h) => write!(f, "handle {} already attached", h),
            PortError::ListenerNotRegistered => write!(f, "listener not registered"),
            PortError::ListenerAlreadyRegistered { handle, kind } => {
                write!(f, "{} listener already registered on handle {}", kind, handle)
            }
            PortError::ListenersStillRegistered(h) => {
                write!(f, "handle {} still has registered listeners", h)
            }
            PortError::NativeIo { op, source } => write!(f, "native {} failed: {}", op, source),
            PortError::WorkerSpawn(msg) => write!(f, "failed to spawn delivery thread: {}", msg),
            PortError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for PortError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PortError::NativeIo { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PortError {
    fn from(e: std::io::Error) -> Self {
        PortError::WorkerSpawn(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let e = PortError::HandleNotFound(Handle::new(3));
        assert_eq!(format!("{}", e), "handle 3 not found");

        let e = PortError::ListenerAlreadyRegistered {
            handle: Handle::new(9),
            kind: ListenerKind::Event,
        };
        assert_eq!(format!("{}", e), "event listener already registered on handle 9");

        let e = PortError::native(NativeOp::StartDataWorker, NativeError::new(16, "busy"));
        assert_eq!(format!("{}", e), "native start_data_worker failed: busy (code 16)");
    }

    #[test]
    fn test_error_source_chain() {
        let e = PortError::native(NativeOp::PauseEvents, NativeError::new(1, "nope"));
        assert!(e.source().is_some());
        assert!(PortError::ListenerNotRegistered.source().is_none());
    }

    #[test]
    fn test_retryable() {
        assert!(PortError::native(NativeOp::GetLineStatus, NativeError::new(1, "x")).is_retryable());
        assert!(!PortError::HandleNotFound(Handle::new(1)).is_retryable());
    }
}
