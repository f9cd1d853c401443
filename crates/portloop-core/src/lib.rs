//! # portloop-core — Trait definitions for portloop
//!
//! This crate defines the types and trait boundaries shared by every part of
//! the portloop event dispatch system. It carries no threads and no OS code.
//!
//! ## Modules
//!
//! - `handle` - Opaque port session identifier
//! - `line` - Modem control line masks, status snapshots and line events
//! - `listener` - Application callback traits
//! - `native` - The seam to the native I/O layer
//! - `completion` - Producer-side ingestion surface
//! - `error` - Error types
//! - `log` - Leveled stderr logging macros
//! - `env` - Environment variable utilities
//!
//! ## Design principle
//!
//! > Producers push, loopers deliver, the dispatcher decides.
//!
//! The native layer only ever sees a [`CompletionSink`]; applications only
//! ever see [`DataListener`] / [`EventListener`]. Everything in between lives
//! in `portloop-runtime`.

pub mod handle;
pub mod line;
pub mod listener;
pub mod native;
pub mod completion;
pub mod error;
pub mod log;
pub mod env;

// Re-exports for convenience
pub use handle::Handle;
pub use line::{LineEvent, LineMask, LineStatus};
pub use listener::{DataListener, EventListener, ListenerKind};
pub use native::{NativeError, NativeIo, NativeOp, NativeResult};
pub use completion::CompletionSink;
pub use error::{PortError, PortResult};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};

/// Shared constants
pub mod constants {
    /// Default capacity of each looper queue.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 5000;

    /// Default prefix for delivery thread names.
    pub const DEFAULT_THREAD_PREFIX: &str = "portloop";

    /// Environment variable overriding the queue capacity.
    pub const ENV_QUEUE_CAPACITY: &str = "PORTLOOP_QUEUE_CAPACITY";

    /// Environment variable overriding the default line mask.
    pub const ENV_LINE_MASK: &str = "PORTLOOP_LINE_MASK";

    /// Environment variable overriding delivery thread stack size.
    pub const ENV_STACK_SIZE: &str = "PORTLOOP_STACK_SIZE";

    /// Environment variable selecting the log level.
    pub const ENV_LOG_LEVEL: &str = "PORTLOOP_LOG_LEVEL";

    /// Environment variable enabling stderr flush after every log line.
    pub const ENV_FLUSH_EPRINT: &str = "PORTLOOP_FLUSH_EPRINT";
}
