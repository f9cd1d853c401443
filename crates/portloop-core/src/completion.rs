//! Completion delivery abstraction.
//!
//! A `CompletionSink` is what the native layer sees of portloop: three push
//! calls keyed by handle. Default impl: `HandleRegistry` routes each push to
//! the handle's looper queue.

use crate::handle::Handle;

/// Accepts native completions for any open handle.
///
/// **Contract:**
/// - Every push must NEVER block on a consumer. Full queues evict their
///   oldest item instead.
/// - Pushes for a handle without a matching running queue are dropped.
/// - Safe to call concurrently for different handles, and from one native
///   thread per handle.
pub trait CompletionSink: Send + Sync {
    /// Bytes read from the port.
    fn push_data(&self, handle: Handle, data: Vec<u8>);

    /// A read error observed by the data worker.
    fn push_data_error(&self, handle: Handle, code: i32);

    /// Raw, unfiltered line bitmask (see [`LineMask`](crate::line::LineMask)
    /// for the bit layout).
    fn push_line_event(&self, handle: Handle, raw: u32);
}
