//! Looper configuration

use portloop_core::constants::{
    DEFAULT_QUEUE_CAPACITY, DEFAULT_THREAD_PREFIX, ENV_LINE_MASK, ENV_QUEUE_CAPACITY,
    ENV_STACK_SIZE,
};
use portloop_core::env::{env_get, env_get_opt};
use portloop_core::LineMask;

/// Settings applied to every looper a manager creates.
#[derive(Debug, Clone)]
pub struct LooperConfig {
    /// Capacity of each of the three queues. Oldest item is evicted when full.
    pub queue_capacity: usize,

    /// Line mask a new looper starts with.
    pub line_mask: LineMask,

    /// Delivery threads are named `<prefix>-<queue>-<handle>`.
    pub thread_name_prefix: String,

    /// Stack size for delivery threads (None = std default)
    pub stack_size: Option<usize>,
}

impl Default for LooperConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            line_mask: LineMask::ALL,
            thread_name_prefix: DEFAULT_THREAD_PREFIX.to_string(),
            stack_size: None,
        }
    }
}

impl LooperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `PORTLOOP_QUEUE_CAPACITY`, `PORTLOOP_LINE_MASK`
    /// and `PORTLOOP_STACK_SIZE`.
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            queue_capacity: env_get(ENV_QUEUE_CAPACITY, base.queue_capacity),
            line_mask: env_get(ENV_LINE_MASK, base.line_mask),
            stack_size: env_get_opt(ENV_STACK_SIZE).or(base.stack_size),
            ..base
        }
    }

    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n;
        self
    }

    pub fn line_mask(mut self, mask: LineMask) -> Self {
        self.line_mask = mask;
        self
    }

    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be at least 1");
        }
        if self.thread_name_prefix.is_empty() {
            return Err("thread_name_prefix must not be empty");
        }
        if matches!(self.stack_size, Some(0)) {
            return Err("stack_size must be non-zero when set");
        }
        Ok(())
    }
}
