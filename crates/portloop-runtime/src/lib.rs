//! # portloop-runtime
//!
//! Threaded delivery engine for portloop.
//!
//! This crate provides:
//! - Parking tokens for delivery threads (futex on Linux, condvar elsewhere)
//! - Lanes: one drop-oldest bounded queue plus its delivery thread
//! - Loopers: up to three lanes per handle and line-event filtering
//! - The handle registry, which is also the native layer's completion sink
//! - The completion dispatcher, which pairs lane changes with native commands
//! - `PortManager`, the owning facade

pub mod config;
pub mod parking;
pub mod lane;
pub mod looper;
pub mod registry;
pub mod dispatcher;
pub mod manager;

// Re-exports
pub use config::LooperConfig;
pub use lane::{LaneState, LaneStats};
pub use looper::Looper;
pub use registry::{HandleInfo, HandleRegistry};
pub use dispatcher::CompletionDispatcher;
pub use manager::PortManager;
pub use parking::{LaneParking, PlatformParking};
