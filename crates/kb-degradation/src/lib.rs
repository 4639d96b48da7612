//! C9: the adaptive degradation controller.
//!
//! A finite-state machine over periodic CPU/memory/queue-depth samples that
//! produces an [`kb_exec::Advisory`] for the execution façade's admission
//! path, per spec §4.9. See [`controller::DegradationController`] for the
//! entry point.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod controller;
pub mod sample;
pub mod state;

pub use controller::DegradationController;
pub use sample::{queue_depth_cache_key, FixedResourceSampler, ResourceSample, ResourceSampler};
pub use state::{indicated_level, DebouncedState, DegradationLevel};
