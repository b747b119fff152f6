//! Work queue runner -- owns the worker threads and the submission API.
//!
//! Split into focused submodules:
//! - `core`: WorkQueue struct, construction, worker lifecycle, and accessors
//! - `submission`: item pool access, submit/remove, and the pause gate
//! - `execution`: completion barrier, purging, and the per-frame hook

mod core;
mod execution;
mod submission;

pub use self::core::WorkQueue;
