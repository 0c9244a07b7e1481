//! Concurrency primitives, a scheduled timer, a structured logger, a
//! leak-tracking allocator, and a glob-filtered filesystem walker for
//! long-running server processes (spec §1).

pub mod alloc;
pub mod common;
pub mod fs_walk;
pub mod glob;
pub mod logging;
pub mod sync;
pub mod thread;
pub mod timer;
pub mod tracing_logging;

pub use common::{CmError, CmResult};
