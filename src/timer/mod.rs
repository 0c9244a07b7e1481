//! Scheduled timer: one main-loop thread plus a worker pool dispatching
//! one-shot and repeating tasks keyed by wall-clock time (spec §4.5).

pub mod scheduler;
pub mod task;

pub use scheduler::{CancelResult, Timer};
pub use task::TimerTask;
