//! Concurrency primitives (spec §4.2).
//!
//! These are deliberately not thin wrappers over `std::sync` types: the
//! library's contracts (recursive locking, manual-vs-auto-reset
//! conditions, timed semaphore acquire, a read/write lock with a specific
//! starvation policy) don't map onto a single stdlib type each. Every
//! compound type here declares, in its own doc comment, which mutex
//! governs which fields — the "shared-resource policy" from spec §5.

pub mod condition;
pub mod mutex;
pub mod rwlock;
pub mod semaphore;

pub use condition::{Condition, ConditionKind, WaitResult};
pub use mutex::ReentrantMutex;
pub use rwlock::ReentrantRwLock;
pub use semaphore::{AcquireResult, Semaphore};
