//! Thread registry, thread handle, and thread pool (spec §4.3, §4.4).

pub mod handle;
pub mod pool;
pub mod registry;

pub use handle::{current, CmThread};
pub use pool::ThreadPool;
pub use registry::{ThreadDescriptor, current_descriptor, registered_descriptor};
