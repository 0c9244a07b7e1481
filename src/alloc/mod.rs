//! Allocator interface and the leak-tracking allocator (spec §3, §4.1).

pub mod system;
pub mod tracking;

pub use system::SystemAllocator;
pub use tracking::{LeakReport, TrackingAllocator};

use std::sync::{Arc, OnceLock};

/// Allocation sizes requested of [`TrackingAllocator`] are clamped into
/// size classes `k = ceil(log2(bytes))`. A request needing `k > MAX_CLASS`
/// is a fatal error (spec §4.1: "clamping requests that exceed 2^44 as
/// fatal").
pub const MAX_SIZE_CLASS: u32 = 44;

/// The allocator capability every other subsystem in this crate takes a
/// handle to, so a debug build can substitute the tracking allocator
/// transparently (spec §1, §2).
pub trait Allocator: std::fmt::Debug {
    /// Allocate `size` bytes with `align` alignment. Returns the address
    /// just past any internal header.
    ///
    /// # Safety
    /// The returned pointer is valid for `size` bytes until passed to
    /// [`Self::free`] with the same `size`/`align`.
    unsafe fn allocate(&self, size: usize, align: usize) -> *mut u8;

    /// Allocate `count * size` bytes, zeroed.
    ///
    /// # Safety
    /// Same contract as [`Self::allocate`], with `size = count * elem_size`.
    unsafe fn allocate_zeroed(&self, count: usize, elem_size: usize, align: usize) -> *mut u8;

    /// Reallocate a block previously returned by this allocator.
    ///
    /// # Safety
    /// `ptr` must have been returned by this allocator with `old_size` and
    /// `align`, and must not have been freed yet.
    unsafe fn reallocate(
        &self,
        ptr: *mut u8,
        old_size: usize,
        new_size: usize,
        align: usize,
    ) -> *mut u8;

    /// Free a block previously returned by this allocator.
    ///
    /// # Safety
    /// `ptr` must have been returned by this allocator with `size`/`align`
    /// and must not already have been freed.
    unsafe fn free(&self, ptr: *mut u8, size: usize, align: usize);

    /// Duplicate a `NUL`-terminated byte string. Fails (logs, returns
    /// `None`) on a null/empty input rather than aborting (spec §4.1:
    /// "`strdup` fails with a logged stack ... it does not abort").
    fn duplicate_str(&self, s: &str) -> Option<String> {
        if s.is_empty() {
            tracing::warn!("duplicate_str called with an empty string");
            return None;
        }
        Some(s.to_owned())
    }
}

static DEFAULT: OnceLock<Arc<dyn Allocator + Send + Sync>> = OnceLock::new();

/// The process-wide default allocator (spec §3: "Process holds a global
/// default"), built lazily at first use (Design Notes §9).
pub fn default_allocator() -> Arc<dyn Allocator + Send + Sync> {
    Arc::clone(DEFAULT.get_or_init(|| Arc::new(SystemAllocator)))
}

/// Installs a different default allocator (e.g. a [`TrackingAllocator`])
/// before the first call to [`default_allocator`]. Returns `false` if the
/// default had already been initialized.
pub fn try_install_default_allocator(allocator: Arc<dyn Allocator + Send + Sync>) -> bool {
    DEFAULT.set(allocator).is_ok()
}

pub fn size_class_of(bytes: usize) -> u32 {
    if bytes <= 1 {
        0
    } else {
        (usize::BITS - (bytes - 1).leading_zeros()).min(MAX_SIZE_CLASS + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_class_is_ceil_log2() {
        assert_eq!(size_class_of(1), 0);
        assert_eq!(size_class_of(2), 1);
        assert_eq!(size_class_of(3), 2);
        assert_eq!(size_class_of(4), 2);
        assert_eq!(size_class_of(5), 3);
        assert_eq!(size_class_of(1024), 10);
    }
}
