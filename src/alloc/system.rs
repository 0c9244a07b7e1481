use super::Allocator;
use std::alloc::{self, Layout};

/// Delegates directly to the platform allocator. No bookkeeping, no guard
/// bytes — the "release build" back-end from spec §4.1.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    unsafe fn allocate(&self, size: usize, align: usize) -> *mut u8 {
        let layout = Layout::from_size_align(size, align).expect("invalid layout");
        alloc::alloc(layout)
    }

    unsafe fn allocate_zeroed(&self, count: usize, elem_size: usize, align: usize) -> *mut u8 {
        let layout =
            Layout::from_size_align(count.saturating_mul(elem_size), align).expect("invalid layout");
        alloc::alloc_zeroed(layout)
    }

    unsafe fn reallocate(
        &self,
        ptr: *mut u8,
        old_size: usize,
        new_size: usize,
        align: usize,
    ) -> *mut u8 {
        let layout = Layout::from_size_align(old_size, align).expect("invalid layout");
        alloc::realloc(ptr, layout, new_size)
    }

    unsafe fn free(&self, ptr: *mut u8, size: usize, align: usize) {
        let layout = Layout::from_size_align(size, align).expect("invalid layout");
        alloc::dealloc(ptr, layout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_block() {
        let a = SystemAllocator;
        unsafe {
            let p = a.allocate(64, 8);
            assert!(!p.is_null());
            p.write_bytes(0xAB, 64);
            a.free(p, 64, 8);
        }
    }
}
