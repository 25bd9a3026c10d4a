//! Allocation wrapper for metering memory allocations.

use std::alloc::{GlobalAlloc, Layout};
use std::fmt;

use crate::Tracker;

/// A memory allocator that feeds allocation and deallocation activity into a [`Tracker`].
///
/// This allocator wraps any [`GlobalAlloc`] implementation to provide metering while
/// maintaining the same allocation behavior as the underlying allocator. Activity is only
/// recorded while the embedded tracker is [active](Tracker::activate), and only for calls that
/// the underlying allocator satisfied.
///
/// A reallocation is recorded as a free of the old size followed by one allocation of the new
/// size.
///
/// # Examples
///
/// ```rust
/// use alloc_meter::Allocator;
///
/// #[global_allocator]
/// static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();
/// ```
pub struct Allocator<A: GlobalAlloc> {
    inner: A,
    tracker: Tracker,
}

impl<A: GlobalAlloc> fmt::Debug for Allocator<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocator")
            .field("inner", &"<allocator>")
            .field("tracker", &self.tracker)
            .finish()
    }
}

impl Allocator<std::alloc::System> {
    /// Creates a new metering allocator using the system's default allocator.
    #[must_use]
    #[inline]
    pub const fn system() -> Self {
        Self::new(std::alloc::System)
    }
}

impl<A: GlobalAlloc> Allocator<A> {
    /// Creates a new metering allocator that wraps the provided allocator.
    #[must_use]
    #[inline]
    pub const fn new(allocator: A) -> Self {
        Self {
            inner: allocator,
            tracker: Tracker::new(),
        }
    }

    /// The tracker that receives this allocator's activity.
    #[must_use]
    #[inline]
    pub const fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    #[inline]
    fn on_allocate(&self, size: usize) {
        if self.tracker.is_active() {
            self.tracker.record_allocate(size_to_u64(size));
        }
    }

    #[inline]
    fn on_free(&self, size: usize) {
        if self.tracker.is_active() {
            self.tracker.record_free(size_to_u64(size));
        }
    }
}

#[inline]
fn size_to_u64(size: usize) -> u64 {
    size.try_into().expect("usize always fits into u64")
}

// SAFETY: We delegate all allocation operations to the underlying allocator,
// which already implements GlobalAlloc safely, while adding metering functionality.
unsafe impl<A: GlobalAlloc> GlobalAlloc for Allocator<A> {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: We forward the call to the underlying allocator which implements GlobalAlloc.
        let ptr = unsafe { self.inner.alloc(layout) };

        if !ptr.is_null() {
            self.on_allocate(layout.size());
        }

        ptr
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: We forward the call to the underlying allocator which implements GlobalAlloc.
        unsafe { self.inner.dealloc(ptr, layout) };

        self.on_free(layout.size());
    }

    #[inline]
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // SAFETY: We forward the call to the underlying allocator which implements GlobalAlloc.
        let ptr = unsafe { self.inner.alloc_zeroed(layout) };

        if !ptr.is_null() {
            self.on_allocate(layout.size());
        }

        ptr
    }

    #[inline]
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // SAFETY: We forward the call to the underlying allocator which implements GlobalAlloc.
        let new_ptr = unsafe { self.inner.realloc(ptr, layout, new_size) };

        // On failure the original block is untouched, so nothing changed.
        if !new_ptr.is_null() {
            self.on_free(layout.size());
            self.on_allocate(new_size);
        }

        new_ptr
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::alloc::System;

    use super::*;

    static_assertions::assert_impl_all!(Allocator<System>: Send, Sync);

    // Not registered as the global allocator; driven by hand.
    fn allocator() -> Allocator<System> {
        Allocator::system()
    }

    #[test]
    fn inactive_allocator_records_nothing() {
        let allocator = allocator();
        let layout = Layout::from_size_align(64, 8).unwrap();

        // SAFETY: Layout has nonzero size; the block is released with the same layout.
        unsafe {
            let ptr = allocator.alloc(layout);
            assert!(!ptr.is_null());
            allocator.dealloc(ptr, layout);
        }

        assert!(allocator.tracker().snapshot().is_zero());
    }

    #[test]
    fn alloc_and_dealloc_are_recorded() {
        let allocator = allocator();
        allocator.tracker().activate().unwrap();
        let layout = Layout::from_size_align(128, 8).unwrap();

        // SAFETY: Layout has nonzero size; the block is released with the same layout.
        unsafe {
            let ptr = allocator.alloc(layout);
            assert!(!ptr.is_null());

            let stats = allocator.tracker().snapshot();
            assert_eq!(stats.current_bytes(), 128);
            assert_eq!(stats.allocation_count(), 1);

            allocator.dealloc(ptr, layout);
        }

        let stats = allocator.tracker().snapshot();
        assert_eq!(stats.current_bytes(), 0);
        assert_eq!(stats.peak_bytes(), 128);
        assert_eq!(stats.allocation_count(), 1);
    }

    #[test]
    fn alloc_zeroed_is_recorded() {
        let allocator = allocator();
        allocator.tracker().activate().unwrap();
        let layout = Layout::from_size_align(32, 8).unwrap();

        // SAFETY: Layout has nonzero size; the block is released with the same layout.
        unsafe {
            let ptr = allocator.alloc_zeroed(layout);
            assert!(!ptr.is_null());
            assert_eq!(*ptr, 0);
            allocator.dealloc(ptr, layout);
        }

        assert_eq!(allocator.tracker().snapshot().allocation_count(), 1);
    }

    #[test]
    fn realloc_moves_tally_to_new_size() {
        let allocator = allocator();
        allocator.tracker().activate().unwrap();
        let layout = Layout::from_size_align(100, 8).unwrap();

        // SAFETY: Layout has nonzero size; the block is released with the layout of its
        // current size.
        unsafe {
            let ptr = allocator.alloc(layout);
            assert!(!ptr.is_null());

            let grown = allocator.realloc(ptr, layout, 300);
            assert!(!grown.is_null());

            let stats = allocator.tracker().snapshot();
            assert_eq!(stats.current_bytes(), 300);
            assert_eq!(stats.peak_bytes(), 300);
            assert_eq!(stats.allocation_count(), 2);

            allocator.dealloc(grown, Layout::from_size_align(300, 8).unwrap());
        }

        assert_eq!(allocator.tracker().snapshot().current_bytes(), 0);
        assert_eq!(allocator.tracker().free_underflows(), 0);
    }
}
