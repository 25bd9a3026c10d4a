//! Counters fed by the allocator.

use std::sync::atomic::{self, AtomicBool, AtomicU64};

use crate::{ActivationError, AllocationStats};

/// Live allocation counters for one measurement window.
///
/// All operations are lock-free and never allocate, so they are safe to call from inside a
/// [`GlobalAlloc`](std::alloc::GlobalAlloc) implementation. The typical owner is an
/// [`Allocator`](crate::Allocator) registered as the global allocator, which exposes its tracker
/// via [`Allocator::tracker()`](crate::Allocator::tracker). Code that consumes the statistics
/// should receive the `&Tracker` as a parameter instead of reaching for the global allocator.
///
/// # Examples
///
/// ```
/// use alloc_meter::Tracker;
///
/// let tracker = Tracker::new();
/// tracker.record_allocate(100);
/// tracker.record_allocate(50);
/// tracker.record_free(100);
///
/// let stats = tracker.snapshot();
/// assert_eq!(stats.current_bytes(), 50);
/// assert_eq!(stats.peak_bytes(), 150);
/// assert_eq!(stats.allocation_count(), 2);
/// ```
#[derive(Debug)]
pub struct Tracker {
    active: AtomicBool,
    current_bytes: AtomicU64,
    peak_bytes: AtomicU64,
    allocation_count: AtomicU64,
    free_underflows: AtomicU64,
}

impl Tracker {
    /// Creates an inactive tracker with all counters at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            current_bytes: AtomicU64::new(0),
            peak_bytes: AtomicU64::new(0),
            allocation_count: AtomicU64::new(0),
            free_underflows: AtomicU64::new(0),
        }
    }

    /// Opens the measurement window.
    ///
    /// Only affects whether an [`Allocator`](crate::Allocator) forwards activity to this tracker;
    /// direct calls to [`record_allocate()`](Self::record_allocate) and
    /// [`record_free()`](Self::record_free) are always counted.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::AlreadyActive`] if the window is already open.
    pub fn activate(&self) -> Result<(), ActivationError> {
        self.active
            .compare_exchange(
                false,
                true,
                atomic::Ordering::AcqRel,
                atomic::Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|_| ActivationError::AlreadyActive)
    }

    /// Closes the measurement window. The counters keep their values until the next reset.
    pub fn deactivate(&self) {
        self.active.store(false, atomic::Ordering::Release);
    }

    /// Whether the measurement window is open.
    #[must_use]
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(atomic::Ordering::Acquire)
    }

    /// Zeroes all counters, discarding the data of the previous run.
    pub fn reset(&self) {
        self.current_bytes.store(0, atomic::Ordering::Relaxed);
        self.peak_bytes.store(0, atomic::Ordering::Relaxed);
        self.allocation_count.store(0, atomic::Ordering::Relaxed);
        self.free_underflows.store(0, atomic::Ordering::Relaxed);

        // Allocations on other threads may land between the two stores above.
        self.peak_bytes.fetch_max(
            self.current_bytes.load(atomic::Ordering::Relaxed),
            atomic::Ordering::Relaxed,
        );
    }

    /// Records an allocation of `size` bytes.
    #[inline]
    pub fn record_allocate(&self, size: u64) {
        // Relaxed is sufficient: we only need atomicity, not ordering w.r.t. other memory ops.
        let previous = self.current_bytes.fetch_add(size, atomic::Ordering::Relaxed);
        self.peak_bytes
            .fetch_max(previous.saturating_add(size), atomic::Ordering::Relaxed);
        self.allocation_count.fetch_add(1, atomic::Ordering::Relaxed);
    }

    /// Records a free of `size` bytes.
    ///
    /// The peak and the allocation count are never decreased. A free larger than the current
    /// tally clamps the tally at zero and is counted as an underflow.
    #[inline]
    pub fn record_free(&self, size: u64) {
        let (Ok(previous) | Err(previous)) = self.current_bytes.fetch_update(
            atomic::Ordering::Relaxed,
            atomic::Ordering::Relaxed,
            |current| Some(current.saturating_sub(size)),
        );

        if previous < size {
            self.free_underflows.fetch_add(1, atomic::Ordering::Relaxed);
        }
    }

    /// Returns a copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> AllocationStats {
        AllocationStats::new(
            self.peak_bytes.load(atomic::Ordering::Relaxed),
            self.current_bytes.load(atomic::Ordering::Relaxed),
            self.allocation_count.load(atomic::Ordering::Relaxed),
        )
    }

    /// Number of frees since the last reset that were larger than the tally at the time.
    ///
    /// A nonzero value usually means memory allocated before the reset was released during
    /// the run.
    #[must_use]
    pub fn free_underflows(&self) -> u64 {
        self.free_underflows.load(atomic::Ordering::Relaxed)
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}
