/// A point-in-time copy of the counters of a [`Tracker`](crate::Tracker).
///
/// Obtained via [`Tracker::snapshot()`](crate::Tracker::snapshot). The snapshot is a plain value
/// and does not change when the tracker keeps counting.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct AllocationStats {
    peak_bytes: u64,
    current_bytes: u64,
    allocation_count: u64,
}

impl AllocationStats {
    #[must_use]
    pub(crate) const fn new(peak_bytes: u64, current_bytes: u64, allocation_count: u64) -> Self {
        Self {
            peak_bytes,
            current_bytes,
            allocation_count,
        }
    }

    /// The highest value `current_bytes` reached since the last reset.
    #[must_use]
    pub const fn peak_bytes(&self) -> u64 {
        self.peak_bytes
    }

    /// Bytes allocated and not yet freed since the last reset.
    #[must_use]
    pub const fn current_bytes(&self) -> u64 {
        self.current_bytes
    }

    /// Number of allocations performed since the last reset.
    ///
    /// Frees do not decrease this value.
    #[must_use]
    pub const fn allocation_count(&self) -> u64 {
        self.allocation_count
    }

    /// Whether every counter is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.peak_bytes == 0 && self.current_bytes == 0 && self.allocation_count == 0
    }
}
