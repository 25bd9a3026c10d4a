//! Integration tests for `alloc_meter` with real memory allocations.
//!
//! The tests in this file share one global allocator and therefore one tracker, so they are
//! serialized through a lock and each one opens and closes its own measurement window.

#![cfg(not(miri))] // Miri replaces the global allocator, so cannot be used here.

use std::hint::black_box;
use std::sync::{Mutex, MutexGuard};

use alloc_meter::{Allocator, Tracker};

#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

static SERIALIZE: Mutex<()> = Mutex::new(());

struct Window {
    _guard: MutexGuard<'static, ()>,
}

impl Window {
    fn open() -> Self {
        let guard = SERIALIZE
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        tracker().activate().unwrap();
        tracker().reset();
        Self { _guard: guard }
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        tracker().deactivate();
    }
}

fn tracker() -> &'static Tracker {
    ALLOCATOR.tracker()
}

#[test]
fn vec_allocation_raises_peak_and_count() {
    const SIZE: usize = 4096;

    let _window = Window::open();

    let data = vec![0_u8; SIZE];
    black_box(&data);

    let during = tracker().snapshot();
    assert!(during.current_bytes() >= SIZE as u64);
    assert!(during.allocation_count() >= 1);

    drop(data);

    let after = tracker().snapshot();
    assert!(after.peak_bytes() >= SIZE as u64);
    assert!(after.current_bytes() < during.current_bytes());
    assert!(after.allocation_count() >= during.allocation_count());
}

#[test]
fn reset_discards_previous_run() {
    let _window = Window::open();

    let data = vec![1_u64; 1024];
    black_box(&data);
    drop(data);

    tracker().reset();
    let stats = tracker().snapshot();

    // The test harness may allocate on other threads, so only bound the result.
    assert!(stats.peak_bytes() < 1024 * 8);
}

#[test]
fn freeing_memory_from_before_reset_saturates() {
    let _window = Window::open();

    let data = vec![7_u8; 2048];
    black_box(&data);

    tracker().reset();
    drop(data);

    assert!(tracker().snapshot().current_bytes() < 2048);
    assert!(tracker().free_underflows() >= 1);
}

#[test]
fn inactive_tracker_ignores_allocations() {
    let _guard = SERIALIZE
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    tracker().reset();

    let data = vec![0_u8; 512];
    black_box(&data);
    drop(data);

    assert!(tracker().snapshot().is_zero());
}

#[test]
fn growing_vec_counts_reallocations() {
    let _window = Window::open();

    let mut data: Vec<u64> = Vec::with_capacity(1);
    for i in 0..1000 {
        data.push(i);
    }
    black_box(&data);

    let stats = tracker().snapshot();
    assert!(stats.allocation_count() > 1);
    assert!(stats.peak_bytes() >= 1000 * 8);
}
