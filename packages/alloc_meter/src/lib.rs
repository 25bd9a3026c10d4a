#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Memory allocation metering for diagnostic measurement runs.
//!
//! This package wraps the process memory allocator and keeps a running tally of the bytes
//! currently allocated, the high-water mark of that value and the number of allocations
//! performed. The tally can be reset at the start of a measurement run and read back as a
//! [`AllocationStats`] snapshot at the end of it.
//!
//! The core functionality includes:
//! - [`Allocator`] - A Rust memory allocator wrapper that feeds an embedded [`Tracker`]
//! - [`Tracker`] - The counters themselves, usable standalone or through the allocator
//! - [`AllocationStats`] - A point-in-time copy of the counters
//!
//! This package is not meant for use in production, serving only as a diagnostic tool.
//!
//! # Simple usage
//!
//! ```
//! use alloc_meter::Allocator;
//!
//! #[global_allocator]
//! static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();
//!
//! fn main() {
//!     let tracker = ALLOCATOR.tracker();
//!     tracker.activate().unwrap();
//!     tracker.reset();
//!
//!     let data = vec![0_u8; 1024];
//!     drop(data);
//!
//!     let stats = tracker.snapshot();
//!     assert!(stats.peak_bytes() >= 1024);
//!     assert!(stats.allocation_count() >= 1);
//!
//!     tracker.deactivate();
//! }
//! ```
//!
//! # Measurement window
//!
//! The allocator only forwards to its tracker while the tracker is active. Activation and
//! deactivation bracket the measurement window of the whole process, while [`Tracker::reset()`]
//! starts a new run inside that window. Memory allocated before a reset and released after it
//! can make a free larger than the current tally; such frees saturate at zero and are counted
//! by [`Tracker::free_underflows()`].
//!
//! # Miri compatibility
//!
//! Miri replaces the global allocator with its own logic, so you cannot execute code that uses
//! this package as a global allocator under Miri.

mod allocator;
mod error;
mod stats;
mod tracker;

pub use allocator::*;
pub use error::*;
pub use stats::*;
pub use tracker::*;
