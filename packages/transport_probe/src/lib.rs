#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Measures how much memory a telemetry client library uses under different transports.
//!
//! A measurement run resets an [`alloc_meter::Tracker`], creates a client for the requested
//! transport, pumps it until a number of test messages were accepted (or the connection failed),
//! lets in-flight work settle, destroys the client and reports the allocation statistics
//! gathered along the way.
//!
//! The core functionality includes:
//! - [`Harness`] - Carries everything a run needs and performs runs via
//!   [`Harness::run_send_cycle()`]
//! - [`TransportFactory`] and [`TransportClient`] - The seam the measured client library plugs
//!   into
//! - [`RunReport`] - The outcome of a run, printable as `key:\tvalue` lines
//! - [`LoopbackFactory`] - An in-process client library for runs without a service
//!
//! The `memory_analysis` binary in this package performs a configurable sequence of runs and
//! prints one report per run.
//!
//! # Concurrency
//!
//! A run is single-threaded. The client makes progress only when the harness pumps it and
//! reports back through an [`EventQueue`] that the harness drains after each pump. Runs sharing
//! a tracker must not overlap.

mod client;
mod config;
mod error;
mod events;
mod harness;
mod loopback;
mod platform;
mod report;
mod transport;

pub use client::*;
pub use config::*;
pub use error::*;
pub use events::*;
pub use harness::*;
pub use loopback::*;
pub use platform::*;
pub use report::*;
pub use transport::*;
