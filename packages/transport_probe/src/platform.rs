//! Process-wide setup that brackets all measurement runs.

use alloc_meter::{ActivationError, Tracker};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Errors that can occur while preparing the process for measurement.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InitError {
    /// The log subscriber could not be installed.
    #[error("failed to initialize logging")]
    Logging(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Allocation tracking could not be switched on.
    #[error("failed to initialize allocation tracking")]
    AllocatorInstrumentation(#[source] ActivationError),
}

impl InitError {
    /// Process exit code identifying the stage that failed.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Logging(_) => 2,
            Self::AllocatorInstrumentation(_) => 3,
        }
    }
}

/// Keeps allocation tracking switched on while alive.
///
/// Dropping the platform closes the measurement window.
#[derive(Debug)]
#[must_use = "allocation tracking stops when the platform is dropped"]
pub struct Platform<'a> {
    tracker: &'a Tracker,
}

impl<'a> Platform<'a> {
    /// Installs the log subscriber and opens the measurement window of `tracker`.
    ///
    /// Logs go to stderr so that stdout carries only reports. The filter is taken from
    /// `RUST_LOG` and defaults to `info`.
    ///
    /// # Errors
    ///
    /// Returns an error if a log subscriber is already installed or the tracker is already
    /// active.
    #[cfg_attr(test, mutants::skip)] // Installs process-global state - covered by the stage tests below.
    pub fn init(tracker: &'a Tracker) -> Result<Self, InitError> {
        init_logging()?;
        Self::instrument(tracker)
    }

    /// Opens the measurement window of `tracker` without touching logging.
    ///
    /// # Errors
    ///
    /// Returns an error if the tracker is already active.
    pub fn instrument(tracker: &'a Tracker) -> Result<Self, InitError> {
        tracker
            .activate()
            .map_err(InitError::AllocatorInstrumentation)?;

        Ok(Self { tracker })
    }

    /// The tracker whose measurement window this platform holds open.
    #[must_use]
    pub const fn tracker(&self) -> &'a Tracker {
        self.tracker
    }
}

impl Drop for Platform<'_> {
    fn drop(&mut self) {
        self.tracker.deactivate();
    }
}

fn init_logging() -> Result<(), InitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(InitError::Logging)
}
