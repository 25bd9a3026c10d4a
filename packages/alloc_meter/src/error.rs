use thiserror::Error;

/// Errors that can occur when changing the lifecycle state of a [`Tracker`](crate::Tracker).
#[derive(Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum ActivationError {
    /// The tracker was already active. Each measurement window must be closed with
    /// [`Tracker::deactivate()`](crate::Tracker::deactivate) before a new one can be opened.
    #[error("allocation tracking is already active")]
    AlreadyActive,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(ActivationError: Send, Sync, Debug);

    #[test]
    fn already_active_has_readable_message() {
        assert_eq!(
            ActivationError::AlreadyActive.to_string(),
            "allocation tracking is already active"
        );
    }
}
