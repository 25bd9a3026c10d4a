use thiserror::Error;

use crate::{ClientError, TransportSelector};

/// Errors that can occur during a measurement run.
///
/// [`UnsupportedTransport`](Error::UnsupportedTransport) and
/// [`ClientCreationFailed`](Error::ClientCreationFailed) end the run without a report. The
/// per-message variants never end a run; the harness logs them and carries on.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The client library has no implementation for the requested transport.
    #[error("transport {selector} is not supported by the client library")]
    UnsupportedTransport {
        /// The transport that was requested.
        selector: TransportSelector,
    },

    /// The client library could not create a client.
    #[error("failed to create {selector} client")]
    ClientCreationFailed {
        /// The transport the client was created for.
        selector: TransportSelector,
        /// What the client library reported.
        #[source]
        source: ClientError,
    },

    /// The client refused to accept a message for transmission.
    #[error("failed to submit message {index}")]
    SendFailed {
        /// Value of the send counter at the time.
        index: u64,
        /// What the client library reported.
        #[source]
        source: ClientError,
    },

    /// The client could not build a message from the payload.
    #[error("failed to construct message {index}")]
    MessageConstructionFailed {
        /// Value of the send counter at the time.
        index: u64,
        /// What the client library reported.
        #[source]
        source: ClientError,
    },
}

/// A specialized `Result` type for measurement runs, returning the crate's [`Error`] type as
/// the error value.
pub type Result<T> = std::result::Result<T, Error>;
