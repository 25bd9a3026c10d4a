//! The seam between the harness and the client library that implements the transports.
//!
//! The harness never talks to a network itself. It drives a [`TransportClient`] obtained from a
//! [`TransportFactory`], both of which are implemented by the client library being measured.
//! Destroying a client is dropping it.

use std::fmt::{self, Debug};
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use crate::{EventQueue, TransportSelector};

/// Creates transport clients. Implemented by the client library under measurement.
#[cfg_attr(test, mockall::automock)]
pub trait TransportFactory: Debug {
    /// Version string of the client library, printed in reports.
    fn version(&self) -> String;

    /// Whether the library has an implementation for the given transport.
    fn supports(&self, selector: TransportSelector) -> bool;

    /// Creates a client for the given transport that connects to `target`.
    ///
    /// The format of `target` is defined by the client library, typically a connection string.
    ///
    /// # Errors
    ///
    /// Returns an error if `target` is malformed or the client cannot be set up.
    fn create(
        &self,
        selector: TransportSelector,
        target: &str,
    ) -> Result<Box<dyn TransportClient>, ClientError>;
}

/// One client instance with its own connection and work queue.
///
/// Clients do no work on their own. All I/O and protocol progress happens inside
/// [`pump_work()`](Self::pump_work), which also reports anything the caller needs to know about
/// by pushing [`ClientEvent`](crate::ClientEvent)s into the queue it is given.
#[cfg_attr(test, mockall::automock)]
pub trait TransportClient: Debug {
    /// Applies a configuration option. Must be called before the first pump.
    ///
    /// # Errors
    ///
    /// Returns an error if the option is invalid or not applicable to this transport.
    fn set_option(&mut self, option: ClientOption) -> Result<(), ClientError>;

    /// Wraps a payload into a message that can be submitted with [`send_async()`](Self::send_async).
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be turned into a message.
    fn create_message(&mut self, payload: &[u8]) -> Result<Message, ClientError>;

    /// Queues a message for transmission. Completion is reported through the event queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the client refuses to accept the message.
    fn send_async(&mut self, message: Message) -> Result<(), ClientError>;

    /// Advances the client's internal work by one non-blocking step.
    fn pump_work(&mut self, events: &mut EventQueue);

    /// Settles an inbound message received via [`ClientEvent::MessageReceived`](crate::ClientEvent::MessageReceived).
    ///
    /// # Errors
    ///
    /// Returns an error if the message is unknown to the client.
    fn acknowledge(&mut self, id: MessageId, disposition: Disposition) -> Result<(), ClientError>;
}

/// Identifies a message within one client instance.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message travelling between the device and the service, in either direction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    id: MessageId,
    body: Vec<u8>,
}

impl Message {
    /// Creates a message with the given identity and body.
    #[must_use]
    pub const fn new(id: MessageId, body: Vec<u8>) -> Self {
        Self { id, body }
    }

    /// The identity assigned by the client.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// The raw payload.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// How an inbound message is settled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Disposition {
    /// The message was processed and can be removed from the service queue.
    Accepted,
    /// The message was not processed and should be redelivered.
    Abandoned,
    /// The message must not be redelivered.
    Rejected,
}

/// Options that can be applied to a client before it starts working.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ClientOption {
    /// PEM-encoded certificates used to validate the identity of the remote endpoint.
    TrustedCertificates(String),
    /// Route traffic through an HTTP proxy.
    HttpProxy(ProxyConfig),
}

/// Location of (and optional credentials for) an HTTP proxy.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    host: String,
    port: u16,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl ProxyConfig {
    /// Creates an anonymous proxy configuration.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
        }
    }

    /// Adds credentials for proxies that require authentication.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Host name or address of the proxy.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port of the proxy.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// User name, if the proxy requires authentication.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Password, if the proxy requires authentication.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl FromStr for ProxyConfig {
    type Err = String;

    /// Parses `host:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("Invalid proxy: '{s}'. Expected HOST:PORT"))?;

        if host.is_empty() {
            return Err(format!("Invalid proxy: '{s}'. Host is empty"));
        }

        let port = port
            .parse::<u16>()
            .map_err(|e| format!("Invalid proxy: '{s}'. Bad port: {e}"))?;

        Ok(Self::new(host, port))
    }
}

/// Errors reported by a client library.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum ClientError {
    /// The connection target could not be used to create a client.
    #[error("invalid connection target: {0}")]
    InvalidTarget(String),

    /// The option is malformed or not applicable to the transport in use.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// The operation requires an authenticated connection.
    #[error("client is not connected")]
    NotConnected,

    /// The message is larger than the transport allows.
    #[error("message of {size} bytes exceeds the limit of {limit} bytes")]
    MessageTooLarge {
        /// Size of the rejected payload.
        size: usize,
        /// Largest payload the transport accepts.
        limit: usize,
    },

    /// The message is not known to the client.
    #[error("unknown message {0}")]
    UnknownMessage(MessageId),

    /// Any other failure inside the client library.
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(ClientError: Send, Sync, Debug);
    assert_impl_all!(Message: Send, Sync);

    #[test]
    fn proxy_parses_host_and_port() {
        let proxy: ProxyConfig = "127.0.0.1:8888".parse().unwrap();

        assert_eq!(proxy.host(), "127.0.0.1");
        assert_eq!(proxy.port(), 8888);
        assert_eq!(proxy.username(), None);
        assert_eq!(proxy.password(), None);
    }

    #[test]
    fn proxy_rejects_missing_port() {
        assert!("localhost".parse::<ProxyConfig>().is_err());
        assert!("localhost:".parse::<ProxyConfig>().is_err());
        assert!("localhost:99999".parse::<ProxyConfig>().is_err());
    }

    #[test]
    fn proxy_rejects_empty_host() {
        let error = ":8080".parse::<ProxyConfig>().unwrap_err();

        assert!(error.contains("Host is empty"));
    }

    #[test]
    fn proxy_credentials_are_kept() {
        let proxy = ProxyConfig::new("proxy.local", 3128).with_credentials("user", "secret");

        assert_eq!(proxy.username(), Some("user"));
        assert_eq!(proxy.password(), Some("secret"));
    }

    #[test]
    fn message_exposes_id_and_body() {
        let message = Message::new(MessageId(7), b"hello".to_vec());

        assert_eq!(message.id(), MessageId(7));
        assert_eq!(message.body(), b"hello");
    }

    #[test]
    fn message_too_large_mentions_sizes() {
        let error = ClientError::MessageTooLarge {
            size: 300,
            limit: 256,
        };

        assert_eq!(
            error.to_string(),
            "message of 300 bytes exceeds the limit of 256 bytes"
        );
    }
}
