//! An in-process client library that needs no service.
//!
//! The loopback client walks through the same lifecycle a real client does (connection status,
//! message construction, asynchronous sends with later confirmation, inbound messages) without
//! any I/O. It allocates for the work it simulates, so a measurement run against it reports
//! the harness overhead plus a small, stable client footprint.

use std::collections::VecDeque;
use std::fmt;

use tracing::debug;

use crate::{
    ClientError, ClientEvent, ClientOption, Confirmation, ConnectionStatus, Disposition,
    EventQueue, Message, MessageId, StatusReason, TransportClient, TransportFactory,
    TransportSelector,
};

/// Largest message body the loopback client accepts, matching common ingestion service limits.
pub const MAX_MESSAGE_BYTES: usize = 256 * 1024;

const PEM_CERTIFICATE_MARKER: &str = "-----BEGIN CERTIFICATE-----";

/// Creates [`TransportClient`]s that run entirely in process.
///
/// # Examples
///
/// ```
/// use transport_probe::{LoopbackFactory, TransportFactory, TransportSelector};
///
/// let factory = LoopbackFactory::new().authenticate_after(3);
/// assert!(factory.supports(TransportSelector::Http));
///
/// let client = factory.create(
///     TransportSelector::Http,
///     "HostName=localhost;DeviceId=device-1;SharedAccessKey=a2V5",
/// );
/// assert!(client.is_ok());
///
/// let client = factory.create(TransportSelector::Http, "DeviceId=device-1");
/// assert!(client.is_err());
/// ```
#[derive(Clone, Debug)]
pub struct LoopbackFactory {
    transports: Vec<TransportSelector>,
    authenticate_after: u32,
    refusal: Option<StatusReason>,
    echo: bool,
}

impl LoopbackFactory {
    /// Creates a factory that supports every transport and authenticates on the first pump.
    #[must_use]
    pub fn new() -> Self {
        Self {
            transports: TransportSelector::ALL.to_vec(),
            authenticate_after: 1,
            refusal: None,
            echo: false,
        }
    }

    /// Restricts the transports this factory claims to support.
    #[must_use]
    pub fn transports(mut self, transports: impl IntoIterator<Item = TransportSelector>) -> Self {
        self.transports = transports.into_iter().collect();
        self
    }

    /// Number of pumps before a client reports its connection status.
    #[must_use]
    pub const fn authenticate_after(mut self, pumps: u32) -> Self {
        self.authenticate_after = pumps;
        self
    }

    /// Makes clients report the connection as unauthenticated for the given reason.
    #[must_use]
    pub const fn refuse(mut self, reason: StatusReason) -> Self {
        self.refusal = Some(reason);
        self
    }

    /// Makes clients deliver a copy of every sent message back to the device.
    #[must_use]
    pub const fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

impl Default for LoopbackFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportFactory for LoopbackFactory {
    fn version(&self) -> String {
        format!("loopback-{}", env!("CARGO_PKG_VERSION"))
    }

    fn supports(&self, selector: TransportSelector) -> bool {
        self.transports.contains(&selector)
    }

    fn create(
        &self,
        selector: TransportSelector,
        target: &str,
    ) -> Result<Box<dyn TransportClient>, ClientError> {
        if !self.supports(selector) {
            return Err(ClientError::Other(format!(
                "loopback does not implement {selector}"
            )));
        }

        let connection = ConnectionString::parse(target)?;

        debug!(
            message = "loopback client created",
            transport = %selector,
            host = %connection.host_name,
            device = %connection.device_id
        );

        Ok(Box::new(LoopbackClient {
            selector,
            connection,
            pumps: 0,
            authenticate_after: self.authenticate_after,
            refusal: self.refusal,
            echo: self.echo,
            state: LinkState::Connecting,
            next_id: 0,
            in_flight: Vec::new(),
            inbound: Vec::new(),
            backlog: VecDeque::new(),
            trusted_certificates: None,
            proxy_host: None,
        }))
    }
}

/// The parts of a `Key=Value;Key=Value` connection string the loopback client cares about.
#[derive(Clone, PartialEq, Eq)]
struct ConnectionString {
    host_name: String,
    device_id: String,
    shared_access_key: Option<String>,
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("host_name", &self.host_name)
            .field("device_id", &self.device_id)
            .field(
                "shared_access_key",
                &self.shared_access_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl ConnectionString {
    fn parse(target: &str) -> Result<Self, ClientError> {
        let mut host_name = None;
        let mut device_id = None;
        let mut shared_access_key = None;

        for pair in target.split(';').filter(|pair| !pair.trim().is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                ClientError::InvalidTarget(format!("'{pair}' is not a Key=Value pair"))
            })?;

            let slot = match key.trim() {
                "HostName" => &mut host_name,
                "DeviceId" => &mut device_id,
                "SharedAccessKey" => &mut shared_access_key,
                // Other keys (ModuleId, GatewayHostName, ...) are irrelevant in process.
                _ => continue,
            };

            let value = value.trim();
            if value.is_empty() {
                return Err(ClientError::InvalidTarget(format!("{} is empty", key.trim())));
            }
            *slot = Some(value.to_string());
        }

        Ok(Self {
            host_name: host_name
                .ok_or_else(|| ClientError::InvalidTarget("HostName is missing".to_string()))?,
            device_id: device_id
                .ok_or_else(|| ClientError::InvalidTarget("DeviceId is missing".to_string()))?,
            shared_access_key,
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum LinkState {
    Connecting,
    Authenticated,
    Refused,
}

#[derive(Debug)]
struct LoopbackClient {
    selector: TransportSelector,
    connection: ConnectionString,
    pumps: u32,
    authenticate_after: u32,
    refusal: Option<StatusReason>,
    echo: bool,
    state: LinkState,
    next_id: u64,

    // Submitted, confirmed on the next pump.
    in_flight: Vec<Message>,

    // Delivered to the device, waiting for a disposition.
    inbound: Vec<MessageId>,

    // Events that did not fit into the caller's queue.
    backlog: VecDeque<ClientEvent>,

    trusted_certificates: Option<String>,
    proxy_host: Option<String>,
}

impl LoopbackClient {
    fn allocate_id(&mut self) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    fn advance_link(&mut self) {
        if self.state != LinkState::Connecting || self.pumps < self.authenticate_after {
            return;
        }

        let status = match self.refusal {
            Some(reason) => {
                self.state = LinkState::Refused;
                ConnectionStatus::Unauthenticated(reason)
            }
            None => {
                self.state = LinkState::Authenticated;
                ConnectionStatus::Authenticated
            }
        };

        debug!(
            message = "loopback link established",
            host = %self.connection.host_name,
            ?status,
            proxy = ?self.proxy_host,
            pinned_certificates = self.trusted_certificates.is_some()
        );

        self.backlog.push_back(ClientEvent::ConnectionStatus(status));
    }

    fn confirm_in_flight(&mut self) {
        for message in std::mem::take(&mut self.in_flight) {
            self.backlog.push_back(ClientEvent::SendConfirmed {
                id: message.id(),
                confirmation: Confirmation::Delivered,
            });

            if self.echo {
                let id = self.allocate_id();
                self.inbound.push(id);
                self.backlog.push_back(ClientEvent::MessageReceived(Message::new(
                    id,
                    message.body().to_vec(),
                )));
            }
        }
    }

    fn flush_backlog(&mut self, events: &mut EventQueue) {
        while let Some(event) = self.backlog.pop_front() {
            if let Err(event) = events.push(event) {
                self.backlog.push_front(event);
                break;
            }
        }
    }
}

impl TransportClient for LoopbackClient {
    fn set_option(&mut self, option: ClientOption) -> Result<(), ClientError> {
        match option {
            ClientOption::TrustedCertificates(pem) => {
                if !pem.contains(PEM_CERTIFICATE_MARKER) {
                    return Err(ClientError::InvalidOption(
                        "trusted certificates are not PEM encoded".to_string(),
                    ));
                }
                self.trusted_certificates = Some(pem);
            }
            ClientOption::HttpProxy(proxy) => {
                if !self.selector.is_proxyable() {
                    return Err(ClientError::InvalidOption(format!(
                        "{} cannot use an HTTP proxy",
                        self.selector
                    )));
                }
                if proxy.host().is_empty() || proxy.port() == 0 {
                    return Err(ClientError::InvalidOption(
                        "proxy needs a host and a nonzero port".to_string(),
                    ));
                }
                self.proxy_host = Some(format!("{}:{}", proxy.host(), proxy.port()));
            }
        }

        Ok(())
    }

    fn create_message(&mut self, payload: &[u8]) -> Result<Message, ClientError> {
        if payload.len() > MAX_MESSAGE_BYTES {
            return Err(ClientError::MessageTooLarge {
                size: payload.len(),
                limit: MAX_MESSAGE_BYTES,
            });
        }

        let id = self.allocate_id();
        Ok(Message::new(id, payload.to_vec()))
    }

    fn send_async(&mut self, message: Message) -> Result<(), ClientError> {
        if self.state != LinkState::Authenticated {
            return Err(ClientError::NotConnected);
        }

        self.in_flight.push(message);
        Ok(())
    }

    fn pump_work(&mut self, events: &mut EventQueue) {
        self.pumps = self.pumps.saturating_add(1);

        self.advance_link();
        self.confirm_in_flight();
        self.flush_backlog(events);
    }

    fn acknowledge(&mut self, id: MessageId, disposition: Disposition) -> Result<(), ClientError> {
        let position = self
            .inbound
            .iter()
            .position(|pending| *pending == id)
            .ok_or(ClientError::UnknownMessage(id))?;

        self.inbound.swap_remove(position);
        debug!(message = "loopback message settled", %id, ?disposition);
        Ok(())
    }
}

impl Drop for LoopbackClient {
    fn drop(&mut self) {
        if !self.in_flight.is_empty() || !self.inbound.is_empty() {
            debug!(
                message = "loopback client destroyed with pending messages",
                device = %self.connection.device_id,
                in_flight = self.in_flight.len(),
                unsettled = self.inbound.len()
            );
        }
    }
}
