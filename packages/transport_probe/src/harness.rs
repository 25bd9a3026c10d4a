//! The measurement run: drive one client through a bounded send loop and report memory use.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use alloc_meter::Tracker;
use tracing::{debug, info, warn};

use crate::{
    ClientEvent, ClientOption, ConnectionState, Disposition, Error, EventQueue, ProxyConfig,
    Result, RunReport, TransportClient, TransportFactory, TransportSelector, resolve,
};

/// Minimum time between two accepted sends, unless configured otherwise.
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(2);

/// Pause between two pumps, unless configured otherwise.
pub const DEFAULT_YIELD_INTERVAL: Duration = Duration::from_millis(1);

/// Pumps performed after the send loop so in-flight work can settle, unless configured otherwise.
pub const DEFAULT_DRAIN_ITERATIONS: u32 = 10;

/// Pacing of the send loop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HarnessConfig {
    send_interval: Duration,
    yield_interval: Duration,
    drain_iterations: u32,
}

impl HarnessConfig {
    /// Creates a configuration with the default pacing.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            send_interval: DEFAULT_SEND_INTERVAL,
            yield_interval: DEFAULT_YIELD_INTERVAL,
            drain_iterations: DEFAULT_DRAIN_ITERATIONS,
        }
    }

    /// Sets the minimum time between two accepted sends.
    #[must_use]
    pub const fn send_interval(mut self, interval: Duration) -> Self {
        self.send_interval = interval;
        self
    }

    /// Sets the pause between two pumps. With a zero interval the thread still yields to the
    /// scheduler after every pump.
    #[must_use]
    pub const fn yield_interval(mut self, interval: Duration) -> Self {
        self.yield_interval = interval;
        self
    }

    /// Sets how many pumps follow the send loop.
    #[must_use]
    pub const fn drain_iterations(mut self, iterations: u32) -> Self {
        self.drain_iterations = iterations;
        self
    }

    /// Whether the next send is due. The first send is always due.
    fn send_due(&self, last_send: Option<Instant>, now: Instant) -> bool {
        last_send.is_none_or(|last| now.saturating_duration_since(last) >= self.send_interval)
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a measurement run needs, passed explicitly.
///
/// # Examples
///
/// ```
/// use alloc_meter::Tracker;
/// use transport_probe::{Harness, HarnessConfig, LoopbackFactory, TransportSelector};
/// use std::time::Duration;
///
/// let tracker = Tracker::new();
/// let factory = LoopbackFactory::new();
///
/// let harness = Harness::new(
///     &tracker,
///     &factory,
///     "HostName=localhost;DeviceId=doc;SharedAccessKey=a2V5",
/// )
/// .config(HarnessConfig::new().yield_interval(Duration::ZERO));
///
/// let report = harness.run_send_cycle(TransportSelector::Mqtt, 1).unwrap();
/// assert_eq!(report.messages_sent(), 1);
/// assert_eq!(report.transport_label(), "MQTT_PROTOCOL");
/// ```
pub struct Harness<'a> {
    tracker: &'a Tracker,
    factory: &'a dyn TransportFactory,
    target: String,
    trusted_certificates: Option<String>,
    proxy: Option<ProxyConfig>,
    config: HarnessConfig,
}

impl fmt::Debug for Harness<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harness")
            .field("tracker", &self.tracker)
            .field("factory", &self.factory)
            .field("target", &"<redacted>")
            .field(
                "trusted_certificates",
                &self.trusted_certificates.as_ref().map(String::len),
            )
            .field("proxy", &self.proxy)
            .field("config", &self.config)
            .finish()
    }
}

impl<'a> Harness<'a> {
    /// Creates a harness that measures clients from `factory` connecting to `target`.
    #[must_use]
    pub fn new(
        tracker: &'a Tracker,
        factory: &'a dyn TransportFactory,
        target: impl Into<String>,
    ) -> Self {
        Self {
            tracker,
            factory,
            target: target.into(),
            trusted_certificates: None,
            proxy: None,
            config: HarnessConfig::new(),
        }
    }

    /// Certificates each client uses to validate the service endpoint.
    #[must_use]
    pub fn trusted_certificates(mut self, certificates: impl Into<String>) -> Self {
        self.trusted_certificates = Some(certificates.into());
        self
    }

    /// Proxy each client routes its traffic through.
    #[must_use]
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Pacing of the send loop.
    #[must_use]
    pub const fn config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    /// Performs one measurement run and returns its report.
    ///
    /// The tracker is reset once the transport is known to be supported, so the report covers
    /// client construction, the send loop, the drain period and client teardown.
    ///
    /// The loop ends when `message_count` messages were accepted or the connection failed.
    /// There is no other bound: a client that never reports a connection status keeps the loop
    /// pumping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedTransport`] if the factory has no implementation for
    /// `selector`, in which case neither the tracker nor the factory is touched. Returns
    /// [`Error::ClientCreationFailed`] if the client cannot be created.
    pub fn run_send_cycle(
        &self,
        selector: TransportSelector,
        message_count: u32,
    ) -> Result<RunReport> {
        let transport = resolve(selector, self.factory)?;

        self.tracker.reset();

        let mut client = self
            .factory
            .create(selector, &self.target)
            .map_err(|source| Error::ClientCreationFailed { selector, source })?;

        info!(
            message = "client created",
            transport = %selector,
            message_count
        );

        self.apply_options(client.as_mut());

        let mut run = RunState::default();
        let mut events = EventQueue::new();
        let target_count = u64::from(message_count);

        while !run.connection.is_failed() && run.messages_sent < target_count {
            if run.connection.is_authenticated()
                && self.config.send_due(run.last_send, Instant::now())
            {
                match send_message(client.as_mut(), run.messages_sent) {
                    Ok(()) => {
                        run.messages_sent = run.messages_sent.saturating_add(1);
                        run.last_send = Some(Instant::now());

                        info!(
                            message = "message accepted for transmission",
                            count = run.messages_sent
                        );
                    }
                    Err(err @ Error::SendFailed { .. }) => {
                        run.send_failures = run.send_failures.saturating_add(1);
                        warn!(message = "send failed", %err);
                    }
                    Err(err) => {
                        warn!(message = "skipping message", %err);
                    }
                }
            }

            self.pump(client.as_mut(), &mut events, &mut run);
        }

        if run.connection.is_failed() {
            warn!(
                message = "connection failed, ending send loop",
                messages_sent = run.messages_sent
            );
        }

        for _ in 0..self.config.drain_iterations {
            self.pump(client.as_mut(), &mut events, &mut run);
        }

        drop(client);

        let stats = self.tracker.snapshot();
        let underflows = self.tracker.free_underflows();
        if underflows != 0 {
            debug!(
                message = "memory allocated before the run was freed during it",
                underflows
            );
        }

        Ok(RunReport::new(
            self.factory.version(),
            transport.label(),
            run.messages_sent,
            run.send_failures,
            stats,
        ))
    }

    fn apply_options(&self, client: &mut dyn TransportClient) {
        if let Some(certificates) = &self.trusted_certificates {
            if let Err(err) = client.set_option(ClientOption::TrustedCertificates(
                certificates.clone(),
            )) {
                warn!(message = "failed to set trusted certificates", %err);
            }
        }

        if let Some(proxy) = &self.proxy {
            if let Err(err) = client.set_option(ClientOption::HttpProxy(proxy.clone())) {
                warn!(message = "failed to set proxy", %err);
            }
        }
    }

    /// One pump, then handle whatever the client reported, then yield.
    fn pump(&self, client: &mut dyn TransportClient, events: &mut EventQueue, run: &mut RunState) {
        client.pump_work(events);

        while let Some(event) = events.pop() {
            handle_event(client, event, run);
        }

        if self.config.yield_interval.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(self.config.yield_interval);
        }
    }
}

#[derive(Debug, Default)]
struct RunState {
    connection: ConnectionState,
    messages_sent: u64,
    send_failures: u64,
    last_send: Option<Instant>,
}

fn handle_event(client: &mut dyn TransportClient, event: ClientEvent, run: &mut RunState) {
    match event {
        ClientEvent::ConnectionStatus(status) => {
            let next = run.connection.on_status(status);
            if next != run.connection {
                info!(
                    message = "connection state changed",
                    from = ?run.connection,
                    to = ?next,
                    ?status
                );
            }
            run.connection = next;
        }
        ClientEvent::MessageReceived(message) => {
            let id = message.id();
            debug!(message = "message received", %id, bytes = message.body().len());

            if let Err(err) = client.acknowledge(id, Disposition::Accepted) {
                warn!(message = "failed to acknowledge message", %id, %err);
            }
        }
        ClientEvent::SendConfirmed { id, confirmation } => {
            debug!(message = "send confirmed", %id, ?confirmation);
        }
    }
}

/// Builds the payload for message `index` and hands it to the client.
fn send_message(client: &mut dyn TransportClient, index: u64) -> Result<()> {
    let body = payload(index);

    let message = client
        .create_message(body.as_bytes())
        .map_err(|source| Error::MessageConstructionFailed { index, source })?;

    client
        .send_async(message)
        .map_err(|source| Error::SendFailed { index, source })
}

fn payload(index: u64) -> String {
    format!(r#"{{ "message_index" : "{index}" }}"#)
}
