//! Notifications flowing from a client to the harness.
//!
//! Instead of invoking callbacks that mutate shared state, a client pushes events into a bounded
//! queue during [`pump_work()`](crate::TransportClient::pump_work) and the harness drains the
//! queue right after. Everything stays on the pumping thread and in pump order.

use heapless::Deque;

use crate::{Message, MessageId};

/// Maximum number of events a client can report from a single pump.
pub const EVENT_QUEUE_CAPACITY: usize = 32;

/// Why a connection is not (or no longer) authenticated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum StatusReason {
    /// The credential presented by the device was refused.
    BadCredential,
    /// The security token expired and could not be renewed.
    ExpiredToken,
    /// The device is disabled on the service side.
    DeviceDisabled,
    /// The network is unreachable.
    NoNetwork,
    /// The connection was dropped mid-session.
    CommunicationError,
    /// The client gave up reconnecting.
    RetryExpired,
}

/// Outcome reported by a client for its connection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ConnectionStatus {
    /// The connection is established and authenticated.
    Authenticated,
    /// The connection is not usable.
    Unauthenticated(StatusReason),
}

/// Final result of an asynchronous send.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Confirmation {
    /// The service acknowledged the message.
    Delivered,
    /// The message expired before it could be delivered.
    TimedOut,
    /// The client was destroyed with the message still pending.
    Discarded,
}

/// Something that happened inside a client during a pump.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ClientEvent {
    /// The connection status changed.
    ConnectionStatus(ConnectionStatus),
    /// The service sent a message to the device. It must be settled via
    /// [`acknowledge()`](crate::TransportClient::acknowledge).
    MessageReceived(Message),
    /// A previously submitted message reached its final state.
    SendConfirmed {
        /// Identity of the submitted message.
        id: MessageId,
        /// How the send ended.
        confirmation: Confirmation,
    },
}

/// Bounded FIFO of [`ClientEvent`]s.
///
/// A full queue refuses new events; clients are expected to hold back what does not fit and
/// report it on a later pump.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Deque<ClientEvent, EVENT_QUEUE_CAPACITY>,
}

impl EventQueue {
    /// Creates an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            events: Deque::new(),
        }
    }

    /// Appends an event.
    ///
    /// # Errors
    ///
    /// Gives the event back if the queue is full.
    pub fn push(&mut self, event: ClientEvent) -> Result<(), ClientEvent> {
        self.events.push_back(event)
    }

    /// Removes the oldest event.
    pub fn pop(&mut self) -> Option<ClientEvent> {
        self.events.pop_front()
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether the queue refuses further events.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.events.is_full()
    }
}

/// Connection state as seen by the send loop.
///
/// `Failed` is terminal: once reached, later status events do not change the state.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum ConnectionState {
    /// No authenticated connection yet.
    #[default]
    Disconnected,
    /// Messages may be sent.
    Authenticated,
    /// The connection failed. The run is over.
    Failed,
}

impl ConnectionState {
    /// The state after observing `status`.
    #[must_use]
    pub const fn on_status(self, status: ConnectionStatus) -> Self {
        match (self, status) {
            (Self::Failed, _) => Self::Failed,
            (_, ConnectionStatus::Authenticated) => Self::Authenticated,
            (_, ConnectionStatus::Unauthenticated(_)) => Self::Failed,
        }
    }

    /// Whether messages may be sent.
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated)
    }

    /// Whether the state is terminal.
    #[must_use]
    pub const fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn queue_is_fifo() {
        let mut queue = EventQueue::new();
        queue
            .push(ClientEvent::ConnectionStatus(ConnectionStatus::Authenticated))
            .unwrap();
        queue
            .push(ClientEvent::SendConfirmed {
                id: MessageId(1),
                confirmation: Confirmation::Delivered,
            })
            .unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(
            queue.pop(),
            Some(ClientEvent::ConnectionStatus(ConnectionStatus::Authenticated))
        );
        assert!(matches!(
            queue.pop(),
            Some(ClientEvent::SendConfirmed {
                id: MessageId(1),
                ..
            })
        ));
        assert!(queue.pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_hands_event_back() {
        let mut queue = EventQueue::new();
        for i in 0..EVENT_QUEUE_CAPACITY {
            queue
                .push(ClientEvent::SendConfirmed {
                    id: MessageId(i as u64),
                    confirmation: Confirmation::Delivered,
                })
                .unwrap();
        }
        assert!(queue.is_full());

        let rejected = ClientEvent::ConnectionStatus(ConnectionStatus::Authenticated);
        assert_eq!(queue.push(rejected.clone()), Err(rejected));
        assert_eq!(queue.len(), EVENT_QUEUE_CAPACITY);
    }

    #[test]
    fn starts_disconnected() {
        let state = ConnectionState::default();

        assert_eq!(state, ConnectionState::Disconnected);
        assert!(!state.is_authenticated());
        assert!(!state.is_failed());
    }

    #[test]
    fn authenticated_status_authenticates() {
        let state = ConnectionState::Disconnected.on_status(ConnectionStatus::Authenticated);

        assert!(state.is_authenticated());
    }

    #[test]
    fn unauthenticated_status_fails_from_any_live_state() {
        let status = ConnectionStatus::Unauthenticated(StatusReason::NoNetwork);

        assert!(ConnectionState::Disconnected.on_status(status).is_failed());
        assert!(ConnectionState::Authenticated.on_status(status).is_failed());
    }

    #[test]
    fn failed_is_terminal() {
        let state = ConnectionState::Failed.on_status(ConnectionStatus::Authenticated);

        assert!(state.is_failed());
    }
}
