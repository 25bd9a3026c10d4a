use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::{Error, Result, TransportFactory};

/// The transports a client library may offer for talking to the ingestion service.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq)]
#[serde(try_from = "String")]
#[non_exhaustive]
pub enum TransportSelector {
    /// MQTT over TCP.
    Mqtt,
    /// MQTT tunneled through WebSockets.
    MqttWebSockets,
    /// HTTP polling.
    Http,
    /// AMQP over TCP.
    Amqp,
    /// AMQP tunneled through WebSockets.
    AmqpWebSockets,
}

impl TransportSelector {
    /// Every selector, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Mqtt,
        Self::MqttWebSockets,
        Self::Http,
        Self::Amqp,
        Self::AmqpWebSockets,
    ];

    /// The short name used on the command line and in configuration files.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mqtt => "MQTT",
            Self::MqttWebSockets => "MQTT_WS",
            Self::Http => "HTTP",
            Self::Amqp => "AMQP",
            Self::AmqpWebSockets => "AMQP_WS",
        }
    }

    /// The protocol label printed in reports.
    ///
    /// WebSocket variants share the label of the protocol they tunnel.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Mqtt | Self::MqttWebSockets => "MQTT_PROTOCOL",
            Self::Http => "HTTP_PROTOCOL",
            Self::Amqp | Self::AmqpWebSockets => "AMQP_PROTOCOL",
        }
    }

    /// Whether the transport runs over WebSockets or HTTP and can therefore use an HTTP proxy.
    #[must_use]
    pub const fn is_proxyable(self) -> bool {
        matches!(
            self,
            Self::MqttWebSockets | Self::Http | Self::AmqpWebSockets
        )
    }
}

impl fmt::Display for TransportSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransportSelector {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|selector| selector.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "Invalid transport: '{s}'. Valid options are: MQTT, MQTT_WS, HTTP, AMQP, AMQP_WS"
                )
            })
    }
}

impl TryFrom<String> for TransportSelector {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// A selector that the client library has confirmed it can serve.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResolvedTransport {
    selector: TransportSelector,
    label: &'static str,
}

impl ResolvedTransport {
    /// The selector that was resolved.
    #[must_use]
    pub const fn selector(&self) -> TransportSelector {
        self.selector
    }

    /// The protocol label for reports.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }
}

/// Confirms that `factory` offers an implementation for `selector`.
///
/// # Errors
///
/// Returns [`Error::UnsupportedTransport`] if the factory has no implementation for the selector.
pub fn resolve(
    selector: TransportSelector,
    factory: &(impl TransportFactory + ?Sized),
) -> Result<ResolvedTransport> {
    if factory.supports(selector) {
        Ok(ResolvedTransport {
            selector,
            label: selector.label(),
        })
    } else {
        Err(Error::UnsupportedTransport { selector })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::MockTransportFactory;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(
            "mqtt".parse::<TransportSelector>().unwrap(),
            TransportSelector::Mqtt
        );
        assert_eq!(
            "Amqp_Ws".parse::<TransportSelector>().unwrap(),
            TransportSelector::AmqpWebSockets
        );
        assert_eq!(
            "HTTP".parse::<TransportSelector>().unwrap(),
            TransportSelector::Http
        );
    }

    #[test]
    fn parse_rejects_unknown_names() {
        let result = "COAP".parse::<TransportSelector>();

        assert!(result.unwrap_err().contains("Invalid transport"));
    }

    #[test]
    fn name_round_trips_through_parse() {
        for selector in TransportSelector::ALL {
            assert_eq!(selector.name().parse::<TransportSelector>(), Ok(selector));
        }
    }

    #[test]
    fn websocket_variants_share_labels() {
        assert_eq!(TransportSelector::Mqtt.label(), "MQTT_PROTOCOL");
        assert_eq!(TransportSelector::MqttWebSockets.label(), "MQTT_PROTOCOL");
        assert_eq!(TransportSelector::Http.label(), "HTTP_PROTOCOL");
        assert_eq!(TransportSelector::Amqp.label(), "AMQP_PROTOCOL");
        assert_eq!(TransportSelector::AmqpWebSockets.label(), "AMQP_PROTOCOL");
    }

    #[test]
    fn only_tunneled_transports_are_proxyable() {
        assert!(!TransportSelector::Mqtt.is_proxyable());
        assert!(!TransportSelector::Amqp.is_proxyable());
        assert!(TransportSelector::MqttWebSockets.is_proxyable());
        assert!(TransportSelector::AmqpWebSockets.is_proxyable());
        assert!(TransportSelector::Http.is_proxyable());
    }

    #[test]
    fn resolve_supported_selector() {
        let mut factory = MockTransportFactory::new();
        factory.expect_supports().return_const(true);

        let resolved = resolve(TransportSelector::Amqp, &factory).unwrap();

        assert_eq!(resolved.selector(), TransportSelector::Amqp);
        assert_eq!(resolved.label(), "AMQP_PROTOCOL");
    }

    #[test]
    fn resolve_unsupported_selector() {
        let mut factory = MockTransportFactory::new();
        factory
            .expect_supports()
            .returning(|selector| selector != TransportSelector::Http);

        let result = resolve(TransportSelector::Http, &factory);

        assert!(matches!(
            result,
            Err(Error::UnsupportedTransport {
                selector: TransportSelector::Http
            })
        ));
    }
}
