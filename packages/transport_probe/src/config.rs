//! Settings for the `memory_analysis` tool, read from an optional TOML file and overridden from
//! the command line.
//!
//! ```toml
//! connection_string = "HostName=hub.example.net;DeviceId=probe;SharedAccessKey=..."
//! trusted_certificates_path = "certs/service-roots.pem"
//! send_interval_secs = 2
//! drain_iterations = 10
//!
//! [proxy]
//! host = "127.0.0.1"
//! port = 8888
//!
//! [[runs]]
//! transport = "MQTT"
//! messages = 1
//!
//! [[runs]]
//! transport = "AMQP"
//! messages = 1
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::{HarnessConfig, ProxyConfig, TransportSelector};

/// Connection string used when none is configured. Accepted by the loopback client library.
pub const DEFAULT_CONNECTION_STRING: &str =
    "HostName=localhost;DeviceId=memory-analysis;SharedAccessKey=bG9vcGJhY2s=";

/// One measurement run to perform.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunPlan {
    transport: TransportSelector,
    #[serde(default = "default_messages")]
    messages: u32,
}

const fn default_messages() -> u32 {
    1
}

impl RunPlan {
    /// Creates a plan that sends `messages` messages over `transport`.
    #[must_use]
    pub const fn new(transport: TransportSelector, messages: u32) -> Self {
        Self {
            transport,
            messages,
        }
    }

    /// The transport to measure.
    #[must_use]
    pub const fn transport(&self) -> TransportSelector {
        self.transport
    }

    /// How many messages to send.
    #[must_use]
    pub const fn messages(&self) -> u32 {
        self.messages
    }
}

impl FromStr for RunPlan {
    type Err = String;

    /// Parses `TRANSPORT` or `TRANSPORT:MESSAGES`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (transport, messages) = match s.split_once(':') {
            Some((transport, messages)) => {
                let messages = messages
                    .parse::<u32>()
                    .map_err(|e| format!("Invalid run: '{s}'. Bad message count: {e}"))?;
                (transport, messages)
            }
            None => (s, default_messages()),
        };

        Ok(Self::new(transport.parse()?, messages))
    }
}

/// The runs performed when none are configured: one message over MQTT, then one over AMQP.
#[must_use]
pub fn default_runs() -> Vec<RunPlan> {
    vec![
        RunPlan::new(TransportSelector::Mqtt, 1),
        RunPlan::new(TransportSelector::Amqp, 1),
    ]
}

/// Errors that can occur when loading settings.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A file could not be read.
    #[error("cannot read {}", path.display())]
    Io {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid.
    #[error("cannot parse {}", path.display())]
    Parse {
        /// The file that could not be parsed.
        path: PathBuf,
        /// What the parser reported.
        #[source]
        source: Box<toml::de::Error>,
    },

    /// The configuration file parses but holds a value that cannot be used.
    #[error("invalid setting in {}: {reason}", path.display())]
    Invalid {
        /// The file holding the setting.
        path: PathBuf,
        /// What is wrong with the setting.
        reason: &'static str,
    },
}

/// Settings for a sequence of measurement runs. Every field is optional; unset fields fall back
/// to defaults when read.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
#[non_exhaustive]
pub struct ProbeConfig {
    /// Passed to the client library to create each client.
    pub connection_string: Option<String>,

    /// PEM file with the certificates used to validate the service endpoint.
    pub trusted_certificates_path: Option<PathBuf>,

    /// HTTP proxy for transports that can use one.
    pub proxy: Option<ProxyConfig>,

    /// Minimum number of seconds between two accepted sends.
    pub send_interval_secs: Option<u64>,

    /// Pause between two pumps, in milliseconds.
    pub yield_interval_millis: Option<u64>,

    /// Pumps performed after each send loop.
    pub drain_iterations: Option<u32>,

    /// Runs to perform, in order.
    pub runs: Vec<RunPlan>,
}

impl ProbeConfig {
    /// Reads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid configuration. A zero
    /// `yield_interval_millis` is refused because the pump loop would never pause.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;

        if config.yield_interval_millis == Some(0) {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: "yield_interval_millis must be at least 1",
            });
        }

        Ok(config)
    }

    /// Layers `overrides` on top of `self`. Set fields of `overrides` win; a non-empty run list
    /// in `overrides` replaces the whole run list.
    #[must_use]
    pub fn merge(self, overrides: Self) -> Self {
        Self {
            connection_string: overrides.connection_string.or(self.connection_string),
            trusted_certificates_path: overrides
                .trusted_certificates_path
                .or(self.trusted_certificates_path),
            proxy: overrides.proxy.or(self.proxy),
            send_interval_secs: overrides.send_interval_secs.or(self.send_interval_secs),
            yield_interval_millis: overrides
                .yield_interval_millis
                .or(self.yield_interval_millis),
            drain_iterations: overrides.drain_iterations.or(self.drain_iterations),
            runs: if overrides.runs.is_empty() {
                self.runs
            } else {
                overrides.runs
            },
        }
    }

    /// The configured connection string, or [`DEFAULT_CONNECTION_STRING`].
    #[must_use]
    pub fn connection_string(&self) -> &str {
        self.connection_string
            .as_deref()
            .unwrap_or(DEFAULT_CONNECTION_STRING)
    }

    /// The configured runs, or [`default_runs()`].
    #[must_use]
    pub fn runs(&self) -> Vec<RunPlan> {
        if self.runs.is_empty() {
            default_runs()
        } else {
            self.runs.clone()
        }
    }

    /// Send loop pacing with unset fields at their defaults.
    #[must_use]
    pub fn harness_config(&self) -> HarnessConfig {
        let mut config = HarnessConfig::new();

        if let Some(secs) = self.send_interval_secs {
            config = config.send_interval(Duration::from_secs(secs));
        }
        if let Some(millis) = self.yield_interval_millis {
            config = config.yield_interval(Duration::from_millis(millis));
        }
        if let Some(iterations) = self.drain_iterations {
            config = config.drain_iterations(iterations);
        }

        config
    }

    /// Contents of the trusted certificates file, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn trusted_certificates(&self) -> Result<Option<String>, ConfigError> {
        self.trusted_certificates_path
            .as_deref()
            .map(|path| {
                fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            })
            .transpose()
    }
}
