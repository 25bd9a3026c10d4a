#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

//! Binary entry point for the `memory_analysis` tool.
//!
//! This module is excluded from mutation testing because testing process entry/exit behavior
//! is impractical - it requires spawning subprocesses and checking exit codes.

use std::path::PathBuf;
use std::process::ExitCode;

use alloc_meter::Allocator;
use argh::FromArgs;
use tracing::{error, info, warn};
use transport_probe::{
    Harness, LoopbackFactory, Platform, ProbeConfig, ProxyConfig, RunPlan, TransportFactory,
};

#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

/// Sends test messages over one or more transports and prints the memory the client library
/// used for each.
#[derive(FromArgs)]
struct Args {
    /// TOML file with settings; command line options take precedence
    #[argh(option)]
    config: Option<PathBuf>,

    /// connection string passed to the client library
    #[argh(option)]
    connection_string: Option<String>,

    /// PEM file with certificates used to validate the service endpoint
    #[argh(option)]
    trusted_certificates: Option<PathBuf>,

    /// HTTP proxy as HOST:PORT, used by transports that support one
    #[argh(option)]
    proxy: Option<ProxyConfig>,

    /// minimum number of seconds between two sends
    #[argh(option)]
    send_interval_secs: Option<u64>,

    /// run to perform as TRANSPORT[:MESSAGES]; repeat for several runs (default: MQTT:1 AMQP:1)
    #[argh(option)]
    run: Vec<RunPlan>,
}

impl Args {
    fn into_overrides(self) -> (Option<PathBuf>, ProbeConfig) {
        let mut overrides = ProbeConfig::default();
        overrides.connection_string = self.connection_string;
        overrides.trusted_certificates_path = self.trusted_certificates;
        overrides.proxy = self.proxy;
        overrides.send_interval_secs = self.send_interval_secs;
        overrides.runs = self.run;

        (self.config, overrides)
    }
}

// Binary entry point - mutations would require subprocess testing which is impractical.
#[cfg_attr(test, mutants::skip)]
fn main() -> ExitCode {
    let args: Args = argh::from_env();
    let (config_path, overrides) = args.into_overrides();

    let platform = match Platform::init(ALLOCATOR.tracker()) {
        Ok(platform) => platform,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    let config = match config_path {
        Some(path) => match ProbeConfig::load(&path) {
            Ok(config) => config.merge(overrides),
            Err(err) => {
                error!(
                    message = "invalid configuration",
                    %err,
                    source = ?std::error::Error::source(&err)
                );
                return ExitCode::FAILURE;
            }
        },
        None => overrides,
    };

    let trusted_certificates = match config.trusted_certificates() {
        Ok(certificates) => certificates,
        Err(err) => {
            error!(message = "cannot load trusted certificates", %err);
            return ExitCode::FAILURE;
        }
    };

    let factory = LoopbackFactory::new();
    info!(
        message = "measuring client library",
        version = %factory.version()
    );

    let mut harness = Harness::new(platform.tracker(), &factory, config.connection_string())
        .config(config.harness_config());

    if let Some(certificates) = trusted_certificates {
        harness = harness.trusted_certificates(certificates);
    }
    if let Some(proxy) = config.proxy.clone() {
        harness = harness.proxy(proxy);
    }

    let mut all_succeeded = true;

    for plan in config.runs() {
        match harness.run_send_cycle(plan.transport(), plan.messages()) {
            Ok(report) => report.print_to_stdout(),
            Err(err) => {
                all_succeeded = false;
                warn!(
                    message = "run failed",
                    transport = %plan.transport(),
                    %err,
                    source = ?std::error::Error::source(&err)
                );
            }
        }
    }

    drop(platform);

    if all_succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
