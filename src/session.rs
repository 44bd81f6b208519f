//! Session Module
//!
//! Drives a probe session: resolve once, run the configured number of probes
//! sequentially with a fixed delay after each one, and aggregate the outcomes.
//! Only a resolution failure aborts a session; probe failures count as loss.

use crate::config::{ConfigError, ProbeConfig};
use crate::probe::ProbeRunner;
use crate::resolver::{self, AddressFamily, ResolveError};
use crate::tracker::{ProbeHistory, ProbeRecord, SessionReport, SessionStats};
use crate::transport::Transport;

use std::net::IpAddr;
use std::time::Instant;
use thiserror::Error;

/// Number of probe records kept in the final report
pub const MAX_RETAINED_PROBES: usize = 1024;

/// Session error types. Each one is terminal and yields no statistics.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Resolution(#[from] ResolveError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to set up TLS: {0}")]
    Tls(#[from] native_tls::Error),
}

/// Session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Complete,
}

/// A probe session against one target
pub struct Session<'a> {
    config: &'a ProbeConfig,
    runner: ProbeRunner,
    addr: Option<IpAddr>,
    state: SessionState,
}

impl<'a> Session<'a> {
    /// Create a session. Fails on an invalid configuration before any
    /// network activity.
    pub fn new(config: &'a ProbeConfig) -> Result<Self, SessionError> {
        config.validate()?;

        let transport = if config.tls {
            Transport::tls(&config.host, config.connect_timeout, config.skip_certificate_verification)?
        } else {
            Transport::plain(&config.host, config.connect_timeout)
        };
        if transport.is_tls() && config.skip_certificate_verification {
            log::warn!(
                "TLS certificate verification is disabled for {} (insecure TLS probe mode)",
                config.host
            );
        }

        Ok(Self {
            config,
            runner: ProbeRunner::new(transport, config),
            addr: None,
            state: SessionState::Idle,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The cached resolved address, if resolution has happened
    pub fn address(&self) -> Option<IpAddr> {
        self.addr
    }

    /// Resolve the target host and cache the address for later probes.
    ///
    /// Success moves the session to `Running`; failure aborts it
    /// (`Complete`) with no address cached.
    pub async fn resolve(&mut self) -> Result<IpAddr, SessionError> {
        let family = AddressFamily::from_ipv6_flag(self.config.ipv6);
        match resolver::resolve(&self.config.host, family).await {
            Ok(addr) => {
                self.addr = Some(addr);
                self.state = SessionState::Running;
                Ok(addr)
            }
            Err(e) => {
                self.addr = None;
                self.state = SessionState::Complete;
                Err(e.into())
            }
        }
    }

    /// Run the session to completion.
    ///
    /// `on_probe` sees every probe as soon as it finishes, before the
    /// inter-probe delay. The host is resolved first unless an address is
    /// already cached; a resolution failure ends the session with no probe
    /// attempted.
    pub async fn run<F>(&mut self, mut on_probe: F) -> Result<SessionReport, SessionError>
    where
        F: FnMut(&ProbeRecord),
    {
        let cached = self.addr;
        let addr = match cached {
            Some(addr) => addr,
            None => match self.resolve().await {
                Ok(addr) => addr,
                Err(e) => {
                    log::error!("{}", e);
                    return Err(e);
                }
            },
        };

        self.state = SessionState::Running;
        log::info!(
            "Probing {} ({}) port {} with {} x {}",
            self.config.host,
            addr,
            self.config.port,
            self.config.count,
            self.config.protocol
        );

        let mut stats = SessionStats::new();
        let mut probes = ProbeHistory::new(MAX_RETAINED_PROBES);
        let start = Instant::now();

        for seq in 0..self.config.count {
            let result = self.runner.probe(addr).await;
            if let Err(e) = &result {
                log::debug!("Probe {} to {} failed: {}", seq, addr, e);
            }
            stats.record(&result);

            let record = ProbeRecord {
                seq,
                host: self.config.host.clone(),
                addr,
                result,
            };
            on_probe(&record);
            probes.push(record);

            // The delay also follows the last probe.
            tokio::time::sleep(self.config.interval).await;
        }

        let report = SessionReport::from_stats(
            self.config.host.clone(),
            addr,
            &stats,
            start.elapsed(),
            probes.into_vec(),
        );
        self.state = SessionState::Complete;
        log::info!(
            "Session complete: {}/{} received, {}% loss",
            report.received,
            report.transmitted,
            report.loss_percent
        );

        Ok(report)
    }
}
