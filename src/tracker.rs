//! Latency Tracker Module
//!
//! Accumulates per-probe outcomes into session statistics: packets sent and
//! received, loss percentage and min/avg/max latency over successful probes.

use crate::probe::ProbeResult;
use std::collections::VecDeque;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Latency statistics over successful probes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySummary {
    pub min: Duration,
    pub avg: Duration,
    pub max: Duration,
}

/// Loss percentage: `100 - floor(received * 100 / transmitted)`.
///
/// Zero transmitted probes count as total loss.
pub fn loss_percent(received: usize, transmitted: usize) -> u8 {
    if transmitted == 0 {
        return 100;
    }
    let received = received.min(transmitted) as u128;
    let delivered = received * 100 / transmitted as u128;
    100 - delivered as u8
}

/// Running counters for one session
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    transmitted: usize,
    received: usize,
    min: Option<Duration>,
    max: Option<Duration>,
    sum: Duration,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one probe outcome
    pub fn record(&mut self, result: &ProbeResult) {
        match result {
            Ok(rtt) => self.record_latency(*rtt),
            Err(_) => self.record_loss(),
        }
    }

    /// Record a successful probe with its round-trip time
    pub fn record_latency(&mut self, rtt: Duration) {
        self.transmitted += 1;
        self.received += 1;
        self.min = Some(self.min.map_or(rtt, |m| m.min(rtt)));
        self.max = Some(self.max.map_or(rtt, |m| m.max(rtt)));
        self.sum = self.sum.saturating_add(rtt);
    }

    /// Record a failed probe
    pub fn record_loss(&mut self) {
        self.transmitted += 1;
    }

    pub fn transmitted(&self) -> usize {
        self.transmitted
    }

    pub fn received(&self) -> usize {
        self.received
    }

    pub fn loss_percent(&self) -> u8 {
        loss_percent(self.received, self.transmitted)
    }

    /// min/avg/max, or `None` when no probe succeeded
    pub fn latency(&self) -> Option<LatencySummary> {
        // min and max are only set once a probe has succeeded
        let (min, max) = (self.min?, self.max?);
        let avg_nanos = self.sum.as_nanos() / self.received as u128;
        Some(LatencySummary {
            min,
            avg: Duration::from_nanos(avg_nanos as u64),
            max,
        })
    }
}

/// One probe as reported to the operator
#[derive(Debug)]
pub struct ProbeRecord {
    /// 0-based position in the session
    pub seq: usize,
    pub host: String,
    pub addr: IpAddr,
    pub result: ProbeResult,
}

impl fmt::Display for ProbeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(rtt) => write!(f, "{} ({}): seq={}, time={:?}", self.host, self.addr, self.seq, rtt),
            Err(e) => write!(f, "{} ({}): seq={}, {}", self.host, self.addr, self.seq, e),
        }
    }
}

/// The most recent probe records, bounded to `limit` entries
#[derive(Debug)]
pub struct ProbeHistory {
    limit: usize,
    records: VecDeque<ProbeRecord>,
}

impl ProbeHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            records: VecDeque::new(),
        }
    }

    /// Append a record, evicting the oldest once the limit is reached
    pub fn push(&mut self, record: ProbeRecord) {
        if self.limit == 0 {
            return;
        }
        if self.records.len() == self.limit {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_vec(self) -> Vec<ProbeRecord> {
        self.records.into()
    }
}

/// Final statistics of a completed session
#[derive(Debug)]
pub struct SessionReport {
    pub host: String,
    pub addr: IpAddr,
    pub transmitted: usize,
    pub received: usize,
    pub loss_percent: u8,
    /// Wall time of the whole session, inter-probe delays included
    pub elapsed: Duration,
    pub latency: Option<LatencySummary>,
    /// Most recent probes in sequence order; older ones are only seen by the
    /// session observer
    pub probes: Vec<ProbeRecord>,
}

impl SessionReport {
    pub fn from_stats(
        host: String,
        addr: IpAddr,
        stats: &SessionStats,
        elapsed: Duration,
        probes: Vec<ProbeRecord>,
    ) -> Self {
        Self {
            host,
            addr,
            transmitted: stats.transmitted(),
            received: stats.received(),
            loss_percent: stats.loss_percent(),
            elapsed,
            latency: stats.latency(),
            probes,
        }
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} packets transmitted, {} received, {}% packet loss, time {:?}",
            self.transmitted, self.received, self.loss_percent, self.elapsed
        )?;
        if let Some(latency) = &self.latency {
            writeln!(f, "min/avg/max = {:?}, {:?}, {:?}", latency.min, latency.avg, latency.max)?;
        }
        Ok(())
    }
}
