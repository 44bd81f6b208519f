//! Stratum Ping Library
//!
//! Measures round-trip latency to mining pool stratum servers at the
//! application-protocol layer. Each probe opens a TCP (optionally TLS)
//! connection, sends one login or subscribe request, waits for one response
//! line and records the elapsed time. A session runs a fixed number of probes
//! and summarises packet loss and min/avg/max latency.
//!
//! # Modules
//!
//! - `config`: Probe configuration, protocol variants and .properties loading
//! - `resolver`: Host name resolution for the requested address family
//! - `transport`: Plain TCP and TLS connection establishment
//! - `protocol`: Stratum handshake request construction and encoding
//! - `probe`: A single timed probe and its failure taxonomy
//! - `tracker`: Loss and latency statistics, per-probe and session reports
//! - `session`: Sequential probe session orchestration

pub mod config;
pub mod resolver;
pub mod transport;
pub mod protocol;
pub mod probe;
pub mod tracker;
pub mod session;

// Re-export main types for convenience
pub use config::{ProbeConfig, ProtocolVariant};
pub use probe::{ProbeError, ProbeResult};
pub use session::{Session, SessionError};
pub use tracker::{ProbeRecord, SessionReport};
