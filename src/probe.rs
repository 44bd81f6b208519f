//! Probe Runner Module
//!
//! One probe is: connect, send the handshake line, wait for one response line,
//! measure, close. The connection is owned by the probe and dropped on every
//! exit path.

use crate::config::{Credentials, ProbeConfig, ProtocolVariant};
use crate::protocol;
use crate::transport::{Connection, Transport};

use std::fmt;
use std::io;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;

/// Upper bound on the bytes consumed while waiting for the response line
const MAX_RESPONSE_LINE: u64 = 64 * 1024;

/// Stage of a probe at which a deadline expired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connect,
    Write,
    Read,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Connect => write!(f, "connect"),
            Phase::Write => write!(f, "write"),
            Phase::Read => write!(f, "read"),
        }
    }
}

/// Per-probe failure. Recorded as a loss; the session continues.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connect error: {0}")]
    Connect(#[source] io::Error),

    #[error("TLS handshake error: {0}")]
    Tls(#[source] native_tls::Error),

    #[error("i/o timeout: {phase} did not complete within {after:?}")]
    Timeout { phase: Phase, after: Duration },

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("write error: {0}")]
    Write(#[source] io::Error),

    #[error("read error: {0}")]
    Read(#[source] io::Error),

    #[error("read error: connection closed before a response line arrived")]
    Closed,
}

impl ProbeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Timeout { .. })
    }
}

/// Outcome of a single probe
pub type ProbeResult = Result<Duration, ProbeError>;

/// Runs probes against a resolved address
pub struct ProbeRunner {
    transport: Transport,
    port: u16,
    protocol: ProtocolVariant,
    credentials: Credentials,
    write_timeout: Duration,
    read_timeout: Duration,
}

impl ProbeRunner {
    pub fn new(transport: Transport, config: &ProbeConfig) -> Self {
        Self {
            transport,
            port: config.port,
            protocol: config.protocol,
            credentials: config.credentials.clone(),
            write_timeout: config.write_timeout,
            read_timeout: config.read_timeout,
        }
    }

    /// Execute one probe and return the request/response round-trip time.
    pub async fn probe(&self, addr: IpAddr) -> ProbeResult {
        let connection = self.transport.connect(addr, self.port).await?;

        match connection {
            Connection::Plain(stream) => self.exchange(stream).await,
            Connection::Tls(stream) => self.exchange(*stream).await,
        }
    }

    /// Generic over the stream so plain and TLS connections share one path.
    /// The stream is dropped (closed) when this returns, whatever the outcome.
    async fn exchange<S>(&self, stream: S) -> ProbeResult
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let request = protocol::build_request(self.protocol, &self.credentials);
        let mut reader = BufReader::with_capacity(1024, stream);

        let start = Instant::now();

        let line = protocol::encode_line(&request)?;
        log::debug!("Sending: {}", String::from_utf8_lossy(&line).trim_end());
        let write = async {
            let stream = reader.get_mut();
            stream.write_all(&line).await?;
            stream.flush().await
        };
        match timeout(self.write_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ProbeError::Write(e)),
            Err(_) => {
                return Err(ProbeError::Timeout {
                    phase: Phase::Write,
                    after: self.write_timeout,
                })
            }
        }

        let mut response = Vec::new();
        let mut limited = (&mut reader).take(MAX_RESPONSE_LINE);
        match timeout(self.read_timeout, limited.read_until(b'\n', &mut response)).await {
            Ok(Ok(0)) => return Err(ProbeError::Closed),
            Ok(Ok(n)) => log::debug!("Received {} byte response", n),
            Ok(Err(e)) => return Err(ProbeError::Read(e)),
            Err(_) => {
                return Err(ProbeError::Timeout {
                    phase: Phase::Read,
                    after: self.read_timeout,
                })
            }
        }

        Ok(start.elapsed())
    }
}
