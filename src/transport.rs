//! Transport Module
//!
//! Opens exactly one TCP or TLS connection per call. The transport keeps the
//! TLS connector settings across probes but never a connection.

use crate::probe::{Phase, ProbeError};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_native_tls::{TlsConnector, TlsStream};

/// An established probe connection
pub enum Connection {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connection::Plain(stream) => f.debug_tuple("Plain").field(stream).finish(),
            Connection::Tls(_) => f.write_str("Tls(..)"),
        }
    }
}

/// Connection factory for one probe target
pub struct Transport {
    /// Name presented for SNI and certificate checks
    server_name: String,
    tls: Option<TlsConnector>,
    connect_timeout: Duration,
}

impl Transport {
    /// Plain TCP transport
    pub fn plain(server_name: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            server_name: server_name.into(),
            tls: None,
            connect_timeout,
        }
    }

    /// TLS transport. With `skip_certificate_verification` the handshake
    /// accepts any certificate and host name (insecure TLS probe mode).
    pub fn tls(
        server_name: impl Into<String>,
        connect_timeout: Duration,
        skip_certificate_verification: bool,
    ) -> Result<Self, native_tls::Error> {
        let mut builder = native_tls::TlsConnector::builder();
        if skip_certificate_verification {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        let connector = builder.build()?;

        Ok(Self {
            server_name: server_name.into(),
            tls: Some(TlsConnector::from(connector)),
            connect_timeout,
        })
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    /// Connect to `addr:port`, including the TLS handshake when enabled,
    /// within the connect timeout.
    pub async fn connect(&self, addr: IpAddr, port: u16) -> Result<Connection, ProbeError> {
        let deadline = self.connect_timeout;
        match timeout(deadline, self.establish(SocketAddr::new(addr, port))).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout {
                phase: Phase::Connect,
                after: deadline,
            }),
        }
    }

    async fn establish(&self, target: SocketAddr) -> Result<Connection, ProbeError> {
        let stream = TcpStream::connect(target).await.map_err(ProbeError::Connect)?;
        // Requests are tiny; don't let Nagle delay them.
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("Failed to set TCP_NODELAY on {}: {}", target, e);
        }

        match &self.tls {
            None => {
                log::debug!("TCP connection established to {}", target);
                Ok(Connection::Plain(stream))
            }
            Some(connector) => {
                let tls_stream = connector
                    .connect(&self.server_name, stream)
                    .await
                    .map_err(ProbeError::Tls)?;
                log::debug!("TLS connection established to {}", target);
                Ok(Connection::Tls(Box::new(tls_stream)))
            }
        }
    }
}
