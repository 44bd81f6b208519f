//! Resolver Module
//!
//! Turns a host name into a single numeric address of the requested family.
//! No retries: a failure is reported once and the caller decides what to do.

use std::io;
use std::net::IpAddr;
use thiserror::Error;
use tokio::net::lookup_host;

/// Address family requested for the probe target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    pub fn from_ipv6_flag(ipv6: bool) -> Self {
        if ipv6 {
            AddressFamily::V6
        } else {
            AddressFamily::V4
        }
    }

    fn matches(&self, addr: &IpAddr) -> bool {
        match self {
            AddressFamily::V4 => addr.is_ipv4(),
            AddressFamily::V6 => addr.is_ipv6(),
        }
    }
}

/// Resolution failure; terminal for a session
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to resolve host name {host}: {source}")]
    Lookup {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to resolve host name {host}: no {family:?} address found")]
    NoAddress { host: String, family: AddressFamily },
}

/// Resolve `host` to the first address of `family`.
///
/// Numeric hosts are accepted as-is when they belong to the family.
pub async fn resolve(host: &str, family: AddressFamily) -> Result<IpAddr, ResolveError> {
    let no_address = || ResolveError::NoAddress {
        host: host.to_string(),
        family,
    };

    let literal = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(addr) = literal.parse::<IpAddr>() {
        return if family.matches(&addr) { Ok(addr) } else { Err(no_address()) };
    }

    // The port is irrelevant for name lookup.
    let addrs = lookup_host((host, 0)).await.map_err(|source| ResolveError::Lookup {
        host: host.to_string(),
        source,
    })?;

    let addr = addrs
        .map(|sa| sa.ip())
        .find(|ip| family.matches(ip))
        .ok_or_else(no_address)?;

    log::debug!("Resolved {} to {}", host, addr);
    Ok(addr)
}
