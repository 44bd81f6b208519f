//! Configuration Module
//!
//! Holds the immutable probe configuration and loads it from Java-style
//! .properties files (KEY=VALUE format). Protocol variants are a closed set;
//! unknown names are rejected here, before any network activity.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse property '{key}': {reason}")]
    ParseError { key: String, reason: String },

    #[error("Unknown protocol variant '{0}' (expected stratum1 or stratum2)")]
    UnknownProtocol(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Stratum handshake flavour sent by each probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolVariant {
    /// `eth_submitLogin` with login and password
    #[default]
    StratumV1,
    /// `mining.subscribe`, no credentials
    StratumV2,
}

impl ProtocolVariant {
    /// Whether the handshake carries the configured credentials
    pub fn uses_credentials(&self) -> bool {
        matches!(self, ProtocolVariant::StratumV1)
    }
}

impl FromStr for ProtocolVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stratum1" | "v1" => Ok(ProtocolVariant::StratumV1),
            "stratum2" | "v2" => Ok(ProtocolVariant::StratumV2),
            _ => Err(ConfigError::UnknownProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVariant::StratumV1 => write!(f, "stratum1"),
            ProtocolVariant::StratumV2 => write!(f, "stratum2"),
        }
    }
}

/// Pool credentials, only sent by [`ProtocolVariant::StratumV1`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            login: String::new(),
            password: "x".into(),
        }
    }
}

/// Probe session configuration
///
/// Property names: HOST, PORT, IPV6, USE_TLS, SKIP_CERT_VERIFICATION, PROTOCOL,
/// LOGIN, PASSWORD, COUNT, INTERVAL_MS, CONNECT_TIMEOUT_MS, WRITE_TIMEOUT_MS,
/// READ_TIMEOUT_MS
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeConfig {
    pub host: String,
    pub port: u16,
    pub ipv6: bool,
    pub tls: bool,
    /// Insecure TLS probe mode: accept self-signed and mismatched certificates.
    pub skip_certificate_verification: bool,
    pub protocol: ProtocolVariant,
    pub credentials: Credentials,
    pub count: usize,
    pub interval: Duration,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 4444,
            ipv6: false,
            tls: false,
            skip_certificate_verification: true,
            protocol: ProtocolVariant::default(),
            credentials: Credentials::default(),
            count: 5,
            interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
        }
    }
}

fn parse_value<T: FromStr>(props: &HashMap<String, String>, key: &str) -> Result<Option<T>, ConfigError> {
    props
        .get(key)
        .map(|v| {
            v.parse().map_err(|_| ConfigError::ParseError {
                key: key.into(),
                reason: format!("invalid {}: {}", std::any::type_name::<T>(), v),
            })
        })
        .transpose()
}

fn parse_millis(props: &HashMap<String, String>, key: &str) -> Result<Option<Duration>, ConfigError> {
    Ok(parse_value::<u64>(props, key)?.map(Duration::from_millis))
}

fn parse_flag(props: &HashMap<String, String>, key: &str) -> Option<bool> {
    props.get(key).map(|v| v.eq_ignore_ascii_case("true"))
}

impl ProbeConfig {
    /// Parse a Java-style .properties file into a HashMap.
    /// Skips blank lines and lines starting with '#'.
    fn parse_properties(content: &str) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = trimmed.split_once('=') {
                map.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        map
    }

    /// Load configuration from a .properties file (Java KEY=VALUE format).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_properties_str(&content)
    }

    /// Parse config from a properties-format string.
    pub fn from_properties_str(content: &str) -> Result<Self, ConfigError> {
        let props = Self::parse_properties(content);
        let defaults = ProbeConfig::default();

        let config = ProbeConfig {
            host: props.get("HOST").cloned().unwrap_or(defaults.host),
            port: parse_value(&props, "PORT")?.unwrap_or(defaults.port),
            ipv6: parse_flag(&props, "IPV6").unwrap_or(defaults.ipv6),
            tls: parse_flag(&props, "USE_TLS").unwrap_or(defaults.tls),
            skip_certificate_verification: parse_flag(&props, "SKIP_CERT_VERIFICATION")
                .unwrap_or(defaults.skip_certificate_verification),
            protocol: props
                .get("PROTOCOL")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or(defaults.protocol),
            credentials: Credentials {
                login: props.get("LOGIN").cloned().unwrap_or(defaults.credentials.login),
                password: props.get("PASSWORD").cloned().unwrap_or(defaults.credentials.password),
            },
            count: parse_value(&props, "COUNT")?.unwrap_or(defaults.count),
            interval: parse_millis(&props, "INTERVAL_MS")?.unwrap_or(defaults.interval),
            connect_timeout: parse_millis(&props, "CONNECT_TIMEOUT_MS")?.unwrap_or(defaults.connect_timeout),
            write_timeout: parse_millis(&props, "WRITE_TIMEOUT_MS")?.unwrap_or(defaults.write_timeout),
            read_timeout: parse_millis(&props, "READ_TIMEOUT_MS")?.unwrap_or(defaults.read_timeout),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no session can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        if self.count == 0 {
            return Err(ConfigError::Invalid("probe count must be at least 1".into()));
        }
        Ok(())
    }

    /// Log all configuration parameters for debugging
    pub fn log_config(&self) {
        log::debug!("Configuration:");
        log::debug!("  host: {}", self.host);
        log::debug!("  port: {}", self.port);
        log::debug!("  ipv6: {}", self.ipv6);
        log::debug!("  tls: {}", self.tls);
        log::debug!("  skip_certificate_verification: {}", self.skip_certificate_verification);
        log::debug!("  protocol: {}", self.protocol);
        log::debug!("  login: {}", self.credentials.login);
        log::debug!("  password: ****");
        log::debug!("  count: {}", self.count);
        log::debug!("  interval: {:?}", self.interval);
        log::debug!("  connect_timeout: {:?}", self.connect_timeout);
        log::debug!("  write_timeout: {:?}", self.write_timeout);
        log::debug!("  read_timeout: {:?}", self.read_timeout);
    }
}
